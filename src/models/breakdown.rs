use crate::models::sample::Capacity;
use serde::Serialize;

/// Derived per-cycle result: what the used space is made of.
///
/// All fields are exact byte counts; unit conversion is a presentation
/// concern. Negative intermediate results are clamped to zero, so
/// `known_bytes + other_bytes == used_bytes` holds exactly whenever
/// `known_bytes <= used_bytes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breakdown {
    pub capacity:    Capacity,
    /// Sum of the explicitly measured entries (leaf levels only in tree mode).
    pub known_bytes: u64,
    /// Used capacity not accounted for by any measured entry.
    pub other_bytes: u64,
    /// Sum over the configured "user" category subset, when one is configured.
    pub user_bytes:   Option<u64>,
    /// Used capacity outside the "user" subset, when one is configured.
    pub system_bytes: Option<u64>,
}

impl Breakdown {
    pub fn use_pct(&self) -> f64 {
        if self.capacity.total_bytes == 0 { return 0.0; }
        self.capacity.used_bytes as f64 / self.capacity.total_bytes as f64 * 100.0
    }
}
