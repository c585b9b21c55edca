use crate::models::breakdown::Breakdown;
use crate::models::sample::{RawSample, ScanMode};
use std::collections::BTreeMap;
use std::path::Path;

/// Turn a raw sample into a breakdown. Pure byte arithmetic, no I/O.
///
/// `user_subset` names the categories that count as "user-facing"; when it
/// is empty no system bucket is derived.
pub fn aggregate(sample: &RawSample, user_subset: &[String]) -> Breakdown {
    let used = sample.capacity.used_bytes;

    let known_bytes = match sample.mode {
        ScanMode::Categories => sample.entries.values().sum(),
        // Discovered trees repeat a child's bytes inside every ancestor;
        // only leaves of the discovered forest are summed.
        ScanMode::Tree => leaf_sum(&sample.entries),
    };
    let other_bytes = used.saturating_sub(known_bytes);

    let (user_bytes, system_bytes) = if user_subset.is_empty() {
        (None, None)
    } else {
        let user: u64 = sample
            .entries
            .iter()
            .filter(|(name, _)| user_subset.iter().any(|u| u == *name))
            .map(|(_, bytes)| *bytes)
            .sum();
        (Some(user), Some(used.saturating_sub(user)))
    };

    Breakdown { capacity: sample.capacity, known_bytes, other_bytes, user_bytes, system_bytes }
}

/// Sum of entries with no strict descendant also present in the map.
fn leaf_sum(entries: &BTreeMap<String, u64>) -> u64 {
    entries
        .iter()
        .filter(|(path, _)| {
            !entries
                .keys()
                .any(|other| other.as_str() != path.as_str() && Path::new(other).starts_with(path.as_str()))
        })
        .map(|(_, bytes)| *bytes)
        .sum()
}
