use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Which configuration shape produced a sample. Fixed for the lifetime of
/// one validated configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// An explicit list of named paths, each measured as one opaque size.
    Categories,
    /// Depth-bounded recursive discovery under one or more root directories.
    Tree,
}

impl ScanMode {
    pub fn label(&self) -> &'static str {
        match self {
            ScanMode::Categories => "categories",
            ScanMode::Tree       => "tree",
        }
    }
}

/// Capacity of the monitored filesystem, from statvfs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capacity {
    pub total_bytes: u64,
    pub used_bytes:  u64,
    pub free_bytes:  u64,
}

/// The unprocessed measurement output of one polling cycle.
///
/// `entries` is keyed by category name in category mode and by discovered
/// path in tree mode; those keys are the identity the reconciler diffs
/// across cycles.
#[derive(Debug, Clone)]
pub struct RawSample {
    pub mode:     ScanMode,
    pub capacity: Capacity,
    pub entries:  BTreeMap<String, u64>,

    // Tree mode keeps the per-root sub-maps so a publisher can group
    // readings by the root that discovered them. Empty in category mode.
    pub per_root: BTreeMap<String, BTreeMap<String, u64>>,
}

impl RawSample {
    /// The key set the reconciler compares across cycles.
    pub fn keys(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }
}
