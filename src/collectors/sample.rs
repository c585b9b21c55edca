use crate::collectors::{capacity, du};
use crate::config::Config;
use crate::error::CycleError;
use crate::models::sample::{RawSample, ScanMode};
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Anything that can produce one cycle's raw sample. The scheduler depends
/// on this seam, so tests can substitute a scripted sampler for the live
/// filesystem.
pub trait Sampler {
    fn collect(&self, cfg: &Config) -> Result<RawSample, CycleError>;
}

/// Measures the live filesystem with statvfs and du.
pub struct SampleCollector;

impl Sampler for SampleCollector {
    fn collect(&self, cfg: &Config) -> Result<RawSample, CycleError> {
        collect_sample(cfg)
    }
}

/// Run one full measurement cycle: capacity first (its failure aborts the
/// cycle), then every configured path concurrently. Wall-clock cost is
/// bounded by the slowest single probe, and by the cycle deadline.
pub fn collect_sample(cfg: &Config) -> Result<RawSample, CycleError> {
    let capacity = capacity::read_capacity(&cfg.general.mount_path)
        .map_err(|source| CycleError::Capacity { mount: cfg.general.mount_path.clone(), source })?;

    let deadline = Instant::now() + Duration::from_secs(cfg.general.cycle_timeout_secs);

    match cfg.mode() {
        ScanMode::Categories => {
            let entries = collect_categories(cfg, deadline)?;
            Ok(RawSample { mode: ScanMode::Categories, capacity, entries, per_root: BTreeMap::new() })
        }
        ScanMode::Tree => {
            let per_root = collect_roots(cfg, deadline)?;
            let mut entries = BTreeMap::new();
            for tree in per_root.values() {
                entries.extend(tree.iter().map(|(p, b)| (p.clone(), *b)));
            }
            Ok(RawSample { mode: ScanMode::Tree, capacity, entries, per_root })
        }
    }
}

/// One thread per enabled category; each probe writes only to its own
/// message, the channel is the single join point.
fn collect_categories(
    cfg: &Config,
    deadline: Instant,
) -> Result<BTreeMap<String, u64>, CycleError> {
    let cats: Vec<(String, String)> = cfg
        .enabled_categories()
        .map(|c| (c.name.clone(), c.path.clone()))
        .collect();

    let (tx, rx) = mpsc::channel();
    for (name, path) in cats.iter().cloned() {
        let tx = tx.clone();
        std::thread::spawn(move || {
            let (bytes, outcome) = du::probe_size(&path);
            debug!("{} ({}) -> {} bytes via {}", name, path, bytes, outcome.label());
            // The receiver may be gone if the cycle already timed out.
            let _ = tx.send((name, bytes));
        });
    }
    drop(tx);

    let mut entries = BTreeMap::new();
    for _ in 0..cats.len() {
        let (name, bytes) = recv_until(&rx, deadline, cfg.general.cycle_timeout_secs)?;
        entries.insert(name, bytes);
    }
    Ok(entries)
}

/// One thread per configured root; the min-size filter is applied here,
/// after the scan, so the scanner itself stays threshold-free.
fn collect_roots(
    cfg: &Config,
    deadline: Instant,
) -> Result<BTreeMap<String, BTreeMap<String, u64>>, CycleError> {
    let max_depth   = cfg.tree.max_depth;
    let min_size_mb = cfg.tree.min_size_mb;

    let (tx, rx) = mpsc::channel();
    for root in cfg.tree.roots.iter().cloned() {
        let tx = tx.clone();
        std::thread::spawn(move || {
            let tree = du::scan_tree(&root, max_depth);
            let _ = tx.send((root, tree));
        });
    }
    drop(tx);

    let mut per_root = BTreeMap::new();
    for _ in 0..cfg.tree.roots.len() {
        let (root, tree) = recv_until(&rx, deadline, cfg.general.cycle_timeout_secs)?;
        per_root.insert(root, apply_min_size(tree, min_size_mb));
    }
    Ok(per_root)
}

fn recv_until<T>(
    rx: &mpsc::Receiver<T>,
    deadline: Instant,
    timeout_secs: u64,
) -> Result<T, CycleError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(msg) => Ok(msg),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(CycleError::Timeout(timeout_secs)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(CycleError::WorkerLost),
    }
}

/// Keep only entries whose size, ceiling-rounded to whole megabytes, reaches
/// `min_size_mb`.
pub fn apply_min_size(tree: BTreeMap<String, u64>, min_size_mb: u64) -> BTreeMap<String, u64> {
    tree.into_iter().filter(|(_, bytes)| mb_ceil(*bytes) >= min_size_mb).collect()
}

/// Bytes → megabytes, rounded up.
pub fn mb_ceil(bytes: u64) -> u64 {
    bytes.div_ceil(1_048_576)
}
