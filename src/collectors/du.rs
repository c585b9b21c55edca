use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Which layer of the fallback chain produced a byte count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// `du -sb` byte-exact total.
    Exact,
    /// `du -sk` kilobyte total, multiplied back to bytes.
    Kilobyte,
    /// Direct metadata read of a regular file.
    FileLen,
    /// Path does not exist; no command was invoked.
    Missing,
    /// Every layer exhausted.
    Failed,
}

impl ProbeOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ProbeOutcome::Exact    => "du -sb",
            ProbeOutcome::Kilobyte => "du -sk",
            ProbeOutcome::FileLen  => "file len",
            ProbeOutcome::Missing  => "missing",
            ProbeOutcome::Failed   => "failed",
        }
    }
}

/// Measure one path. Never fails: every error condition degrades to 0 bytes,
/// and this is the single place where that policy is applied.
pub fn probe_size(path: &str) -> (u64, ProbeOutcome) {
    let p = Path::new(path);
    if !p.exists() {
        return (0, ProbeOutcome::Missing);
    }

    if let Some(bytes) = run_du(&["-sb", path]) {
        return (bytes, ProbeOutcome::Exact);
    }
    // Non-GNU du has no -b; fall back to KiB granularity.
    if let Some(kib) = run_du(&["-sk", path]) {
        return (kib.saturating_mul(1024), ProbeOutcome::Kilobyte);
    }
    // du unavailable or refused; a plain file still has a knowable size.
    match p.metadata() {
        Ok(meta) if meta.is_file() => (meta.len(), ProbeOutcome::FileLen),
        _ => {
            warn!("all size probes failed for {}, counting 0 bytes", path);
            (0, ProbeOutcome::Failed)
        }
    }
}

/// Run `du` with the given args and parse its single-path output.
fn run_du(args: &[&str]) -> Option<u64> {
    let out = match Command::new("du").args(args).output() {
        Ok(o) if o.status.success() => o,
        _ => return None,
    };
    parse_du_total(&String::from_utf8_lossy(&out.stdout))
}

/// First whitespace-delimited token of the first line is the size.
fn parse_du_total(stdout: &str) -> Option<u64> {
    stdout.lines().next()?.split_whitespace().next()?.parse().ok()
}

/// Depth-bounded recursive scan of `root`, following symlinks but staying on
/// one filesystem: `du -LxB1 -d<depth> <root>`. Returns path → bytes; any
/// failure yields an empty map.
pub fn scan_tree(root: &str, max_depth: u32) -> BTreeMap<String, u64> {
    if !Path::new(root).exists() {
        return BTreeMap::new();
    }

    let depth_arg = format!("-d{}", max_depth);
    let out = match Command::new("du").args(["-LxB1", &depth_arg, root]).output() {
        Ok(o) if o.status.success() => o,
        _ => {
            warn!("tree scan of {} failed, discovering nothing", root);
            return BTreeMap::new();
        }
    };

    let map = parse_tree_output(&String::from_utf8_lossy(&out.stdout));
    debug!("tree scan of {} (depth {}) found {} paths", root, max_depth, map.len());
    map
}

/// One "size\tpath" record per line; malformed lines are skipped, not fatal.
fn parse_tree_output(stdout: &str) -> BTreeMap<String, u64> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (size_s, path) = line.split_once('\t')?;
            let size: u64 = size_s.trim().parse().ok()?;
            if path.is_empty() { return None; }
            Some((path.to_string(), size))
        })
        .collect()
}
