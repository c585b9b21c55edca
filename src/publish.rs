use crate::config::Config;
use crate::error::CycleError;
use crate::models::breakdown::Breakdown;
use crate::models::sample::{RawSample, ScanMode};
use crate::reconcile::Reconciliation;
use crate::util::human::fmt_bytes;
use serde::Serialize;
use tracing::{info, warn};

/// Prefix shared by every published reading key.
pub const KEY_PREFIX: &str = "disk_usage";

/// One named numeric reading derived from a cycle, with enough metadata for
/// a presentation layer to render it.
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    /// Stable slug key, e.g. "disk_usage_add_ons".
    pub key:  String,
    /// Raw identity: category name or discovered path. Matches the
    /// reconciliation diff.
    pub name: String,
    /// The filesystem path that was measured.
    pub path: String,
    pub bytes: u64,
    /// Tree-mode provenance: the scan depth that discovered this path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    /// Tree-mode provenance: the noise threshold the path survived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size_mb: Option<u64>,
}

/// Lowercase slug: "&" → "and", "/", space and "-" → "_".
pub fn slugify(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .replace('&', "and")
        .replace(['/', ' ', '-'], "_")
}

pub fn reading_key(name: &str) -> String {
    format!("{}_{}", KEY_PREFIX, slugify(name))
}

/// Build the per-key readings for one sample.
pub fn readings(sample: &RawSample, cfg: &Config) -> Vec<Reading> {
    match sample.mode {
        ScanMode::Categories => sample
            .entries
            .iter()
            .map(|(name, &bytes)| {
                let path = cfg
                    .categories
                    .iter()
                    .find(|c| &c.name == name)
                    .map(|c| c.path.clone())
                    .unwrap_or_default();
                Reading {
                    key: reading_key(name),
                    name: name.clone(),
                    path,
                    bytes,
                    max_depth: None,
                    min_size_mb: None,
                }
            })
            .collect(),
        ScanMode::Tree => sample
            .entries
            .iter()
            .map(|(path, &bytes)| Reading {
                key:  reading_key(path),
                name: path.clone(),
                path: path.clone(),
                bytes,
                max_depth:   Some(cfg.tree.max_depth),
                min_size_mb: Some(cfg.tree.min_size_mb),
            })
            .collect(),
    }
}

/// Downstream consumer of published cycles. The engine never reaches into
/// presentation state; it only emits breakdowns and add/remove instructions
/// through this seam.
pub trait Publisher {
    fn publish(&mut self, breakdown: &Breakdown, readings: &[Reading], diff: &Reconciliation);
    fn cycle_failed(&mut self, error: &CycleError);
}

/// Logs every published change; the daemon's default consumer.
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish(&mut self, breakdown: &Breakdown, readings: &[Reading], diff: &Reconciliation) {
        for key in &diff.to_add {
            info!("reading added: {}", key);
        }
        for key in &diff.to_remove {
            info!("reading removed: {}", key);
        }
        let buckets = match (breakdown.user_bytes, breakdown.system_bytes) {
            (Some(user), Some(system)) => {
                format!(", user {}, system {}", fmt_bytes(user), fmt_bytes(system))
            }
            _ => String::new(),
        };
        info!(
            "{} readings: known {}, other {}{} of {} used ({:.0}%)",
            readings.len(),
            fmt_bytes(breakdown.known_bytes),
            fmt_bytes(breakdown.other_bytes),
            buckets,
            fmt_bytes(breakdown.capacity.used_bytes),
            breakdown.use_pct(),
        );
    }

    fn cycle_failed(&mut self, error: &CycleError) {
        warn!("cycle degraded, keeping last published readings: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample::Capacity;
    use std::collections::BTreeMap;

    #[test]
    fn slugs_match_the_published_naming_scheme() {
        assert_eq!(slugify("Add-ons"), "add_ons");
        assert_eq!(slugify("Home Assistant"), "home_assistant");
        assert_eq!(slugify("Movies & TV"), "movies_and_tv");
        assert_eq!(slugify(" Media "), "media");
        assert_eq!(reading_key("Share"), "disk_usage_share");
    }

    #[test]
    fn category_readings_carry_the_source_path() {
        let mut cfg = Config::default();
        cfg.categories = vec![crate::config::Category {
            name:    "Media".into(),
            path:    "/media".into(),
            enabled: true,
        }];
        let sample = RawSample {
            mode:     ScanMode::Categories,
            capacity: Capacity::default(),
            entries:  [("Media".to_string(), 42u64)].into_iter().collect(),
            per_root: BTreeMap::new(),
        };

        let r = readings(&sample, &cfg);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].key, "disk_usage_media");
        assert_eq!(r[0].path, "/media");
        assert_eq!(r[0].bytes, 42);
        assert_eq!(r[0].max_depth, None);
    }

    #[test]
    fn tree_readings_carry_scan_provenance() {
        let mut cfg = Config::default();
        cfg.categories.clear();
        cfg.tree.roots = vec!["/data".into()];
        cfg.tree.max_depth = 3;
        cfg.tree.min_size_mb = 5;

        let sample = RawSample {
            mode:     ScanMode::Tree,
            capacity: Capacity::default(),
            entries:  [("/data/media".to_string(), 7u64)].into_iter().collect(),
            per_root: BTreeMap::new(),
        };

        let r = readings(&sample, &cfg);
        assert_eq!(r[0].key, "disk_usage__data_media");
        assert_eq!(r[0].max_depth, Some(3));
        assert_eq!(r[0].min_size_mb, Some(5));
    }
}
