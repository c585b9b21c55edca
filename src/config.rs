use crate::models::sample::ScanMode;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Polling interval bounds in seconds: one minute to one day.
pub const MIN_INTERVAL_SECS: u64 = 60;
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Validated immutable snapshot of the monitor's configuration. Constructed
/// once per reconfiguration; every component takes it as an explicit
/// parameter and never re-reads mutable state mid-cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    /// Category mode when non-empty; identity is the name.
    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,

    #[serde(default)]
    pub tree: TreeConfig,

    #[serde(default)]
    pub buckets: BucketsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Mount path of the monitored filesystem.
    pub mount_path: String,
    /// Polling interval in seconds, re-armed after each cycle completes.
    pub interval_secs: u64,
    /// Per-cycle ceiling; a hung probe forces a degraded cycle instead of
    /// starving the schedule.
    pub cycle_timeout_secs: u64,
}

/// A named, explicitly configured path whose size is tracked individually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub path: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Directories for depth-bounded recursive discovery; tree mode when
    /// `categories` is empty and this isn't.
    pub roots: Vec<String>,
    /// Inclusive depth bound below each root.
    pub max_depth: u32,
    /// Discovered paths below this many (ceiling-rounded) megabytes are
    /// suppressed as noise.
    pub min_size_mb: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketsConfig {
    /// Category names counting as "user-facing"; non-empty enables the
    /// system bucket (used minus user, clamped at zero).
    #[serde(default)]
    pub user_categories: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_categories() -> Vec<Category> {
    let defaults = [
        ("DB", "/config/home-assistant_v2.db"),
        ("Backups", "/backup"),
        ("Media", "/media"),
        ("Share", "/share"),
        ("Add-ons", "/addons"),
    ];
    defaults
        .iter()
        .map(|(name, path)| Category { name: name.to_string(), path: path.to_string(), enabled: true })
        .collect()
}

// ── Defaults ─────────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            general:    GeneralConfig::default(),
            categories: default_categories(),
            tree:       TreeConfig::default(),
            buckets:    BucketsConfig::default(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { mount_path: "/".into(), interval_secs: 3600, cycle_timeout_secs: 600 }
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self { roots: Vec::new(), max_depth: 2, min_size_mb: 1 }
    }
}

// ── Load / Validate ───────────────────────────────────────────────────

impl Config {
    pub fn load() -> Self {
        match try_load() {
            Ok(c) => c,
            Err(_) => {
                // Write defaults on first run (best-effort)
                let _ = try_write_defaults();
                Config::default()
            }
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("dub").join("dub.toml"))
    }

    /// Which measurement mode this configuration selects, by shape.
    pub fn mode(&self) -> ScanMode {
        if !self.categories.is_empty() {
            ScanMode::Categories
        } else {
            ScanMode::Tree
        }
    }

    pub fn enabled_categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter().filter(|c| c.enabled)
    }

    /// Apply-time validation. Per-cycle code relies on this having run and
    /// never re-validates.
    pub fn validate(&self) -> Result<()> {
        let g = &self.general;
        if g.mount_path.trim().is_empty() {
            bail!("mount_path is empty");
        }
        if !Path::new(&g.mount_path).exists() {
            bail!("mount_path {} does not exist", g.mount_path);
        }
        if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&g.interval_secs) {
            bail!(
                "interval_secs {} outside [{}, {}]",
                g.interval_secs,
                MIN_INTERVAL_SECS,
                MAX_INTERVAL_SECS
            );
        }
        if g.cycle_timeout_secs == 0 {
            bail!("cycle_timeout_secs must be at least 1");
        }

        if self.categories.is_empty() && self.tree.roots.is_empty() {
            bail!("no categories and no tree roots configured");
        }

        let mut seen = HashSet::new();
        for cat in &self.categories {
            if cat.name.trim().is_empty() || cat.path.trim().is_empty() {
                bail!("category with empty name or path");
            }
            if !seen.insert(cat.name.as_str()) {
                bail!("duplicate category name {}", cat.name);
            }
        }

        if self.mode() == ScanMode::Tree {
            if self.tree.max_depth == 0 {
                bail!("max_depth must be at least 1");
            }
            if self.tree.roots.iter().any(|r| r.trim().is_empty()) {
                bail!("tree root with empty path");
            }
        }

        for name in &self.buckets.user_categories {
            if !self.categories.iter().any(|c| &c.name == name) {
                bail!("user_categories names unknown category {}", name);
            }
        }

        Ok(())
    }
}

fn try_load() -> Result<Config> {
    let path = Config::config_path().ok_or_else(|| anyhow::anyhow!("no config dir"))?;
    let text = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&text)?;
    Ok(cfg)
}

fn try_write_defaults() -> Result<()> {
    let path = Config::config_path().ok_or_else(|| anyhow::anyhow!("no config dir"))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&Config::default())?;
    fs::write(path, format!("# dub configuration\n# Generated on first run, edit freely\n\n{}", text))?;
    Ok(())
}
