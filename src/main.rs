mod aggregate;
mod collectors;
mod config;
mod error;
mod models;
mod publish;
mod reconcile;
mod scheduler;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use collectors::sample::{SampleCollector, Sampler};
use config::Config;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dub", about = "Disk usage breakdown monitor", version = "0.1")]
struct Cli {
    /// Monitored mount path (overrides the config file)
    #[arg(short, long)]
    mount: Option<String>,

    /// Polling interval in seconds (overrides the config file)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Print a one-shot JSON snapshot of the breakdown and exit
    #[arg(long)]
    json: bool,

    /// Run as a headless daemon: poll on the configured interval and publish readings
    #[arg(long)]
    daemon: bool,

    /// Print config file path and current values, then exit
    #[arg(long)]
    config: bool,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let mut cfg = Config::load();
    if let Some(mount) = &cli.mount {
        cfg.general.mount_path = mount.clone();
    }
    if let Some(secs) = cli.interval {
        cfg.general.interval_secs = secs;
    }
    cfg.validate().context("invalid configuration")?;

    if cli.config {
        return run_print_config(&cfg);
    }
    if cli.json {
        return run_json_snapshot(&cfg);
    }
    if cli.daemon {
        return run_daemon(cfg);
    }
    run_once(&cfg)
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("dub={}", level).parse().expect("static directive"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Default mode: one measurement cycle, human-readable table on stdout.
fn run_once(cfg: &Config) -> Result<()> {
    use util::human::{fmt_bytes, fmt_pct};

    let sample = SampleCollector
        .collect(cfg)
        .context("measurement cycle failed")?;
    let breakdown = aggregate::aggregate(&sample, &cfg.buckets.user_categories);
    let readings  = publish::readings(&sample, cfg);

    println!("Mount: {}", cfg.general.mount_path);
    println!(
        "Capacity: {} total, {} used ({}), {} free",
        fmt_bytes(breakdown.capacity.total_bytes),
        fmt_bytes(breakdown.capacity.used_bytes),
        fmt_pct(breakdown.use_pct()),
        fmt_bytes(breakdown.capacity.free_bytes),
    );
    println!();

    let width = readings.iter().map(|r| r.name.len()).max().unwrap_or(0).max(8);
    for r in &readings {
        println!("  {:<width$}  {:>10}", r.name, fmt_bytes(r.bytes), width = width);
    }
    println!("  {:<width$}  {:>10}", "(known)", fmt_bytes(breakdown.known_bytes), width = width);
    println!("  {:<width$}  {:>10}", "Other", fmt_bytes(breakdown.other_bytes), width = width);
    if let (Some(user), Some(system)) = (breakdown.user_bytes, breakdown.system_bytes) {
        println!("  {:<width$}  {:>10}", "User", fmt_bytes(user), width = width);
        println!("  {:<width$}  {:>10}", "System", fmt_bytes(system), width = width);
    }
    Ok(())
}

/// One-shot machine-readable snapshot.
fn run_json_snapshot(cfg: &Config) -> Result<()> {
    use serde_json::json;
    use util::human::fmt_bytes;

    let sample = SampleCollector
        .collect(cfg)
        .context("measurement cycle failed")?;
    let breakdown = aggregate::aggregate(&sample, &cfg.buckets.user_categories);
    let readings  = publish::readings(&sample, cfg);

    let snapshot = json!({
        "dub_version": env!("CARGO_PKG_VERSION"),
        "timestamp":   chrono::Local::now().to_rfc3339(),
        "mount_path":  cfg.general.mount_path,
        "mode":        sample.mode,
        "capacity": {
            "total":    breakdown.capacity.total_bytes,
            "used":     breakdown.capacity.used_bytes,
            "free":     breakdown.capacity.free_bytes,
            "total_hr": fmt_bytes(breakdown.capacity.total_bytes),
            "used_hr":  fmt_bytes(breakdown.capacity.used_bytes),
            "free_hr":  fmt_bytes(breakdown.capacity.free_bytes),
            "use_pct":  breakdown.use_pct(),
        },
        "readings":     readings,
        "known_bytes":  breakdown.known_bytes,
        "other_bytes":  breakdown.other_bytes,
        "user_bytes":   breakdown.user_bytes,
        "system_bytes": breakdown.system_bytes,
        "known_hr":     fmt_bytes(breakdown.known_bytes),
        "other_hr":     fmt_bytes(breakdown.other_bytes),
    });

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn run_print_config(cfg: &Config) -> Result<()> {
    let path = Config::config_path()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    println!("Config: {}", path);
    println!();
    println!("[general]");
    println!("  mount_path         = {}", cfg.general.mount_path);
    println!("  interval_secs      = {}", cfg.general.interval_secs);
    println!("  cycle_timeout_secs = {}", cfg.general.cycle_timeout_secs);
    println!();
    println!("mode = {}", cfg.mode().label());
    match cfg.mode() {
        models::sample::ScanMode::Categories => {
            for cat in &cfg.categories {
                let state = if cat.enabled { "" } else { "  (disabled)" };
                println!("  category: {} → {}{}", cat.name, cat.path, state);
            }
        }
        models::sample::ScanMode::Tree => {
            println!("  roots       = {:?}", cfg.tree.roots);
            println!("  max_depth   = {}", cfg.tree.max_depth);
            println!("  min_size_mb = {}", cfg.tree.min_size_mb);
        }
    }
    if !cfg.buckets.user_categories.is_empty() {
        println!();
        println!("[buckets]");
        println!("  user_categories = {:?}", cfg.buckets.user_categories);
    }
    Ok(())
}

/// Headless daemon: poll until interrupted, publishing through the log.
fn run_daemon(cfg: Config) -> Result<()> {
    info!("dub {} starting as daemon", env!("CARGO_PKG_VERSION"));

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("failed to set signal handler: {}", e);
    }

    let mut scheduler = scheduler::PollingScheduler::new(cfg, SampleCollector);
    let mut publisher = publish::LogPublisher;
    scheduler.run(&mut publisher, &running);

    info!("shutdown complete");
    Ok(())
}
