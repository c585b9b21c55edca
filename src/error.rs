use thiserror::Error;

/// A failure that aborts one measurement cycle.
///
/// Per-path probe failures never appear here: they degrade to a zero byte
/// count inside the probe layer. Only the conditions below push the
/// scheduler into its degraded state, and the previously published data is
/// retained across all of them.
#[derive(Error, Debug, Clone)]
pub enum CycleError {
    #[error("capacity probe failed for {mount}: {source}")]
    Capacity { mount: String, source: nix::Error },

    #[error("cycle exceeded its {0}s deadline")]
    Timeout(u64),

    #[error("a probe worker exited without reporting")]
    WorkerLost,
}
