use crate::aggregate;
use crate::collectors::sample::Sampler;
use crate::config::Config;
use crate::error::CycleError;
use crate::models::breakdown::Breakdown;
use crate::models::sample::RawSample;
use crate::publish::{self, Publisher};
use crate::reconcile::{self, PublishedSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Scheduler state as visible to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    /// The last cycle failed; published data is stale but retained. The next
    /// tick re-attempts as usual.
    Degraded,
}

/// Drives the sample → aggregate → reconcile → publish pipeline.
///
/// One cycle at a time: the interval re-arms after a cycle completes, so a
/// slow cycle delays the next one rather than overlapping it, and a refresh
/// request that lands mid-cycle is satisfied by the in-flight cycle.
pub struct PollingScheduler<S: Sampler> {
    config:  Config,
    sampler: S,

    state:     SchedulerState,
    published: PublishedSet,
    current:   Option<(RawSample, Breakdown)>,

    refresh_requested: Arc<AtomicBool>,
    cycles_ok:     u64,
    cycles_failed: u64,
}

impl<S: Sampler> PollingScheduler<S> {
    pub fn new(config: Config, sampler: S) -> Self {
        Self {
            config,
            sampler,
            state:     SchedulerState::Idle,
            published: PublishedSet::default(),
            current:   None,
            refresh_requested: Arc::new(AtomicBool::new(false)),
            cycles_ok:     0,
            cycles_failed: 0,
        }
    }

    /// Run one measurement cycle and publish its result.
    pub fn run_cycle(&mut self, publisher: &mut dyn Publisher) -> Result<(), CycleError> {
        self.state = SchedulerState::Running;
        let started = Instant::now();
        let result  = self.sampler.collect(&self.config);
        // Whatever refresh arrived while measuring is answered by this cycle.
        self.refresh_requested.store(false, Ordering::Relaxed);

        match result {
            Ok(sample) => {
                let breakdown = aggregate::aggregate(&sample, &self.config.buckets.user_categories);
                let readings  = publish::readings(&sample, &self.config);
                let diff      = reconcile::reconcile(&self.published, &sample);
                // The previous-key state mutates only now, with the
                // breakdown fully computed.
                self.published.commit(&sample);
                publisher.publish(&breakdown, &readings, &diff);

                if !diff.is_empty() {
                    info!(
                        "key set changed: +{} -{}",
                        diff.to_add.len(),
                        diff.to_remove.len(),
                    );
                }
                info!(
                    "cycle ok in {:.1}s: {} keys",
                    started.elapsed().as_secs_f64(),
                    readings.len(),
                );
                self.current = Some((sample, breakdown));
                self.cycles_ok += 1;
                self.state = SchedulerState::Idle;
                Ok(())
            }
            Err(err) => {
                warn!("cycle failed after {:.1}s: {}", started.elapsed().as_secs_f64(), err);
                publisher.cycle_failed(&err);
                self.cycles_failed += 1;
                self.state = SchedulerState::Degraded;
                Err(err)
            }
        }
    }

    /// Poll until `shutdown` is set: an immediate first cycle, then one per
    /// interval. Cycle failures degrade the published data but never stop
    /// the loop.
    pub fn run(&mut self, publisher: &mut dyn Publisher, shutdown: &AtomicBool) {
        let interval = Duration::from_secs(self.config.general.interval_secs);
        info!(
            "polling {} every {}s in {} mode",
            self.config.general.mount_path,
            self.config.general.interval_secs,
            self.config.mode().label(),
        );

        while !shutdown.load(Ordering::SeqCst) {
            let _ = self.run_cycle(publisher);
            self.wait(interval, shutdown);
        }

        info!(
            "scheduler stopping after {} ok / {} failed cycles, {} keys published",
            self.cycles_ok,
            self.cycles_failed,
            self.published.len(),
        );
    }

    // ── Observer surface ──────────────────────────────────────────────
    // Consumed by an embedding presentation layer; within this binary only
    // the tests exercise it.
    #[allow(dead_code)]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Last successfully published sample and breakdown, surviving degraded
    /// cycles untouched.
    #[allow(dead_code)]
    pub fn current(&self) -> Option<&(RawSample, Breakdown)> {
        self.current.as_ref()
    }

    #[allow(dead_code)]
    pub fn published(&self) -> &PublishedSet {
        &self.published
    }

    /// Ask for an early cycle. Between cycles this wakes the loop; while a
    /// cycle is in flight it coalesces into a no-op.
    #[allow(dead_code)]
    pub fn request_refresh(&self) {
        self.refresh_requested.store(true, Ordering::Relaxed);
    }

    #[allow(dead_code)]
    pub fn refresh_pending(&self) -> bool {
        self.refresh_requested.load(Ordering::Relaxed)
    }

    // Interruptible sleep: wakes early on shutdown or an explicit refresh.
    fn wait(&self, interval: Duration, shutdown: &AtomicBool) {
        let mut remaining = interval;
        while remaining > Duration::ZERO && !shutdown.load(Ordering::SeqCst) {
            if self.refresh_requested.swap(false, Ordering::Relaxed) {
                return;
            }
            let nap = remaining.min(SLEEP_SLICE);
            std::thread::sleep(nap);
            remaining = remaining.saturating_sub(nap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample::{Capacity, ScanMode};
    use crate::publish::Reading;
    use crate::reconcile::Reconciliation;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// Plays back a script of per-cycle outcomes.
    struct ScriptedSampler {
        script: RefCell<Vec<Result<RawSample, CycleError>>>,
    }

    impl ScriptedSampler {
        fn new(script: Vec<Result<RawSample, CycleError>>) -> Self {
            Self { script: RefCell::new(script) }
        }
    }

    impl Sampler for ScriptedSampler {
        fn collect(&self, _cfg: &Config) -> Result<RawSample, CycleError> {
            self.script.borrow_mut().remove(0)
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Vec<(Breakdown, Vec<Reading>, Reconciliation)>,
        failures:  usize,
    }

    impl Publisher for RecordingPublisher {
        fn publish(&mut self, b: &Breakdown, r: &[Reading], d: &Reconciliation) {
            self.published.push((b.clone(), r.to_vec(), d.clone()));
        }
        fn cycle_failed(&mut self, _e: &CycleError) {
            self.failures += 1;
        }
    }

    fn good_sample(keys: &[&str]) -> RawSample {
        RawSample {
            mode:     ScanMode::Categories,
            capacity: Capacity { total_bytes: 1000, used_bytes: 600, free_bytes: 400 },
            entries:  keys.iter().map(|k| (k.to_string(), 100u64)).collect(),
            per_root: BTreeMap::new(),
        }
    }

    fn capacity_error() -> CycleError {
        CycleError::Capacity { mount: "/".into(), source: nix::Error::ENOENT }
    }

    #[test]
    fn failure_degrades_and_keeps_last_good_data() {
        let sampler = ScriptedSampler::new(vec![
            Ok(good_sample(&["A"])),
            Err(capacity_error()),
            Ok(good_sample(&["A"])),
        ]);
        let mut sched = PollingScheduler::new(Config::default(), sampler);
        let mut publisher = RecordingPublisher::default();

        sched.run_cycle(&mut publisher).unwrap();
        assert_eq!(sched.state(), SchedulerState::Idle);
        let good = sched.current().unwrap().1.clone();

        sched.run_cycle(&mut publisher).unwrap_err();
        assert_eq!(sched.state(), SchedulerState::Degraded);
        // Published data unchanged by the failed cycle.
        assert_eq!(sched.current().unwrap().1, good);
        assert!(sched.published().contains("A"));
        assert_eq!(publisher.failures, 1);

        // Next tick re-attempts and recovers.
        sched.run_cycle(&mut publisher).unwrap();
        assert_eq!(sched.state(), SchedulerState::Idle);
        assert_eq!(publisher.published.len(), 2);
    }

    #[test]
    fn reconciliation_tracks_key_churn_across_cycles() {
        let sampler = ScriptedSampler::new(vec![
            Ok(good_sample(&["A", "Q"])),
            Ok(good_sample(&["A", "P"])),
        ]);
        let mut sched = PollingScheduler::new(Config::default(), sampler);
        let mut publisher = RecordingPublisher::default();

        sched.run_cycle(&mut publisher).unwrap();
        let (_, _, first) = &publisher.published[0];
        assert_eq!(first.to_add.len(), 2);
        assert!(first.to_remove.is_empty());

        sched.run_cycle(&mut publisher).unwrap();
        let (_, _, second) = &publisher.published[1];
        assert_eq!(second.to_add, vec!["P".to_string()]);
        assert_eq!(second.to_remove, vec!["Q".to_string()]);
        assert!(sched.published().contains("P"));
        assert!(!sched.published().contains("Q"));
    }

    #[test]
    fn failed_cycle_does_not_touch_published_keys() {
        let sampler = ScriptedSampler::new(vec![
            Ok(good_sample(&["A"])),
            Err(capacity_error()),
        ]);
        let mut sched = PollingScheduler::new(Config::default(), sampler);
        let mut publisher = RecordingPublisher::default();

        sched.run_cycle(&mut publisher).unwrap();
        sched.run_cycle(&mut publisher).unwrap_err();
        assert_eq!(sched.published().len(), 1);
    }

    #[test]
    fn mid_cycle_refresh_coalesces() {
        let sampler = ScriptedSampler::new(vec![Ok(good_sample(&["A"]))]);
        let mut sched = PollingScheduler::new(Config::default(), sampler);
        let mut publisher = RecordingPublisher::default();

        // A request pending when the cycle starts is consumed by it.
        sched.request_refresh();
        assert!(sched.refresh_pending());
        sched.run_cycle(&mut publisher).unwrap();
        assert!(!sched.refresh_pending());
    }
}
