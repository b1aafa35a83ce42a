//! Per-stage timing kept separate from caching.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{info, warn};

/// Cumulative time above which a stage is reported as slow.
pub const SLOW_STAGE_THRESHOLD: Duration = Duration::from_millis(200);

/// Accumulated timing for one stage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageTiming {
    /// Number of timed calls.
    pub calls: u32,
    /// Total elapsed time across calls.
    pub total: Duration,
}

/// Collects call counts and elapsed time per named stage.
#[derive(Debug, Default)]
pub struct StageTimings {
    stages: Mutex<BTreeMap<&'static str, StageTiming>>,
}

impl StageTimings {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` and charge its elapsed time to `stage`.
    pub fn time<T>(&self, stage: &'static str, work: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let output = work();
        self.record(stage, started.elapsed());
        output
    }

    /// Charge `elapsed` to `stage`.
    pub fn record(&self, stage: &'static str, elapsed: Duration) {
        let mut stages = self.stages.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = stages.entry(stage).or_default();
        entry.calls = entry.calls.saturating_add(1);
        entry.total = entry.total.saturating_add(elapsed);
    }

    /// Snapshot of every stage recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<&'static str, StageTiming> {
        self.stages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stages whose cumulative time exceeds `threshold`.
    #[must_use]
    pub fn slow_stages(&self, threshold: Duration) -> Vec<(&'static str, StageTiming)> {
        self.snapshot()
            .into_iter()
            .filter(|(_, timing)| timing.total > threshold)
            .collect()
    }

    /// Log every stage, flagging slow ones, then start over.
    pub fn report_and_reset(&self) {
        let stages = std::mem::take(
            &mut *self.stages.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for (stage, timing) in stages {
            if timing.total > SLOW_STAGE_THRESHOLD {
                warn!(
                    "SLOW {stage}: {} calls, {} ms",
                    timing.calls,
                    timing.total.as_millis()
                );
            } else {
                info!(
                    "{stage}: {} calls, {} ms",
                    timing.calls,
                    timing.total.as_millis()
                );
            }
        }
    }
}
