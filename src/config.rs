use std::time::Duration;

use crate::error::{Result, SchedulerError};

/// Configuration for the aging policy.
///
/// When enabled, a background thread periodically recomputes every queued
/// job's effective priority as `base + rate_per_sec * seconds_waited` and
/// rebuilds the queue ordering in one pass. Jobs that wait long enough
/// eventually outrank fresher, nominally higher-priority arrivals.
#[derive(Debug, Clone)]
pub struct AgingConfig {
    /// Priority points gained per second of queue residence.
    pub rate_per_sec: i64,
    /// How often the effective priorities are recomputed.
    pub rebuild_interval: Duration,
}

impl Default for AgingConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: 1,
            rebuild_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker threads draining the queue.
    pub workers: usize,
    /// How long an idle worker waits for work before re-checking the
    /// lifecycle state.
    pub poll_interval: Duration,
    /// Optional anti-starvation aging. `None` dispatches on base priority
    /// alone.
    pub aging: Option<AgingConfig>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_interval: Duration::from_millis(100),
            aging: None,
        }
    }
}

impl SchedulerConfig {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_aging(mut self, aging: AgingConfig) -> Self {
        self.aging = Some(aging);
        self
    }

    /// Reject configurations the scheduler cannot run with.
    ///
    /// Called once at construction; a failure here is fatal rather than a
    /// per-call `false` because no amount of retrying fixes a zero-sized
    /// worker pool.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(SchedulerError::InvalidWorkerCount(self.workers));
        }
        if self.poll_interval.is_zero() {
            return Err(SchedulerError::InvalidPollInterval(
                self.poll_interval.as_millis() as u64,
            ));
        }
        if let Some(aging) = &self.aging {
            if aging.rate_per_sec <= 0 {
                return Err(SchedulerError::InvalidAgingRate(aging.rate_per_sec));
            }
            if aging.rebuild_interval.is_zero() {
                return Err(SchedulerError::InvalidRebuildInterval(
                    aging.rebuild_interval.as_millis() as u64,
                ));
            }
        }
        Ok(())
    }
}
