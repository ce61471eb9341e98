use thiserror::Error;

/// Errors that abort scheduler construction.
///
/// Runtime conditions deliberately do not surface here: an unknown or
/// ineligible job id makes the mutating call return `false` (or `None` for
/// lookups), and a fault inside a submitted task is recorded on the job
/// itself. Only a configuration the scheduler cannot run with is an `Err`.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid worker count: {0} (must be at least 1)")]
    InvalidWorkerCount(usize),

    #[error("Invalid poll interval: {0}ms (must be non-zero)")]
    InvalidPollInterval(u64),

    #[error("Invalid aging rate: {0} (must be positive)")]
    InvalidAgingRate(i64),

    #[error("Invalid aging rebuild interval: {0}ms (must be non-zero)")]
    InvalidRebuildInterval(u64),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
