use std::panic::{self, AssertUnwindSafe};

use crate::scheduler::job::{JobId, JobStatus, JobTask, TaskError};

/// Result of running one job's task.
#[derive(Debug)]
pub struct ExecutionResult {
    pub job_id: JobId,
    pub status: JobStatus,
    pub error: Option<String>,
}

/// Runs submitted tasks and folds their outcome into a terminal status.
///
/// A task can fail two ways: by returning an error, or by panicking. Both
/// are contained here and recorded as `Failed` with a reason, so a bad job
/// never takes its worker thread down with it. Tasks run outside every
/// scheduler lock; a long or stuck task delays only the worker running it.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobExecutor;

impl JobExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute a claimed task to completion.
    pub fn execute(&self, job_id: JobId, task: JobTask) -> ExecutionResult {
        tracing::debug!(job_id = %job_id, "Executing job");

        let outcome = panic::catch_unwind(AssertUnwindSafe(task));
        Self::process_outcome(job_id, outcome)
    }

    fn process_outcome(
        job_id: JobId,
        outcome: std::thread::Result<Result<(), TaskError>>,
    ) -> ExecutionResult {
        let (status, error) = match outcome {
            Ok(Ok(())) => (JobStatus::Completed, None),
            Ok(Err(e)) => (JobStatus::Failed, Some(e.to_string())),
            Err(payload) => (JobStatus::Failed, Some(panic_message(&payload))),
        };

        match &error {
            None => tracing::debug!(job_id = %job_id, status = %status, "Job completed"),
            Some(reason) => {
                tracing::warn!(job_id = %job_id, status = %status, error = %reason, "Job failed")
            }
        }

        ExecutionResult {
            job_id,
            status,
            error,
        }
    }
}

/// Panic payloads are `&str` or `String` in practice; anything else gets a
/// placeholder rather than silence.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: <non-string payload>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_task_completes() {
        let executor = JobExecutor::new();
        let result = executor.execute(JobId(1), Box::new(|| Ok(())));
        assert_eq!(result.job_id, JobId(1));
        assert_eq!(result.status, JobStatus::Completed);
        assert!(result.error.is_none());
    }

    #[test]
    fn erroring_task_fails_with_reason() {
        let executor = JobExecutor::new();
        let result = executor.execute(JobId(2), Box::new(|| Err("disk full".into())));
        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("disk full"));
    }

    #[test]
    fn panicking_task_fails_without_unwinding() {
        let executor = JobExecutor::new();
        let result = executor.execute(JobId(3), Box::new(|| panic!("task blew up")));
        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("panic: task blew up"));
    }

    #[test]
    fn panic_with_string_payload_is_captured() {
        let executor = JobExecutor::new();
        let reason = String::from("formatted failure 42");
        let result = executor.execute(
            JobId(4),
            Box::new(move || panic!("{}", reason)),
        );
        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("panic: formatted failure 42"));
    }
}
