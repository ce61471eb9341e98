use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Outcome type for submitted tasks. Any error the task surfaces is stored
/// on the job as its failure reason.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// The work itself. Runs at most once, on one of the scheduler's worker
/// threads, outside every internal lock.
pub type JobTask = Box<dyn FnOnce() -> Result<(), TaskError> + Send + 'static>;

/// Identifier assigned at submission. Ids are unique for the lifetime of a
/// scheduler and strictly increasing in submission order, which is what lets
/// equal-priority jobs dispatch first-come-first-served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether a job in this status can still change status.
    ///
    /// `Queued` may become `Running` or `Cancelled`; `Running` may become
    /// `Completed` or `Failed`. The remaining three are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Mutable half of a job. Guarded by the owning record's mutex; only the
/// scheduler writes it, readers take snapshots through [`JobRecord::info`].
pub struct JobState {
    pub status: JobStatus,
    /// Current base priority. Reflects `update_priority` calls while queued;
    /// frozen once the job leaves the queue.
    pub priority: i64,
    /// The pending closure. Taken by the worker that claims the job, so a
    /// job can never run twice even if its id is somehow dispatched twice.
    pub task: Option<JobTask>,
    /// Failure reason, set when the task returns an error or panics.
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A submitted job as the scheduler tracks it.
///
/// The identity fields are immutable; everything that changes over the job's
/// lifetime sits behind the state mutex. Records are shared as
/// `Arc<JobRecord>` between the registry, the queue and the worker that
/// eventually runs the task.
pub struct JobRecord {
    pub id: JobId,
    /// Wall-clock submission stamp, for reporting.
    pub submitted_at: DateTime<Utc>,
    /// Monotonic submission stamp, for aging arithmetic.
    pub enqueued_at: Instant,
    pub state: Mutex<JobState>,
}

impl JobRecord {
    pub fn new(id: JobId, priority: i64, task: JobTask) -> Self {
        Self {
            id,
            submitted_at: Utc::now(),
            enqueued_at: Instant::now(),
            state: Mutex::new(JobState {
                status: JobStatus::Queued,
                priority,
                task: Some(task),
                error: None,
                started_at: None,
                finished_at: None,
            }),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.lock().status
    }

    /// Point-in-time snapshot for host-side reporting.
    pub fn info(&self) -> JobInfo {
        let state = self.state.lock();
        JobInfo {
            id: self.id,
            status: state.status,
            priority: state.priority,
            error: state.error.clone(),
            submitted_at: self.submitted_at,
            started_at: state.started_at,
            finished_at: state.finished_at,
        }
    }
}

impl fmt::Debug for JobRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRecord")
            .field("id", &self.id)
            .field("submitted_at", &self.submitted_at)
            .field("state", &self.state)
            .finish()
    }
}

impl fmt::Debug for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobState")
            .field("status", &self.status)
            .field("priority", &self.priority)
            .field("has_task", &self.task.is_some())
            .field("error", &self.error)
            .finish()
    }
}

/// Snapshot of a job's externally visible state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: JobId,
    pub status: JobStatus,
    pub priority: i64,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}
