use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::{AgingConfig, SchedulerConfig};
use crate::error::Result;
use crate::registry::JobRegistry;
use crate::scheduler::heap::HeapEntry;
use crate::scheduler::job::{JobId, JobInfo, JobRecord, JobStatus, JobTask, TaskError};
use crate::scheduler::queue::JobQueue;
use crate::shutdown::{Lifecycle, RunMode};
use crate::worker::JobExecutor;

/// Lifetime counters plus current queue occupancy.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SchedulerStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    /// Jobs currently waiting in the priority queue.
    pub queued: usize,
    /// Jobs still tracked in the registry, terminal ones included.
    pub tracked: usize,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

/// Priority job scheduler with a fixed pool of worker threads.
///
/// Jobs are submitted with an integer priority and run highest-priority
/// first; equal priorities run in submission order. While a job is still
/// queued its priority can be raised or lowered and it can be cancelled,
/// both in O(log n). Every submitted job is tracked in a registry until the
/// host evicts it, so status stays queryable after completion.
///
/// The scheduler is inert until [`start`](Self::start) spawns the worker
/// pool. Jobs submitted before that (or after a fast shutdown) wait in the
/// queue and dispatch once workers run.
pub struct Scheduler {
    config: SchedulerConfig,
    queue: Arc<JobQueue>,
    registry: Arc<JobRegistry>,
    lifecycle: Arc<Lifecycle>,
    executor: JobExecutor,
    counters: Arc<Counters>,
    next_id: AtomicU64,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a stopped scheduler.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable (zero workers,
    /// zero poll interval, non-positive aging rate). These are the only
    /// fatal errors in the crate; everything else is a per-call outcome.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            queue: Arc::new(JobQueue::new()),
            registry: Arc::new(JobRegistry::new()),
            lifecycle: Arc::new(Lifecycle::new()),
            executor: JobExecutor::new(),
            counters: Arc::new(Counters::default()),
            next_id: AtomicU64::new(0),
            threads: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the worker pool and, when aging is configured, the rebuild
    /// thread. Idempotent while running; called again after a fast shutdown
    /// it resumes dispatch of whatever stayed queued.
    pub fn start(&self) {
        let mut threads = self.threads.lock();
        if !threads.is_empty() {
            return;
        }
        self.lifecycle.set(RunMode::Running);

        for worker_id in 0..self.config.workers {
            let queue = Arc::clone(&self.queue);
            let registry = Arc::clone(&self.registry);
            let lifecycle = Arc::clone(&self.lifecycle);
            let counters = Arc::clone(&self.counters);
            let executor = self.executor;
            let poll_interval = self.config.poll_interval;
            let handle = thread::Builder::new()
                .name(format!("jobq-worker-{worker_id}"))
                .spawn(move || {
                    Self::worker_loop(
                        worker_id,
                        queue,
                        registry,
                        lifecycle,
                        executor,
                        counters,
                        poll_interval,
                    )
                })
                .expect("failed to spawn worker thread");
            threads.push(handle);
        }

        if let Some(aging) = self.config.aging.clone() {
            let queue = Arc::clone(&self.queue);
            let lifecycle = Arc::clone(&self.lifecycle);
            let handle = thread::Builder::new()
                .name("jobq-aging".to_string())
                .spawn(move || Self::aging_loop(queue, lifecycle, aging))
                .expect("failed to spawn aging thread");
            threads.push(handle);
        }

        tracing::info!(
            workers = self.config.workers,
            aging = self.config.aging.is_some(),
            "Scheduler started"
        );
    }

    /// Submit a task at the given priority. Returns the job's id, assigned
    /// from a monotonic counter.
    ///
    /// The task runs at most once, on a worker thread, with no scheduler
    /// lock held. Submission is accepted in every lifecycle state; a
    /// stopped scheduler just keeps the job queued.
    pub fn submit<F>(&self, priority: i64, task: F) -> JobId
    where
        F: FnOnce() -> std::result::Result<(), TaskError> + Send + 'static,
    {
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let task: JobTask = Box::new(task);
        let record = Arc::new(JobRecord::new(id, priority, task));

        // Register before enqueueing so a worker can never pop an id it
        // cannot resolve.
        self.registry.register(Arc::clone(&record));
        self.queue
            .insert(HeapEntry::new(id, priority, record.enqueued_at));
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(job_id = %id, priority, "Job submitted");
        id
    }

    /// Change a queued job's priority. The job re-ranks against the queue
    /// immediately; the very next dispatch sees the new order.
    ///
    /// Returns false when the job is unknown or no longer queued. Once a
    /// worker has claimed a job its priority is frozen.
    pub fn update_priority(&self, id: JobId, priority: i64) -> bool {
        if !self.queue.reprioritize(id, priority) {
            return false;
        }
        if let Some(record) = self.registry.find(id) {
            record.state.lock().priority = priority;
        }
        tracing::debug!(job_id = %id, priority, "Job reprioritized");
        true
    }

    /// Cancel a queued job.
    ///
    /// Only jobs still in the queue can be cancelled; excising the queue
    /// entry and marking the record `Cancelled` happen on the same path, so
    /// a cancelled job can never be dispatched afterwards. Returns false
    /// for unknown ids and for jobs already claimed, finished or cancelled.
    pub fn cancel(&self, id: JobId) -> bool {
        if !self.queue.remove(id) {
            return false;
        }
        if let Some(record) = self.registry.find(id) {
            let mut state = record.state.lock();
            state.status = JobStatus::Cancelled;
            state.task = None;
            state.finished_at = Some(Utc::now());
        }
        self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        tracing::info!(job_id = %id, "Job cancelled");
        true
    }

    /// Current status of a job, or `None` if the id is unknown (never
    /// submitted, or already evicted).
    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.registry.find(id).map(|record| record.status())
    }

    /// Full snapshot of a job's externally visible state.
    pub fn info(&self, id: JobId) -> Option<JobInfo> {
        self.registry.find(id).map(|record| record.info())
    }

    /// Drop a terminal job from the registry. Returns false while the job
    /// is still queued or running, or when the id is unknown.
    pub fn evict(&self, id: JobId) -> bool {
        let Some(record) = self.registry.find(id) else {
            return false;
        };
        if !record.status().is_terminal() {
            return false;
        }
        self.registry.remove(id).is_some()
    }

    /// Number of jobs waiting in the queue.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Number of jobs tracked in the registry, terminal ones included.
    pub fn job_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
            queued: self.queue.len(),
            tracked: self.registry.len(),
        }
    }

    /// Stop the worker pool and block until every thread has exited.
    ///
    /// Graceful shutdown (`graceful = true`) lets workers drain the queue
    /// completely; on return, every job submitted before the call has
    /// reached a terminal status. Fast shutdown stops workers after their
    /// in-flight job; queued jobs stay queued and a later
    /// [`start`](Self::start) resumes them.
    ///
    /// Calling this on a scheduler that is not running is a no-op.
    pub fn shutdown(&self, graceful: bool) {
        let mut threads = self.threads.lock();
        if threads.is_empty() {
            return;
        }
        tracing::info!(graceful, queued = self.queue.len(), "Scheduler shutting down");
        self.lifecycle.set(if graceful {
            RunMode::Draining
        } else {
            RunMode::Stopping
        });

        for handle in threads.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Scheduler thread panicked during shutdown");
            }
        }

        if graceful {
            // Submissions can race the last worker's exit; finish them here
            // so a graceful shutdown never strands a queued job.
            while let Some(entry) = self.queue.try_take() {
                Self::run_one(&self.registry, &self.executor, &self.counters, entry);
            }
        }

        tracing::info!(queued = self.queue.len(), "Scheduler stopped");
    }

    /// Worker loop: poll for work while running, drain to empty when asked
    /// to, stop as soon as fast shutdown is signalled.
    fn worker_loop(
        worker_id: usize,
        queue: Arc<JobQueue>,
        registry: Arc<JobRegistry>,
        lifecycle: Arc<Lifecycle>,
        executor: JobExecutor,
        counters: Arc<Counters>,
        poll_interval: Duration,
    ) {
        tracing::debug!(worker_id, "Worker started");
        loop {
            match lifecycle.mode() {
                RunMode::Running => {
                    if let Some(entry) = queue.poll(poll_interval) {
                        Self::run_one(&registry, &executor, &counters, entry);
                    }
                }
                RunMode::Draining => match queue.try_take() {
                    Some(entry) => Self::run_one(&registry, &executor, &counters, entry),
                    None => break,
                },
                RunMode::Stopping => break,
            }
        }
        tracing::debug!(worker_id, "Worker stopped");
    }

    /// Claim and execute one dispatched job.
    ///
    /// The claim takes the pending task out of the record and moves the
    /// status to `Running` in one critical section, so the task cannot run
    /// twice. A dispatched id whose record is not `Queued` is skipped; the
    /// queue excises cancelled entries, so hitting this means something
    /// external mutated the record.
    fn run_one(
        registry: &JobRegistry,
        executor: &JobExecutor,
        counters: &Counters,
        entry: HeapEntry,
    ) {
        let Some(record) = registry.find(entry.id) else {
            tracing::warn!(job_id = %entry.id, "Dispatched job has no record, skipping");
            return;
        };

        let task = {
            let mut state = record.state.lock();
            if state.status != JobStatus::Queued {
                tracing::warn!(
                    job_id = %entry.id,
                    status = %state.status,
                    "Dispatched job is not queued, skipping"
                );
                return;
            }
            let Some(task) = state.task.take() else {
                tracing::warn!(job_id = %entry.id, "Dispatched job has no task, skipping");
                return;
            };
            state.status = JobStatus::Running;
            state.started_at = Some(Utc::now());
            task
        };

        let result = executor.execute(entry.id, task);

        let mut state = record.state.lock();
        state.status = result.status;
        state.error = result.error;
        state.finished_at = Some(Utc::now());
        drop(state);

        match result.status {
            JobStatus::Completed => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Aging loop: every rebuild interval, fold waiting time into each
    /// queued job's effective priority. Exits on any lifecycle change.
    fn aging_loop(queue: Arc<JobQueue>, lifecycle: Arc<Lifecycle>, config: AgingConfig) {
        tracing::debug!(
            rate_per_sec = config.rate_per_sec,
            interval_ms = config.rebuild_interval.as_millis() as u64,
            "Aging thread started"
        );
        while lifecycle.sleep(RunMode::Running, config.rebuild_interval) == RunMode::Running {
            queue.age(config.rate_per_sec);
        }
        tracing::debug!("Aging thread stopped");
    }
}

impl Drop for Scheduler {
    /// Fast shutdown. Queued jobs are dropped with the scheduler; hosts
    /// that want them executed call [`shutdown(true)`](Self::shutdown)
    /// first.
    fn drop(&mut self) {
        self.shutdown(false);
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("queued", &self.queue.len())
            .field("tracked", &self.registry.len())
            .field("mode", &self.lifecycle.mode())
            .finish()
    }
}
