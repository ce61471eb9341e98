//! Embeddable priority job scheduler.
//!
//! Submit closures at integer priorities; a fixed pool of worker threads
//! runs them highest-priority first, first-come-first-served within a
//! priority. Queued jobs can be reprioritized or cancelled in O(log n), and
//! an optional aging policy keeps low-priority jobs from starving under a
//! sustained stream of urgent work.
//!
//! ```no_run
//! use jobq::{Scheduler, SchedulerConfig};
//!
//! let scheduler = Scheduler::new(SchedulerConfig::new(4))?;
//! scheduler.start();
//!
//! let id = scheduler.submit(10, || {
//!     println!("doing the work");
//!     Ok(())
//! });
//!
//! scheduler.update_priority(id, 25);
//! scheduler.shutdown(true);
//! # Ok::<(), jobq::SchedulerError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod shutdown;
pub mod worker;

pub use config::{AgingConfig, SchedulerConfig};
pub use self::core::{Scheduler, SchedulerStats};
pub use error::{Result, SchedulerError};
pub use registry::JobRegistry;
pub use scheduler::{HeapEntry, JobId, JobInfo, JobQueue, JobStatus, JobTask, TaskError};
pub use shutdown::RunMode;
