//! Task execution for worker threads.
//!
//! Workers claim jobs from the priority queue and hand the pending closure
//! to this module:
//! - **Fault containment**: an error return or a panic becomes a `Failed`
//!   status with a recorded reason; the worker thread survives
//! - **Lock hygiene**: tasks run with no scheduler lock held
//!
//! # Components
//!
//! - [`JobExecutor`]: Runs one claimed task and reports its outcome
//! - [`ExecutionResult`](executor::ExecutionResult): Terminal status plus
//!   failure reason, ready to be written back onto the job record

pub mod executor;

pub use executor::JobExecutor;
