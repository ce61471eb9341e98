pub mod heap;
pub mod job;
pub mod queue;

pub use heap::{HeapEntry, JobHeap};
pub use job::{JobId, JobInfo, JobStatus, JobTask, TaskError};
pub use queue::JobQueue;
