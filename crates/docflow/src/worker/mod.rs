pub mod job;
pub mod pool;

pub use job::{JobResult, WorkItem};
pub use pool::WorkerPool;
