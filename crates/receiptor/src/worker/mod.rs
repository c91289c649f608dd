pub mod job;
pub mod pool;

pub use job::{WorkItem, WorkResult};
pub use pool::WorkerPool;
