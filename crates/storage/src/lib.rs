mod queue;

pub use queue::{FileQueue, MemoryQueue, QueueStore};
