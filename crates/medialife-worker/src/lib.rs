//! medialife worker
//!
//! The [`TaskQueue`] contract the lifecycle core enqueues background work through, an
//! in-process implementation backed by a tokio channel and a bounded worker pool, and a
//! recording fake for tests.

pub mod context;
pub mod queue;
pub mod recording;
pub mod task;

pub use context::{empty_context_weak, TaskHandlerContext};
pub use queue::{LocalTaskQueue, TaskQueue, TaskQueueConfig, MAX_RETRY_BACKOFF_SECS};
pub use recording::RecordingTaskQueue;
pub use task::Task;
