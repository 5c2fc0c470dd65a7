//! In-process task queue: bounded channel, worker pool and retry.
//!
//! Shutdown: [`LocalTaskQueue::shutdown`] closes the channel, lets the pool drain the tasks already
//! queued, and waits for every handler up to `shutdown_timeout`. Dropping every handle to the
//! queue closes the channel the same way without waiting.

use anyhow::Result;
use async_trait::async_trait;
use medialife_core::models::JobKind;
use medialife_core::{AppError, Config, ErrorMetadata};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::context::TaskHandlerContext;
use crate::task::Task;

/// Maximum delay in seconds before retrying a failed task.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Exponential backoff from `base`, capped at [`MAX_RETRY_BACKOFF_SECS`].
#[inline]
pub(crate) fn compute_retry_backoff(retry_count: u32, base: Duration) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(retry_count))
        .min(Duration::from_secs(MAX_RETRY_BACKOFF_SECS))
}

/// Hands background work to whatever executes it.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Returns the id of the queued task.
    async fn enqueue(&self, kind: JobKind, payload: serde_json::Value) -> Result<Uuid, AppError>;
}

#[derive(Debug, Clone)]
pub struct TaskQueueConfig {
    pub max_workers: usize,
    pub max_retries: u32,
    /// Tasks that can wait in the channel before `enqueue` reports the queue as full.
    pub capacity: usize,
    pub retry_base_delay: Duration,
    pub task_timeout: Duration,
    /// How long `shutdown` waits for queued and running handlers.
    pub shutdown_timeout: Duration,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            max_retries: 3,
            capacity: 1024,
            retry_base_delay: Duration::from_secs(1),
            task_timeout: Duration::from_secs(3600),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl TaskQueueConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_workers: config.task_queue_max_workers().max(1),
            max_retries: config.task_queue_max_retries(),
            capacity: config.task_queue_capacity().max(1),
            ..Self::default()
        }
    }
}

/// Task queue running handlers on the current tokio runtime
#[derive(Clone)]
pub struct LocalTaskQueue {
    config: TaskQueueConfig,
    sender: mpsc::Sender<Task>,
    shutdown_tx: mpsc::Sender<()>,
    tracker: TaskTracker,
}

impl LocalTaskQueue {
    /// Create the queue and spawn its worker pool. Must be called inside a tokio runtime.
    pub fn new(config: TaskQueueConfig, context: Weak<dyn TaskHandlerContext>) -> Self {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let tracker = TaskTracker::new();
        let config_clone = config.clone();
        let pool_tracker = tracker.clone();
        tracker.spawn(async move {
            Self::worker_pool(config_clone, context, receiver, shutdown_rx, pool_tracker).await;
        });

        Self {
            config,
            sender,
            shutdown_tx,
            tracker,
        }
    }

    pub fn config(&self) -> &TaskQueueConfig {
        &self.config
    }

    async fn worker_pool(
        config: TaskQueueConfig,
        context: Weak<dyn TaskHandlerContext>,
        mut receiver: mpsc::Receiver<Task>,
        mut shutdown_rx: mpsc::Receiver<()>,
        tracker: TaskTracker,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            capacity = config.capacity,
            max_retries = config.max_retries,
            "Task queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));
        let mut draining = false;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv(), if !draining => {
                    // Stop accepting; tasks already in the channel still run.
                    tracing::info!("Task queue worker pool draining");
                    receiver.close();
                    draining = true;
                }
                next = receiver.recv() => {
                    let Some(task) = next else {
                        break;
                    };

                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };

                    let ctx = context.clone();
                    let task_config = config.clone();
                    tracker.spawn(async move {
                        let _permit = permit;
                        if let Err(e) = Self::process_task_with_retry(task, ctx, task_config).await {
                            tracing::error!(error = %e, "Task processing failed after retries");
                        }
                    });
                }
            }
        }

        tracing::info!("Task queue worker pool stopped");
    }

    #[tracing::instrument(skip(task, context, config), fields(task.id = %task.id, task.kind = %task.kind))]
    async fn process_task_with_retry(
        mut task: Task,
        context: Weak<dyn TaskHandlerContext>,
        config: TaskQueueConfig,
    ) -> Result<()> {
        loop {
            let ctx = context.upgrade().ok_or_else(|| {
                anyhow::anyhow!("TaskHandlerContext was dropped, cannot process task")
            })?;

            let result = match tokio::time::timeout(config.task_timeout, ctx.dispatch_task(&task))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!(
                    "Task execution timed out after {}s",
                    config.task_timeout.as_secs()
                )),
            };

            let e = match result {
                Ok(_) => {
                    tracing::info!(
                        task_id = %task.id,
                        task_kind = %task.kind,
                        retry_count = task.retry_count,
                        "Task completed successfully"
                    );
                    return Ok(());
                }
                Err(e) => e,
            };

            // Errors that say retrying cannot help, such as a missing record
            let is_unrecoverable = e
                .downcast_ref::<AppError>()
                .map(|app_err| !app_err.is_recoverable())
                .unwrap_or(false);

            tracing::error!(
                task_id = %task.id,
                error = %e,
                retry_count = task.retry_count,
                max_retries = task.max_retries,
                unrecoverable = is_unrecoverable,
                "Task execution failed"
            );

            if is_unrecoverable {
                tracing::error!(task_id = %task.id, "Task failed with unrecoverable error, will not retry");
                return Err(e);
            }

            if !task.can_retry() {
                tracing::error!(task_id = %task.id, "Task failed after max retries");
                return Err(e);
            }

            let backoff = compute_retry_backoff(task.retry_count, config.retry_base_delay);
            tracing::info!(
                task_id = %task.id,
                retry_count = task.retry_count + 1,
                backoff_ms = backoff.as_millis() as u64,
                "Scheduling task retry"
            );
            tokio::time::sleep(backoff).await;
            task.retry_count += 1;
        }
    }

    /// Stop accepting tasks, then wait for queued and running handlers up to
    /// `shutdown_timeout`. Returns whether everything finished in time.
    pub async fn shutdown(&self) -> bool {
        tracing::info!("Initiating task queue shutdown");
        let _ = self.shutdown_tx.try_send(());
        self.tracker.close();

        match tokio::time::timeout(self.config.shutdown_timeout, self.tracker.wait()).await {
            Ok(()) => {
                tracing::info!("Task queue shutdown complete");
                true
            }
            Err(_) => {
                tracing::warn!(
                    still_running = self.tracker.len(),
                    timeout_secs = self.config.shutdown_timeout.as_secs(),
                    "Task queue shutdown timed out, abandoning remaining tasks"
                );
                false
            }
        }
    }
}

#[async_trait]
impl TaskQueue for LocalTaskQueue {
    #[tracing::instrument(skip(self, payload))]
    async fn enqueue(&self, kind: JobKind, payload: serde_json::Value) -> Result<Uuid, AppError> {
        let task = Task::new(kind, payload, self.config.max_retries);
        let task_id = task.id;

        self.sender.try_send(task).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "full",
                TrySendError::Closed(_) => "closed",
            };
            tracing::error!(task_kind = %kind, reason, "Failed to enqueue task");
            AppError::Queue(format!("Task queue is {}", reason))
        })?;

        tracing::info!(task_id = %task_id, task_kind = %kind, "Task submitted to queue");
        Ok(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` dispatches with `error`, then succeeds.
    struct FlakyContext {
        failures: usize,
        unrecoverable: bool,
        attempts: AtomicUsize,
        done: mpsc::UnboundedSender<usize>,
    }

    #[async_trait]
    impl TaskHandlerContext for FlakyContext {
        async fn dispatch_task(self: Arc<Self>, _task: &Task) -> Result<serde_json::Value> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let _ = self.done.send(attempt);
            if attempt <= self.failures {
                let err = if self.unrecoverable {
                    AppError::NotFound("media gone".to_string())
                } else {
                    AppError::Storage("flaky backend".to_string())
                };
                return Err(err.into());
            }
            Ok(json!({ "attempt": attempt }))
        }
    }

    fn fast_config(max_retries: u32) -> TaskQueueConfig {
        TaskQueueConfig {
            max_workers: 2,
            max_retries,
            capacity: 8,
            retry_base_delay: Duration::from_millis(1),
            task_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    fn context(
        failures: usize,
        unrecoverable: bool,
    ) -> (Arc<FlakyContext>, mpsc::UnboundedReceiver<usize>) {
        let (done, rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(FlakyContext {
            failures,
            unrecoverable,
            attempts: AtomicUsize::new(0),
            done,
        });
        (ctx, rx)
    }

    async fn next_attempt(rx: &mut mpsc::UnboundedReceiver<usize>) -> Option<usize> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[test]
    fn retry_backoff_exponential_then_capped() {
        let base = Duration::from_secs(1);
        assert_eq!(compute_retry_backoff(0, base), Duration::from_secs(1));
        assert_eq!(compute_retry_backoff(1, base), Duration::from_secs(2));
        assert_eq!(compute_retry_backoff(8, base), Duration::from_secs(256));
        assert_eq!(
            compute_retry_backoff(9, base),
            Duration::from_secs(MAX_RETRY_BACKOFF_SECS)
        );
        assert_eq!(
            compute_retry_backoff(40, base),
            Duration::from_secs(MAX_RETRY_BACKOFF_SECS)
        );
    }

    #[tokio::test]
    async fn recoverable_errors_are_retried() {
        let (ctx, mut rx) = context(2, false);
        let weak: Weak<dyn TaskHandlerContext> = {
            let dyn_ctx: Arc<dyn TaskHandlerContext> = ctx.clone();
            Arc::downgrade(&dyn_ctx)
        };
        let queue = LocalTaskQueue::new(fast_config(3), weak);

        queue
            .enqueue(JobKind::ProcessMedia, json!({ "media_id": Uuid::nil() }))
            .await
            .unwrap();

        assert_eq!(next_attempt(&mut rx).await, Some(1));
        assert_eq!(next_attempt(&mut rx).await, Some(2));
        assert_eq!(next_attempt(&mut rx).await, Some(3));
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn unrecoverable_errors_are_not_retried() {
        let (ctx, mut rx) = context(5, true);
        let dyn_ctx: Arc<dyn TaskHandlerContext> = ctx.clone();
        let queue = LocalTaskQueue::new(fast_config(3), Arc::downgrade(&dyn_ctx));

        queue
            .enqueue(JobKind::Cleanup, json!({ "storage_key": "media/x" }))
            .await
            .unwrap();

        assert_eq!(next_attempt(&mut rx).await, Some(1));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ctx.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_stop_at_max_retries() {
        let (ctx, mut rx) = context(10, false);
        let dyn_ctx: Arc<dyn TaskHandlerContext> = ctx.clone();
        let queue = LocalTaskQueue::new(fast_config(1), Arc::downgrade(&dyn_ctx));

        queue.enqueue(JobKind::ProcessMedia, json!({})).await.unwrap();

        assert_eq!(next_attempt(&mut rx).await, Some(1));
        assert_eq!(next_attempt(&mut rx).await, Some(2));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ctx.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn enqueue_after_shutdown_reports_queue_error() {
        let queue = LocalTaskQueue::new(fast_config(0), crate::empty_context_weak());
        assert!(queue.shutdown().await);

        let err = queue
            .enqueue(JobKind::ProcessMedia, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Queue(_)));
    }

    /// Sleeps for `delay` on every dispatch and counts the ones that ran to the end.
    struct SlowContext {
        delay: Duration,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl TaskHandlerContext for SlowContext {
        async fn dispatch_task(self: Arc<Self>, _task: &Task) -> Result<serde_json::Value> {
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(json!({}))
        }
    }

    fn slow(delay: Duration) -> Arc<SlowContext> {
        Arc::new(SlowContext {
            delay,
            finished: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn shutdown_waits_for_queued_and_running_tasks() {
        let ctx = slow(Duration::from_millis(50));
        let dyn_ctx: Arc<dyn TaskHandlerContext> = ctx.clone();
        let mut config = fast_config(0);
        config.max_workers = 1;
        let queue = LocalTaskQueue::new(config, Arc::downgrade(&dyn_ctx));

        queue.enqueue(JobKind::ProcessMedia, json!({})).await.unwrap();
        queue.enqueue(JobKind::Cleanup, json!({})).await.unwrap();

        assert!(queue.shutdown().await);
        assert_eq!(ctx.finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_gives_up_after_timeout() {
        let ctx = slow(Duration::from_secs(3600));
        let dyn_ctx: Arc<dyn TaskHandlerContext> = ctx.clone();
        let mut config = fast_config(0);
        config.shutdown_timeout = Duration::from_millis(50);
        let queue = LocalTaskQueue::new(config, Arc::downgrade(&dyn_ctx));

        queue.enqueue(JobKind::ProcessMedia, json!({})).await.unwrap();

        let finished_in_time = tokio::time::timeout(Duration::from_secs(2), queue.shutdown())
            .await
            .unwrap();
        assert!(!finished_in_time);
        assert_eq!(ctx.finished.load(Ordering::SeqCst), 0);
    }
}
