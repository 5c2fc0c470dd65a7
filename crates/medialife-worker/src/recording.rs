use async_trait::async_trait;
use medialife_core::models::JobKind;
use medialife_core::AppError;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::queue::TaskQueue;
use crate::task::Task;

/// Task queue that only records what was enqueued.
///
/// Tests drain it with [`RecordingTaskQueue::take_tasks`] and dispatch the tasks themselves.
#[derive(Debug, Default)]
pub struct RecordingTaskQueue {
    tasks: Mutex<Vec<Task>>,
    fail: AtomicBool,
}

impl RecordingTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `enqueue` fail with `AppError::Queue`.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().await.clone()
    }

    pub async fn tasks_of(&self, kind: JobKind) -> Vec<Task> {
        self.tasks
            .lock()
            .await
            .iter()
            .filter(|t| t.kind == kind)
            .cloned()
            .collect()
    }

    pub async fn take_tasks(&self) -> Vec<Task> {
        std::mem::take(&mut *self.tasks.lock().await)
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }
}

#[async_trait]
impl TaskQueue for RecordingTaskQueue {
    async fn enqueue(&self, kind: JobKind, payload: serde_json::Value) -> Result<Uuid, AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Queue("injected enqueue failure".to_string()));
        }
        let task = Task::new(kind, payload, 0);
        let id = task.id;
        self.tasks.lock().await.push(task);
        Ok(id)
    }
}
