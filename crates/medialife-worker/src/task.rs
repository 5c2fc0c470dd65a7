use chrono::{DateTime, Utc};
use medialife_core::models::JobKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of background work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(kind: JobKind, payload: serde_json::Value, max_retries: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payload,
            retry_count: 0,
            max_retries,
            created_at: Utc::now(),
        }
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Deserialize the payload into the job's typed shape.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> anyhow::Result<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            anyhow::anyhow!("Invalid payload for {} task {}: {}", self.kind, self.id, e)
        })
    }
}
