use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{JOB_MEDIA_CLEANUP, JOB_MEDIA_PROCESS};

/// Kinds of background work handed to the task queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    #[serde(rename = "media:process")]
    ProcessMedia,
    #[serde(rename = "media:cleanup")]
    Cleanup,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ProcessMedia => JOB_MEDIA_PROCESS,
            JobKind::Cleanup => JOB_MEDIA_CLEANUP,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMediaPayload {
    pub media_id: Uuid,
}

/// Blob left behind by a delete whose storage cleanup failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupPayload {
    pub storage_key: String,
}
