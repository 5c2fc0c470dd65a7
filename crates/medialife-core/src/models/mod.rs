//! Data models for the media lifecycle
//!
//! Media records, their derived variants, the processing status state machine and the job
//! payloads exchanged with the task queue.

mod job;
mod media;
mod status;
mod variant;

pub use job::*;
pub use media::*;
pub use status::*;
pub use variant::*;
