//! medialife core library
//!
//! Domain models, the error taxonomy, configuration, identifier generation and the ownership
//! guard shared by every medialife crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod models;
pub mod ownership;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, ServiceConfig};
pub use error::{AppError, ErrorMetadata, LogLevel, StatusClass};
pub use ids::{IdGenerator, SequentialIdGenerator, UuidGenerator};
pub use ownership::ensure_owner;
pub use storage_types::StorageBackend;
