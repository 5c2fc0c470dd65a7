//! medialife storage library
//!
//! The [`BlobStore`] contract consumed by the media lifecycle core, plus one adapter per backend:
//! local filesystem, S3 (through `object_store`) and an in-memory store used by tests and
//! development setups.
//!
//! # Key format
//!
//! - Primary payloads: `media/{media_id}-{slug}.{ext}`
//! - Renditions: `variants/{media_id}/{variant_id}.{format}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation lives in [`keys`] so all backends
//! agree on the layout.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_blob_store;
#[cfg(feature = "storage-local")]
pub use local::LocalBlobStore;
pub use medialife_core::StorageBackend;
pub use memory::InMemoryBlobStore;
#[cfg(feature = "storage-s3")]
pub use s3::S3BlobStore;
pub use traits::{BlobStore, StorageError, StorageResult};
