//! medialife services
//!
//! The media lifecycle core. [`UploadIngestor`] turns bytes into persisted media records,
//! [`ProcessingOrchestrator`] drives the processing status machine and renditions,
//! [`MediaCatalog`] is the read/update/delete surface and [`VariantManager`] owns variant rows.
//! [`MediaService`] puts them behind one facade and dispatches background tasks.

pub mod catalog;
pub mod guards;
pub mod ingest;
pub mod orchestrator;
pub mod service;
pub mod setup;
pub mod variants;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{parse_id, MediaCatalog};
pub use guards::{PendingBlob, ProcessingClaim, ScratchBuffer};
pub use ingest::{UploadChunk, UploadInfo, UploadIngestor, UploadRequest};
pub use orchestrator::ProcessingOrchestrator;
pub use service::{MediaService, MediaServiceDeps};
pub use setup::{build_media_service, ServiceHandle};
pub use variants::VariantManager;
