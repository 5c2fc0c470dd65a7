//! medialife infrastructure
//!
//! Process-level concerns shared by medialife binaries. Currently only telemetry setup.

pub mod telemetry;

pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat};
