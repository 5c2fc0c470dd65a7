//! medialife persistence
//!
//! The `MediaStore` / `VariantStore` contracts, their Postgres implementations, pool and
//! migration setup, and an in-memory store for tests and development.

pub mod db;
pub mod memory;
pub mod setup;
pub mod store;

pub use db::{PgMediaStore, PgVariantStore};
pub use memory::InMemoryStore;
pub use setup::setup_database;
pub use store::{MediaStore, VariantStore};
