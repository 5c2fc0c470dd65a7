//! Postgres repositories for media and variant rows.

mod media;
mod variant;

pub use media::PgMediaStore;
pub use variant::PgVariantStore;
