//! Configuration for catalog sessions and model builds.

mod build;
mod connection;

pub use build::{BuildOptions, ObjectFilter, ObjectTypes};
pub use connection::{ConnectionConfig, DEFAULT_PORT};

/// Constructors for common [`ObjectFilter`]s.
pub mod filters {
    pub use super::build::{both, exclude_pattern, schemas};
}
