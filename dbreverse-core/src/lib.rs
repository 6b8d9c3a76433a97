//! Core library for dbreverse.
//!
//! Reads SQL Server catalog metadata and reverse-engineers it into an
//! in-memory [`DatabaseModel`] of tables, user-defined table types and stored
//! procedures. The model is the input of code generators; this crate does not
//! emit any code itself.
//!
//! # Security Guarantees
//! - No credentials stored or logged in any data structures
//! - All catalog queries are read-only; procedures are described, never executed
//! - Connection URLs are redacted before they reach a log line
//!
//! # Architecture
//! - [`catalog`]: the [`CatalogSource`] trait with a live SQL Server
//!   implementation and an in-memory replay of captured record sets
//! - [`builder`]: the table, table type and stored procedure assemblers, and
//!   the [`DatabaseBuilder`] that runs them concurrently
//! - [`mapping`]: pluggable type and identifier resolution policies

pub mod builder;
pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod models;

// Re-export commonly used types
pub use builder::DatabaseBuilder;
pub use catalog::{CatalogSnapshot, CatalogSource, InMemoryCatalog};
#[cfg(feature = "mssql")]
pub use catalog::SqlServerCatalog;
pub use config::{BuildOptions, ConnectionConfig, ObjectFilter, ObjectTypes};
pub use error::{ReverseDbError, Result, redact_database_url};
pub use mapping::{
    ClrTypeNameProvider, DefaultObjectNameProvider, ObjectNameProvider, TypeNameProvider,
};
pub use models::{
    BuildMetadata, Column, ColumnReference, Constraint, ConstraintType, DatabaseModel,
    ObjectName, Parameter, ParameterDirection, ResultColumn, ResultSet, StoredProcedure, Table,
};
