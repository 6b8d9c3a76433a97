//! Catalog access.
//!
//! A [`CatalogSource`] runs the fixed catalog queries and hands back flat
//! record sets. The builder never sees SQL or driver types, only the records
//! defined here. Each query distinguishes "no record set" (`Ok(None)`) from an
//! empty one (`Ok(Some(vec![]))`).

mod memory;
#[cfg(feature = "mssql")]
mod mssql;
pub mod queries;

pub use memory::{CapturedFailure, CapturedResultSet, CatalogSnapshot, InMemoryCatalog};
#[cfg(feature = "mssql")]
pub use mssql::SqlServerCatalog;

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Routine kind reported for stored procedures.
pub const ROUTINE_TYPE_PROCEDURE: &str = "PROCEDURE";

/// `DATA_TYPE` reported for table-valued parameters.
pub const TABLE_TYPE_MARKER: &str = "table type";

/// A stored procedure or table-valued function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RoutineRecord {
    /// Owning schema
    pub specific_schema: String,
    /// Routine name
    pub specific_name: String,
    /// `PROCEDURE` or `FUNCTION`
    pub routine_type: String,
}

/// A routine parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ParameterRecord {
    /// Schema of the owning routine
    pub specific_schema: String,
    /// Name of the owning routine
    pub specific_name: String,
    /// 1-based; 0 is the return value of a function
    pub ordinal_position: i32,
    /// `IN`, `OUT` or `INOUT`
    pub parameter_mode: String,
    /// Includes the leading `@`
    pub parameter_name: String,
    /// SQL type name, or `table type` for a table-valued parameter
    pub data_type: String,
    /// -1 for `max` types
    #[serde(default)]
    pub character_maximum_length: Option<i32>,
    /// Numeric precision
    #[serde(default)]
    pub numeric_precision: Option<i32>,
    /// Numeric scale
    #[serde(default)]
    pub numeric_scale: Option<i32>,
    /// Schema of the table type of a table-valued parameter
    #[serde(default)]
    pub user_defined_type_schema: Option<String>,
    /// Name of the table type of a table-valued parameter
    #[serde(default)]
    pub user_defined_type_name: Option<String>,
}

/// A table or table-type column, carrying its owning object's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ColumnRecord {
    /// Schema of the table or table type
    pub table_schema: String,
    /// Name of the table or table type
    pub table_name: String,
    /// Column name
    pub column_name: String,
    /// 1-based position within the table
    pub ordinal_position: i32,
    /// SQL type name
    pub data_type: String,
    /// -1 for `max` types
    #[serde(default)]
    pub character_maximum_length: Option<i32>,
    /// Numeric precision
    #[serde(default)]
    pub numeric_precision: Option<i32>,
    /// Numeric scale
    #[serde(default)]
    pub numeric_scale: Option<i32>,
    /// `YES` or `NO`
    pub is_nullable: String,
    /// `IDENTITY` column
    #[serde(default)]
    pub is_identity: bool,
    /// `ROWGUIDCOL` property
    #[serde(default)]
    pub is_rowguid_col: bool,
    /// Computed column
    #[serde(default)]
    pub is_computed: bool,
    /// Default expression as stored in the catalog, e.g. `((0))`
    #[serde(default)]
    pub column_default: Option<String>,
}

/// One column of a table constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ColumnConstraintRecord {
    /// Schema of the constrained table
    pub table_schema: String,
    /// Constrained table
    pub table_name: String,
    /// Constrained column
    pub column_name: String,
    /// Constraint name
    pub constraint_name: String,
    /// `PRIMARY KEY`, `FOREIGN KEY`, `UNIQUE`, ...
    pub constraint_type: String,
    /// Referenced schema; foreign keys only
    #[serde(default)]
    pub pk_table_schema: Option<String>,
    /// Referenced table; foreign keys only
    #[serde(default)]
    pub pk_table_name: Option<String>,
    /// Referenced column; foreign keys only
    #[serde(default)]
    pub pk_column_name: Option<String>,
}

/// One row of `sys.dm_exec_describe_first_result_set`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultColumnRecord {
    /// 1-based position; 0 for rows that do not describe an output column
    pub column_ordinal: i32,
    /// `None` for unnamed expressions
    #[serde(default)]
    pub name: Option<String>,
    /// SQL type name, e.g. `nvarchar(50)`
    #[serde(default)]
    pub type_name: Option<String>,
    /// Base table of the column, when known
    #[serde(default)]
    pub source_table: Option<String>,
    /// Base column of the column, when known
    #[serde(default)]
    pub source_column: Option<String>,
    /// Whether the column may return NULL
    pub is_nullable: bool,
    /// Extra column added for browsing information only
    #[serde(default)]
    pub is_hidden: bool,
}

/// The fixed catalog queries, used for logging and error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogQuery {
    /// `INFORMATION_SCHEMA.ROUTINES`
    Routines,
    /// `INFORMATION_SCHEMA.PARAMETERS`
    Parameters,
    /// Columns of user tables
    TableColumns,
    /// Columns of user-defined table types
    TableTypeColumns,
    /// Key constraints per column
    ColumnConstraints,
    /// `sys.dm_exec_describe_first_result_set` for one procedure
    DescribeFirstResultSet,
}

impl CatalogQuery {
    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Routines => "stored procedures",
            Self::Parameters => "parameters",
            Self::TableColumns => "table columns",
            Self::TableTypeColumns => "table type columns",
            Self::ColumnConstraints => "column constraints",
            Self::DescribeFirstResultSet => "first result set",
        }
    }
}

impl fmt::Display for CatalogQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Source of catalog record sets.
///
/// All methods take `&self` so that the builder can issue queries
/// concurrently; implementations serialize access to the underlying session
/// as needed.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Opens the catalog session. Calling it again on an open session is a no-op.
    ///
    /// # Errors
    /// Returns [`ReverseDbError::Connection`](crate::ReverseDbError::Connection)
    /// if the session cannot be established.
    async fn connect(&self) -> Result<()>;

    /// Stored procedures and table-valued functions.
    async fn routines(&self) -> Result<Option<Vec<RoutineRecord>>>;

    /// Parameters of all routines.
    async fn parameters(&self) -> Result<Option<Vec<ParameterRecord>>>;

    /// Columns of all user tables.
    async fn table_columns(&self) -> Result<Option<Vec<ColumnRecord>>>;

    /// Columns of all user-defined table types.
    async fn table_type_columns(&self) -> Result<Option<Vec<ColumnRecord>>>;

    /// PK, FK and other key constraints, one record per column.
    async fn column_constraints(&self) -> Result<Option<Vec<ColumnConstraintRecord>>>;

    /// Describes the first result set of one stored procedure without
    /// executing it.
    async fn describe_first_result_set(
        &self,
        schema: &str,
        name: &str,
    ) -> Result<Option<Vec<ResultColumnRecord>>>;

    /// Description safe for logs; never contains credentials.
    fn safe_description(&self) -> String;
}
