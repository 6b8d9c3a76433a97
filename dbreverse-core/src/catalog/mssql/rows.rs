//! Typed extraction of catalog records from TDS rows.

use crate::Result;
use crate::catalog::{
    CatalogQuery, ColumnConstraintRecord, ColumnRecord, ParameterRecord, ResultColumnRecord,
    RoutineRecord,
};
use crate::error::ReverseDbError;
use tiberius::{FromSql, Row};

/// Extension trait for extracting typed values from TDS rows with consistent
/// error context.
pub(super) trait RowExt {
    /// Extracts a nullable field.
    fn get_field<'r, T>(&'r self, field: &str, query: CatalogQuery) -> Result<Option<T>>
    where
        T: FromSql<'r>;

    /// Extracts a field that must not be NULL.
    fn required<'r, T>(&'r self, field: &str, query: CatalogQuery) -> Result<T>
    where
        T: FromSql<'r>,
    {
        self.get_field(field, query)?
            .ok_or_else(|| ReverseDbError::row_decode(field, query.name()))
    }

    /// Extracts a non-NULL string field as an owned value.
    fn text(&self, field: &str, query: CatalogQuery) -> Result<String> {
        self.required::<&str>(field, query).map(str::to_string)
    }

    /// Extracts a nullable string field as an owned value.
    fn optional_text(&self, field: &str, query: CatalogQuery) -> Result<Option<String>> {
        Ok(self.get_field::<&str>(field, query)?.map(str::to_string))
    }

    /// Extracts a BIT field; NULL reads as false.
    fn flag(&self, field: &str, query: CatalogQuery) -> Result<bool> {
        Ok(self.get_field::<bool>(field, query)?.unwrap_or(false))
    }
}

impl RowExt for Row {
    fn get_field<'r, T>(&'r self, field: &str, query: CatalogQuery) -> Result<Option<T>>
    where
        T: FromSql<'r>,
    {
        self.try_get(field).map_err(|e| {
            tracing::debug!("Failed to decode {} from {}: {}", field, query, e);
            ReverseDbError::row_decode(field, query.name())
        })
    }
}

pub(super) fn routine(row: &Row) -> Result<RoutineRecord> {
    let q = CatalogQuery::Routines;
    Ok(RoutineRecord {
        specific_schema: row.text("SPECIFIC_SCHEMA", q)?,
        specific_name: row.text("SPECIFIC_NAME", q)?,
        routine_type: row.text("ROUTINE_TYPE", q)?,
    })
}

pub(super) fn parameter(row: &Row) -> Result<ParameterRecord> {
    let q = CatalogQuery::Parameters;
    Ok(ParameterRecord {
        specific_schema: row.text("SPECIFIC_SCHEMA", q)?,
        specific_name: row.text("SPECIFIC_NAME", q)?,
        ordinal_position: row.required("ORDINAL_POSITION", q)?,
        parameter_mode: row.optional_text("PARAMETER_MODE", q)?.unwrap_or_default(),
        parameter_name: row.optional_text("PARAMETER_NAME", q)?.unwrap_or_default(),
        data_type: row.text("DATA_TYPE", q)?,
        character_maximum_length: row.get_field("CHARACTER_MAXIMUM_LENGTH", q)?,
        numeric_precision: row.get_field("NUMERIC_PRECISION", q)?,
        numeric_scale: row.get_field("NUMERIC_SCALE", q)?,
        user_defined_type_schema: row.optional_text("USER_DEFINED_TYPE_SCHEMA", q)?,
        user_defined_type_name: row.optional_text("USER_DEFINED_TYPE_NAME", q)?,
    })
}

/// Decodes a table or table-type column; both queries share one shape.
pub(super) fn column(row: &Row, q: CatalogQuery) -> Result<ColumnRecord> {
    Ok(ColumnRecord {
        table_schema: row.text("TABLE_SCHEMA", q)?,
        table_name: row.text("TABLE_NAME", q)?,
        column_name: row.text("COLUMN_NAME", q)?,
        ordinal_position: row.required("ORDINAL_POSITION", q)?,
        data_type: row.text("DATA_TYPE", q)?,
        character_maximum_length: row.get_field("CHARACTER_MAXIMUM_LENGTH", q)?,
        numeric_precision: row.get_field("NUMERIC_PRECISION", q)?,
        numeric_scale: row.get_field("NUMERIC_SCALE", q)?,
        is_nullable: row.text("IS_NULLABLE", q)?,
        is_identity: row.flag("IS_IDENTITY", q)?,
        is_rowguid_col: row.flag("IS_ROWGUID_COL", q)?,
        is_computed: row.flag("IS_COMPUTED", q)?,
        column_default: row.optional_text("COLUMN_DEFAULT", q)?,
    })
}

pub(super) fn constraint(row: &Row) -> Result<ColumnConstraintRecord> {
    let q = CatalogQuery::ColumnConstraints;
    Ok(ColumnConstraintRecord {
        table_schema: row.text("TABLE_SCHEMA", q)?,
        table_name: row.text("TABLE_NAME", q)?,
        column_name: row.text("COLUMN_NAME", q)?,
        constraint_name: row.text("CONSTRAINT_NAME", q)?,
        constraint_type: row.text("CONSTRAINT_TYPE", q)?,
        pk_table_schema: row.optional_text("PK_TABLE_SCHEMA", q)?,
        pk_table_name: row.optional_text("PK_TABLE_NAME", q)?,
        pk_column_name: row.optional_text("PK_COLUMN_NAME", q)?,
    })
}

pub(super) fn result_column(row: &Row) -> Result<ResultColumnRecord> {
    let q = CatalogQuery::DescribeFirstResultSet;
    Ok(ResultColumnRecord {
        column_ordinal: row.get_field("column_ordinal", q)?.unwrap_or(0),
        name: row.optional_text("name", q)?,
        type_name: row.optional_text("type_name", q)?,
        source_table: row.optional_text("source_table", q)?,
        source_column: row.optional_text("source_column", q)?,
        is_nullable: row.get_field("is_nullable", q)?.unwrap_or(true),
        is_hidden: row.flag("is_hidden", q)?,
    })
}
