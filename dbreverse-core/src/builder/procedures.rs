//! Stored procedure assembly from routine and parameter records.

use crate::catalog::{ParameterRecord, ROUTINE_TYPE_PROCEDURE, RoutineRecord, TABLE_TYPE_MARKER};
use crate::mapping::{ClrType, FALLBACK_TYPE_NAME, SqlType, TypeNameProvider, type_name_can_be_nullable};
use crate::models::{Parameter, ParameterDirection, StoredProcedure, Table};
use std::collections::HashMap;
use std::sync::Arc;

/// Parses a catalog `PARAMETER_MODE`.
///
/// Unrecognized modes are logged and read as [`ParameterDirection::Input`].
pub fn parse_direction(mode: &str, parameter_name: &str) -> ParameterDirection {
    match mode {
        "IN" => ParameterDirection::Input,
        "OUT" => ParameterDirection::Output,
        "INOUT" => ParameterDirection::InputOutput,
        _ => {
            tracing::warn!(
                "Unrecognised parameter mode '{}' for parameter '{}'. Falling back to Input.",
                mode,
                parameter_name
            );
            ParameterDirection::Input
        }
    }
}

/// Finds the table type a table-valued parameter is declared with.
///
/// Returns a clone of the shared reference, so repeated lookups against the
/// same set yield the same entity.
pub fn resolve_table_type(
    table_types: &[Arc<Table>],
    schema: Option<&str>,
    name: &str,
) -> Option<Arc<Table>> {
    let schema = schema?;
    table_types
        .iter()
        .find(|t| t.matches(schema, name))
        .map(Arc::clone)
}

/// Zero means "not applicable" in the parameter catalog.
fn non_zero(value: Option<i32>) -> Option<i32> {
    value.filter(|v| *v != 0)
}

fn build_parameter(
    record: &ParameterRecord,
    index: usize,
    procedure_name: &str,
    table_types: &[Arc<Table>],
    types: &dyn TypeNameProvider,
) -> Parameter {
    let user_defined_type = record
        .user_defined_type_name
        .as_deref()
        .filter(|n| !n.is_empty());
    let table_valued = match user_defined_type {
        Some(type_name) if record.data_type == TABLE_TYPE_MARKER => Some(type_name),
        _ => None,
    };

    let (sql_type_name, object_type_name, table_type) = match table_valued {
        Some(type_name) => {
            let table_type = resolve_table_type(
                table_types,
                record.user_defined_type_schema.as_deref(),
                type_name,
            );
            if table_type.is_none() {
                tracing::debug!(
                    "No table type found for parameter '{}' of '{}' ({}); using a generic table",
                    record.parameter_name,
                    procedure_name,
                    type_name
                );
            }
            let generic = types
                .parameter_type_name(
                    Some(TABLE_TYPE_MARKER),
                    &record.parameter_name,
                    Some(procedure_name),
                    None,
                )
                .or_else(|| ClrType::DataTable.type_name().map(str::to_string))
                .unwrap_or_else(|| FALLBACK_TYPE_NAME.to_string());
            (type_name.to_string(), generic, table_type)
        }
        None => {
            let object_type_name = types
                .parameter_type_name(
                    Some(&record.data_type),
                    &record.parameter_name,
                    Some(procedure_name),
                    None,
                )
                .unwrap_or_else(|| FALLBACK_TYPE_NAME.to_string());
            (record.data_type.clone(), object_type_name, None)
        }
    };

    let is_table_valued = table_valued.is_some();
    // The marker, not the user-defined name, decides how the value is bound
    let sql_db_type = SqlType::parse(&record.data_type)
        .sql_db_type()
        .map(str::to_string);
    let can_be_nullable = type_name_can_be_nullable(&object_type_name);
    Parameter {
        name: record.parameter_name.clone(),
        index,
        direction: parse_direction(&record.parameter_mode, &record.parameter_name),
        sql_type_name,
        object_type_name,
        sql_db_type,
        can_be_nullable,
        length: non_zero(record.character_maximum_length),
        precision: non_zero(record.numeric_precision),
        scale: non_zero(record.numeric_scale),
        is_identity: false,
        // INFORMATION_SCHEMA.PARAMETERS does not report nullability
        is_nullable: true,
        is_read_only: is_table_valued,
        is_table_valued,
        table_type,
    }
}

/// Builds stored procedures with their parameters.
///
/// Only routines of kind `PROCEDURE` accepted by `include` are kept; their
/// parameters are matched by `(schema, name)` and numbered in declared order.
/// `parameters` of `None` yields procedures without parameters. Result sets
/// are attached separately.
pub fn assemble_procedures(
    routines: Vec<RoutineRecord>,
    parameters: Option<&[ParameterRecord]>,
    table_types: &[Arc<Table>],
    include: &dyn Fn(&str, &str) -> bool,
    types: &dyn TypeNameProvider,
) -> Vec<StoredProcedure> {
    let mut by_procedure: HashMap<(String, String), Vec<&ParameterRecord>> = HashMap::new();
    for record in parameters.unwrap_or_default() {
        by_procedure
            .entry((record.specific_schema.clone(), record.specific_name.clone()))
            .or_default()
            .push(record);
    }

    routines
        .into_iter()
        .filter(|r| r.routine_type == ROUTINE_TYPE_PROCEDURE)
        .filter(|r| include(&r.specific_schema, &r.specific_name))
        .map(|routine| {
            let key = (routine.specific_schema, routine.specific_name);
            let mut records = by_procedure.remove(&key).unwrap_or_default();
            records.sort_by_key(|p| p.ordinal_position);
            let (schema, name) = key;

            let parameters = records
                .into_iter()
                .enumerate()
                .map(|(index, record)| build_parameter(record, index, &name, table_types, types))
                .collect();

            StoredProcedure {
                schema,
                name,
                parameters,
                result_set: None,
            }
        })
        .collect()
}
