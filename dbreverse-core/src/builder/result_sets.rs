//! Result set inference for stored procedures.

use crate::catalog::{CatalogSource, ResultColumnRecord};
use crate::mapping::{
    FALLBACK_TYPE_NAME, ObjectNameProvider, SqlType, TypeNameProvider, type_name_can_be_nullable,
};
use crate::models::{ResultColumn, ResultSet, StoredProcedure};
use futures::future::join_all;

/// Converts described result columns into a result set.
///
/// Hidden rows and rows with catalog ordinal 0 are discarded, the rest are
/// renumbered from 0 in ordinal order. Unnamed columns are named by `names`
/// once their final ordinal is known. Returns `None` when no column remains.
pub fn assemble_result_set(
    records: Vec<ResultColumnRecord>,
    procedure_name: &str,
    types: &dyn TypeNameProvider,
    names: &dyn ObjectNameProvider,
) -> Option<ResultSet> {
    let mut columns: Vec<ResultColumn> = records
        .into_iter()
        .filter(|r| !r.is_hidden)
        .filter_map(|r| {
            let ordinal = r
                .column_ordinal
                .checked_sub(1)
                .and_then(|o| u32::try_from(o).ok())?;
            let name = r.name.filter(|n| !n.is_empty());
            let object_type_name = types
                .column_type_name(r.type_name.as_deref(), Some(procedure_name), name.as_deref())
                .unwrap_or_else(|| FALLBACK_TYPE_NAME.to_string());
            let sql_db_type = r
                .type_name
                .as_deref()
                .and_then(|t| SqlType::parse(t).sql_db_type())
                .map(str::to_string);

            Some(ResultColumn {
                ordinal,
                name,
                can_be_nullable: type_name_can_be_nullable(&object_type_name),
                sql_type_name: r.type_name,
                object_type_name,
                sql_db_type,
                is_nullable: r.is_nullable,
            })
        })
        .collect();

    if columns.is_empty() {
        return None;
    }

    columns.sort_by_key(|c| c.ordinal);
    // Gaps left by dropped rows are closed so ordinals stay dense.
    for (column, position) in columns.iter_mut().zip(0u32..) {
        column.ordinal = position;
        if column.name.is_none() {
            column.name = Some(names.result_set_column_property_name(column));
        }
    }

    Some(ResultSet { columns })
}

/// Describes the first result set of every procedure concurrently and
/// attaches the outcome.
///
/// A failed describe query leaves the procedure without a result set and
/// produces a warning, which is also returned to the caller.
pub async fn attach_result_sets(
    catalog: &dyn CatalogSource,
    procedures: &mut [StoredProcedure],
    types: &dyn TypeNameProvider,
    names: &dyn ObjectNameProvider,
) -> Vec<String> {
    let outcomes = join_all(
        procedures
            .iter()
            .map(|p| catalog.describe_first_result_set(&p.schema, &p.name)),
    )
    .await;

    let mut warnings = Vec::new();
    for (procedure, outcome) in procedures.iter_mut().zip(outcomes) {
        match outcome {
            Ok(Some(records)) => {
                procedure.result_set = assemble_result_set(records, &procedure.name, types, names);
                if procedure.result_set.is_none() {
                    tracing::debug!(
                        "Stored procedure {}.{} has no result set",
                        procedure.schema,
                        procedure.name
                    );
                }
            }
            Ok(None) => {
                tracing::debug!(
                    "No result set description returned for {}.{}",
                    procedure.schema,
                    procedure.name
                );
            }
            Err(e) => {
                let warning = format!(
                    "Failed to describe the result set of {}.{}: {}",
                    procedure.schema, procedure.name, e
                );
                tracing::warn!("{}", warning);
                warnings.push(warning);
            }
        }
    }

    warnings
}
