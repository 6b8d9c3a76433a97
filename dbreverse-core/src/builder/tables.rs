//! Table assembly from flat column and constraint records.
//!
//! Used for both tables and table types; table types are assembled without a
//! constraint record set.

use crate::catalog::{ColumnConstraintRecord, ColumnRecord};
use crate::mapping::{FALLBACK_TYPE_NAME, SqlType, TypeNameProvider, type_name_can_be_nullable};
use crate::models::{Column, ColumnReference, Constraint, ConstraintType, ObjectName, Table};
use std::collections::HashMap;

const SEQUENTIAL_GUID_MARKER: &str = "newsequentialid";

type TableKey = (String, String);

/// Maps a catalog `CONSTRAINT_TYPE` onto the kinds kept in the model.
pub fn parse_constraint_type(constraint_type: &str) -> Option<ConstraintType> {
    match constraint_type {
        "PRIMARY KEY" => Some(ConstraintType::PrimaryKey),
        "FOREIGN KEY" => Some(ConstraintType::ForeignKey),
        _ => None,
    }
}

/// Decides whether a column is generated by the server.
///
/// True for identity, row-guid and computed columns, for `rowversion` /
/// `timestamp` columns, and for `uniqueidentifier` columns defaulting to
/// `newsequentialid()`.
pub fn is_read_only(record: &ColumnRecord) -> bool {
    let sql_type = SqlType::parse(&record.data_type);
    let sequential_guid = sql_type == SqlType::UniqueIdentifier
        && record
            .column_default
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(SEQUENTIAL_GUID_MARKER));

    record.is_identity
        || record.is_rowguid_col
        || record.is_computed
        || sql_type.is_row_version()
        || sequential_guid
}

/// Groups records by `(schema, name)`, keeping first-seen group order and
/// record order within each group.
fn group_by_table<T>(records: Vec<T>, key: impl Fn(&T) -> TableKey) -> Vec<(TableKey, Vec<T>)> {
    let mut index: HashMap<TableKey, usize> = HashMap::new();
    let mut groups: Vec<(TableKey, Vec<T>)> = Vec::new();

    for record in records {
        let k = key(&record);
        match index.get(&k) {
            Some(&i) => {
                if let Some((_, group)) = groups.get_mut(i) {
                    group.push(record);
                }
            }
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![record]));
            }
        }
    }

    groups
}

fn has_constraint(
    constraints: Option<&[ColumnConstraintRecord]>,
    column_name: &str,
    kind: ConstraintType,
) -> bool {
    constraints.is_some_and(|records| {
        records.iter().any(|c| {
            c.column_name == column_name && parse_constraint_type(&c.constraint_type) == Some(kind)
        })
    })
}

fn build_column(
    table: &ObjectName,
    record: ColumnRecord,
    constraints: Option<&[ColumnConstraintRecord]>,
    types: &dyn TypeNameProvider,
) -> Column {
    let read_only = is_read_only(&record);
    let object_type_name = types
        .column_type_name(
            Some(&record.data_type),
            Some(&table.name),
            Some(&record.column_name),
        )
        .unwrap_or_else(|| FALLBACK_TYPE_NAME.to_string());
    let can_be_nullable = type_name_can_be_nullable(&object_type_name);

    Column {
        table: table.clone(),
        sql_db_type: SqlType::parse(&record.data_type)
            .sql_db_type()
            .map(str::to_string),
        can_be_nullable,
        is_primary_key: has_constraint(constraints, &record.column_name, ConstraintType::PrimaryKey),
        is_foreign_key: has_constraint(constraints, &record.column_name, ConstraintType::ForeignKey),
        is_nullable: record.is_nullable == "YES",
        is_read_only: read_only,
        has_default_value: record.column_default.is_some(),
        object_type_name,
        name: record.column_name,
        ordinal: record.ordinal_position,
        sql_type_name: record.data_type,
        length: record.character_maximum_length,
        precision: record.numeric_precision,
        scale: record.numeric_scale,
        is_identity: record.is_identity,
        is_row_guid: record.is_rowguid_col,
        is_computed: record.is_computed,
        default_value: record.column_default,
    }
}

fn build_constraints(records: &[ColumnConstraintRecord]) -> Vec<Constraint> {
    records
        .iter()
        .filter_map(|record| {
            let constraint_type = parse_constraint_type(&record.constraint_type)?;
            let references = match constraint_type {
                ConstraintType::ForeignKey => Some(ColumnReference {
                    schema: record.pk_table_schema.clone().unwrap_or_default(),
                    table: record.pk_table_name.clone().unwrap_or_default(),
                    column: record.pk_column_name.clone().unwrap_or_default(),
                }),
                ConstraintType::PrimaryKey => None,
            };
            Some(Constraint {
                name: record.constraint_name.clone(),
                constraint_type,
                column_name: record.column_name.clone(),
                references,
            })
        })
        .collect()
}

/// Builds tables from column records.
///
/// `constraints` of `None` means the constraint set is unknown: every column
/// gets `is_primary_key == is_foreign_key == false` and no constraints are
/// attached. Tables rejected by `include` are dropped with all their columns.
///
/// # Example
/// ```rust
/// use dbreverse_core::builder::assemble_tables;
/// use dbreverse_core::catalog::ColumnRecord;
/// use dbreverse_core::mapping::ClrTypeNameProvider;
///
/// let column = ColumnRecord {
///     table_schema: "dbo".to_string(),
///     table_name: "Orders".to_string(),
///     column_name: "Id".to_string(),
///     ordinal_position: 1,
///     data_type: "int".to_string(),
///     character_maximum_length: None,
///     numeric_precision: Some(10),
///     numeric_scale: Some(0),
///     is_nullable: "NO".to_string(),
///     is_identity: true,
///     is_rowguid_col: false,
///     is_computed: false,
///     column_default: None,
/// };
///
/// let tables = assemble_tables(vec![column], None, &|_, _| true, &ClrTypeNameProvider);
/// assert_eq!(tables.len(), 1);
/// assert!(tables[0].columns[0].is_read_only);
/// ```
pub fn assemble_tables(
    columns: Vec<ColumnRecord>,
    constraints: Option<Vec<ColumnConstraintRecord>>,
    include: &dyn Fn(&str, &str) -> bool,
    types: &dyn TypeNameProvider,
) -> Vec<Table> {
    let mut constraints_by_table: Option<HashMap<TableKey, Vec<ColumnConstraintRecord>>> =
        constraints.map(|records| {
            group_by_table(records, |c| (c.table_schema.clone(), c.table_name.clone()))
                .into_iter()
                .collect()
        });

    group_by_table(columns, |c| (c.table_schema.clone(), c.table_name.clone()))
        .into_iter()
        .filter(|((schema, name), _)| include(schema, name))
        .map(|((schema, name), mut records)| {
            let table_constraints = constraints_by_table
                .as_mut()
                .map(|by_table| by_table.remove(&(schema.clone(), name.clone())).unwrap_or_default());
            let table_constraints = table_constraints.as_deref();

            let id = ObjectName::new(&schema, &name);
            records.sort_by_key(|r| r.ordinal_position);
            let columns = records
                .into_iter()
                .map(|record| build_column(&id, record, table_constraints, types))
                .collect();

            Table {
                constraints: table_constraints.map(build_constraints).unwrap_or_default(),
                schema,
                name,
                columns,
            }
        })
        .collect()
}
