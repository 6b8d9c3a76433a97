//! Unit tests for the database model orchestrator.

#![allow(clippy::unwrap_used)]

use super::*;
use crate::ReverseDbError;
use crate::catalog::{
    ColumnConstraintRecord, ColumnRecord, ParameterRecord, ResultColumnRecord, RoutineRecord,
    TABLE_TYPE_MARKER,
};
use crate::config::{ObjectTypes, filters};
use crate::mapping::{DefaultObjectNameProvider, ObjectNameProvider};
use crate::models::{Parameter, ResultColumn};
use async_trait::async_trait;
use std::time::Duration;

// =============================================================================
// Fixtures
// =============================================================================

fn column(schema: &str, table: &str, name: &str, ordinal: i32, data_type: &str) -> ColumnRecord {
    ColumnRecord {
        table_schema: schema.to_string(),
        table_name: table.to_string(),
        column_name: name.to_string(),
        ordinal_position: ordinal,
        data_type: data_type.to_string(),
        character_maximum_length: None,
        numeric_precision: None,
        numeric_scale: None,
        is_nullable: "NO".to_string(),
        is_identity: false,
        is_rowguid_col: false,
        is_computed: false,
        column_default: None,
    }
}

fn primary_key(schema: &str, table: &str, column: &str) -> ColumnConstraintRecord {
    ColumnConstraintRecord {
        table_schema: schema.to_string(),
        table_name: table.to_string(),
        column_name: column.to_string(),
        constraint_name: format!("PK_{}", table),
        constraint_type: "PRIMARY KEY".to_string(),
        pk_table_schema: None,
        pk_table_name: None,
        pk_column_name: None,
    }
}

fn procedure(schema: &str, name: &str) -> RoutineRecord {
    RoutineRecord {
        specific_schema: schema.to_string(),
        specific_name: name.to_string(),
        routine_type: "PROCEDURE".to_string(),
    }
}

fn table_valued_parameter(procedure: &str, type_name: &str) -> ParameterRecord {
    ParameterRecord {
        specific_schema: "dbo".to_string(),
        specific_name: procedure.to_string(),
        ordinal_position: 1,
        parameter_mode: "IN".to_string(),
        parameter_name: "@Rows".to_string(),
        data_type: TABLE_TYPE_MARKER.to_string(),
        character_maximum_length: None,
        numeric_precision: None,
        numeric_scale: None,
        user_defined_type_schema: Some("dbo".to_string()),
        user_defined_type_name: Some(type_name.to_string()),
    }
}

fn result_column(ordinal: i32, name: &str, type_name: &str) -> ResultColumnRecord {
    ResultColumnRecord {
        column_ordinal: ordinal,
        name: Some(name.to_string()).filter(|n| !n.is_empty()),
        type_name: Some(type_name.to_string()),
        source_table: None,
        source_column: None,
        is_nullable: false,
        is_hidden: false,
    }
}

fn full_snapshot() -> CatalogSnapshot {
    CatalogSnapshot {
        routines: Some(vec![procedure("dbo", "ImportRows")]),
        parameters: Some(vec![table_valued_parameter("ImportRows", "RowList")]),
        table_columns: Some(vec![
            column("dbo", "Orders", "Id", 1, "int"),
            column("dbo", "Orders", "Total", 2, "money"),
        ]),
        table_type_columns: Some(vec![column("dbo", "RowList", "Value", 1, "nvarchar")]),
        column_constraints: Some(vec![primary_key("dbo", "Orders", "Id")]),
        ..Default::default()
    }
    .with_result_set("dbo", "ImportRows", Some(vec![result_column(1, "Imported", "int")]))
}

/// Answers the table type query only after a delay, so the procedure
/// pipeline has its own record sets long before the table types exist.
struct SlowTableTypes {
    inner: InMemoryCatalog,
    delay: Duration,
}

#[async_trait]
impl CatalogSource for SlowTableTypes {
    async fn connect(&self) -> Result<()> {
        self.inner.connect().await
    }

    async fn routines(&self) -> Result<Option<Vec<RoutineRecord>>> {
        self.inner.routines().await
    }

    async fn parameters(&self) -> Result<Option<Vec<ParameterRecord>>> {
        self.inner.parameters().await
    }

    async fn table_columns(&self) -> Result<Option<Vec<ColumnRecord>>> {
        self.inner.table_columns().await
    }

    async fn table_type_columns(&self) -> Result<Option<Vec<ColumnRecord>>> {
        tokio::time::sleep(self.delay).await;
        self.inner.table_type_columns().await
    }

    async fn column_constraints(&self) -> Result<Option<Vec<ColumnConstraintRecord>>> {
        self.inner.column_constraints().await
    }

    async fn describe_first_result_set(
        &self,
        schema: &str,
        name: &str,
    ) -> Result<Option<Vec<ResultColumnRecord>>> {
        self.inner.describe_first_result_set(schema, name).await
    }

    fn safe_description(&self) -> String {
        self.inner.safe_description()
    }
}

/// Names unnamed result columns `Expr<ordinal>`, everything else as default.
#[derive(Debug)]
struct ExprNames;

impl ObjectNameProvider for ExprNames {
    fn table_class_name(&self, table: &Table) -> String {
        DefaultObjectNameProvider::default().table_class_name(table)
    }

    fn result_set_class_name(&self, procedure: &StoredProcedure) -> String {
        DefaultObjectNameProvider::default().result_set_class_name(procedure)
    }

    fn result_set_column_property_name(&self, column: &ResultColumn) -> String {
        format!("Expr{}", column.ordinal)
    }

    fn stored_procedure_method_name(&self, procedure: &StoredProcedure) -> String {
        DefaultObjectNameProvider::default().stored_procedure_method_name(procedure)
    }

    fn parameter_name(&self, parameter: &Parameter) -> String {
        DefaultObjectNameProvider::default().parameter_name(parameter)
    }
}

async fn build(catalog: &Arc<InMemoryCatalog>, options: BuildOptions) -> Result<DatabaseModel> {
    DatabaseBuilder::new(Arc::clone(catalog) as Arc<dyn CatalogSource>)
        .with_options(options)
        .build()
        .await
}

// =============================================================================
// Pipelines
// =============================================================================

#[tokio::test]
async fn test_build_assembles_all_pipelines() {
    let catalog = Arc::new(InMemoryCatalog::new(full_snapshot()));
    let model = build(&catalog, BuildOptions::default()).await.unwrap();

    assert_eq!(model.tables.len(), 1);
    assert!(model.tables[0].columns[0].is_primary_key);
    assert_eq!(model.table_types.len(), 1);
    assert_eq!(model.stored_procedures.len(), 1);

    let import = &model.stored_procedures[0];
    let parameter = &import.parameters[0];
    assert!(parameter.is_table_valued);
    assert!(Arc::ptr_eq(
        parameter.table_type.as_ref().unwrap(),
        &model.table_types[0]
    ));
    assert_eq!(import.result_set().unwrap().columns.len(), 1);
    assert!(model.metadata.warnings.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_parameters_wait_for_slow_table_types() {
    let catalog = Arc::new(SlowTableTypes {
        inner: InMemoryCatalog::new(full_snapshot()),
        delay: Duration::from_secs(30),
    });
    let model = DatabaseBuilder::new(Arc::clone(&catalog) as Arc<dyn CatalogSource>)
        .build()
        .await
        .unwrap();

    assert_eq!(model.table_types.len(), 1);
    let parameter = &model.stored_procedures[0].parameters[0];
    let table_type = parameter.table_type.as_ref().unwrap();
    assert!(Arc::ptr_eq(table_type, &model.table_types[0]));
    assert_eq!(table_type.columns[0].name, "Value");
    assert_eq!(catalog.inner.query_count(CatalogQuery::TableTypeColumns).await, 1);
    assert!(model.metadata.warnings.is_empty());
}

#[tokio::test]
async fn test_unnamed_result_columns_get_placeholders() {
    let snapshot = full_snapshot().with_result_set(
        "dbo",
        "ImportRows",
        Some(vec![
            result_column(1, "Imported", "int"),
            result_column(2, "", "int"),
        ]),
    );
    let catalog = Arc::new(InMemoryCatalog::new(snapshot));
    let model = build(&catalog, BuildOptions::default()).await.unwrap();

    let columns = &model.stored_procedures[0].result_set().unwrap().columns;
    assert_eq!(columns[0].name.as_deref(), Some("Imported"));
    assert_eq!(columns[1].name.as_deref(), Some("Column1"));
}

#[tokio::test]
async fn test_object_name_provider_is_configurable() {
    let snapshot = full_snapshot().with_result_set(
        "dbo",
        "ImportRows",
        Some(vec![result_column(1, "", "int")]),
    );
    let catalog = Arc::new(InMemoryCatalog::new(snapshot));
    let options = BuildOptions::new().with_object_name_provider(Arc::new(ExprNames));
    let model = build(&catalog, options).await.unwrap();

    let columns = &model.stored_procedures[0].result_set().unwrap().columns;
    assert_eq!(columns[0].name.as_deref(), Some("Expr0"));
}

#[tokio::test]
async fn test_missing_constraints_empty_tables_only() {
    let snapshot = CatalogSnapshot {
        column_constraints: None,
        ..full_snapshot()
    };
    let catalog = Arc::new(InMemoryCatalog::new(snapshot));
    let model = build(&catalog, BuildOptions::default()).await.unwrap();

    assert!(model.tables.is_empty());
    assert_eq!(model.stored_procedures.len(), 1);
    assert_eq!(model.table_types.len(), 1);
    assert_eq!(model.metadata.warnings, vec![NO_CONSTRAINTS_WARNING.to_string()]);
}

#[tokio::test]
async fn test_missing_columns_warns() {
    let snapshot = CatalogSnapshot {
        table_columns: None,
        ..full_snapshot()
    };
    let catalog = Arc::new(InMemoryCatalog::new(snapshot));
    let model = build(&catalog, BuildOptions::default()).await.unwrap();

    assert!(model.tables.is_empty());
    assert_eq!(model.metadata.warnings, vec![NO_TABLES_WARNING.to_string()]);
}

#[tokio::test]
async fn test_missing_table_types_is_silent() {
    let snapshot = CatalogSnapshot {
        table_type_columns: None,
        ..full_snapshot()
    };
    let catalog = Arc::new(InMemoryCatalog::new(snapshot));
    let model = build(&catalog, BuildOptions::default()).await.unwrap();

    assert!(model.table_types.is_empty());
    assert!(model.metadata.warnings.is_empty());

    // The table-valued parameter survives without a table type.
    let parameter = &model.stored_procedures[0].parameters[0];
    assert!(parameter.is_table_valued);
    assert!(parameter.table_type.is_none());
}

#[tokio::test]
async fn test_missing_routines_warns() {
    let snapshot = CatalogSnapshot {
        routines: None,
        ..full_snapshot()
    };
    let catalog = Arc::new(InMemoryCatalog::new(snapshot));
    let model = build(&catalog, BuildOptions::default()).await.unwrap();

    assert!(model.stored_procedures.is_empty());
    assert_eq!(model.tables.len(), 1);
    assert_eq!(model.metadata.warnings, vec![NO_PROCEDURES_WARNING.to_string()]);
    assert_eq!(catalog.query_count(CatalogQuery::DescribeFirstResultSet).await, 0);
}

#[tokio::test]
async fn test_missing_parameters_yields_parameterless_procedures() {
    let snapshot = CatalogSnapshot {
        parameters: None,
        ..full_snapshot()
    };
    let catalog = Arc::new(InMemoryCatalog::new(snapshot));
    let model = build(&catalog, BuildOptions::default()).await.unwrap();

    assert_eq!(model.stored_procedures.len(), 1);
    assert!(model.stored_procedures[0].parameters.is_empty());
    assert!(model.metadata.warnings.is_empty());
}

#[tokio::test]
async fn test_empty_model_warning() {
    let catalog = Arc::new(InMemoryCatalog::new(CatalogSnapshot {
        routines: Some(Vec::new()),
        table_columns: Some(Vec::new()),
        column_constraints: Some(Vec::new()),
        ..Default::default()
    }));
    let model = build(&catalog, BuildOptions::default()).await.unwrap();

    assert!(model.is_empty());
    assert_eq!(model.metadata.warnings, vec![EMPTY_MODEL_WARNING.to_string()]);
}

// =============================================================================
// Failure handling
// =============================================================================

#[tokio::test]
async fn test_connect_failure_is_fatal() {
    let catalog = Arc::new(InMemoryCatalog::new(full_snapshot()).with_failing_connect());
    let error = build(&catalog, BuildOptions::default()).await.unwrap_err();

    assert!(matches!(error, ReverseDbError::Connection { .. }));
    assert!(catalog.issued_queries().await.is_empty());
}

#[tokio::test]
async fn test_query_failure_degrades_its_pipeline() {
    let catalog = Arc::new(
        InMemoryCatalog::new(full_snapshot()).with_failing_query(CatalogQuery::TableColumns),
    );
    let model = build(&catalog, BuildOptions::default()).await.unwrap();

    assert!(model.tables.is_empty());
    assert_eq!(model.stored_procedures.len(), 1);
    assert_eq!(model.metadata.warnings.len(), 2);
    assert!(model.metadata.warnings[0].starts_with("Failed to query table columns"));
    assert_eq!(model.metadata.warnings[1], NO_TABLES_WARNING);
}

#[tokio::test]
async fn test_describe_failure_keeps_procedure() {
    let catalog = Arc::new(
        InMemoryCatalog::new(full_snapshot())
            .with_failing_query(CatalogQuery::DescribeFirstResultSet),
    );
    let model = build(&catalog, BuildOptions::default()).await.unwrap();

    let import = model.stored_procedure("dbo", "ImportRows").unwrap();
    assert!(import.result_set.is_none());
    assert_eq!(import.parameters.len(), 1);
    assert_eq!(model.metadata.warnings.len(), 1);
    assert!(model.metadata.warnings[0].contains("dbo.ImportRows"));
}

// =============================================================================
// Options
// =============================================================================

#[tokio::test]
async fn test_disabled_pipelines_issue_no_queries() {
    let catalog = Arc::new(InMemoryCatalog::new(full_snapshot()));
    let options = BuildOptions::new().with_object_types(ObjectTypes {
        tables: false,
        ..ObjectTypes::all()
    });
    let model = build(&catalog, options).await.unwrap();

    assert!(model.tables.is_empty());
    assert_eq!(model.stored_procedures.len(), 1);
    assert_eq!(catalog.query_count(CatalogQuery::TableColumns).await, 0);
    assert_eq!(catalog.query_count(CatalogQuery::ColumnConstraints).await, 0);
    assert!(model.metadata.warnings.is_empty());
}

#[tokio::test]
async fn test_everything_disabled() {
    let catalog = Arc::new(InMemoryCatalog::new(full_snapshot()));
    let options = BuildOptions::new().with_object_types(ObjectTypes::none());
    let model = build(&catalog, options).await.unwrap();

    assert_eq!(model.object_count(), 0);
    assert!(catalog.issued_queries().await.is_empty());
    assert!(model.metadata.warnings.is_empty());
    assert_eq!(catalog.connect_count(), 1);
}

#[tokio::test]
async fn test_disabled_table_types_leave_parameters_unresolved() {
    let catalog = Arc::new(InMemoryCatalog::new(full_snapshot()));
    let options = BuildOptions::new().with_object_types(ObjectTypes {
        table_types: false,
        ..ObjectTypes::all()
    });
    let model = build(&catalog, options).await.unwrap();

    assert!(model.table_types.is_empty());
    assert_eq!(catalog.query_count(CatalogQuery::TableTypeColumns).await, 0);
    assert!(model.stored_procedures[0].parameters[0].table_type.is_none());
}

#[tokio::test]
async fn test_table_type_filter() {
    let catalog = Arc::new(InMemoryCatalog::new(full_snapshot()));
    let options = BuildOptions::new().with_table_type_filter(filters::schemas(["sales"]));
    let model = build(&catalog, options).await.unwrap();

    assert!(model.table_types.is_empty());
    assert_eq!(model.tables.len(), 1);
}

#[tokio::test]
async fn test_metadata_is_populated() {
    let catalog = Arc::new(InMemoryCatalog::new(full_snapshot()));
    let before = chrono::Utc::now();
    let model = build(&catalog, BuildOptions::default()).await.unwrap();

    assert!(model.metadata.built_at >= before);
    assert_eq!(model.metadata.builder_version, env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_debug_does_not_leak_catalog_internals() {
    let builder = DatabaseBuilder::from_snapshot(CatalogSnapshot::default());
    let debug = format!("{:?}", builder);
    assert!(debug.contains("in-memory catalog snapshot"));
}
