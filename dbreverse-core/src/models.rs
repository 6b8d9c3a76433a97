//! The reverse-engineered database model.
//!
//! A [`DatabaseModel`] is built once per run by
//! [`DatabaseBuilder`](crate::builder::DatabaseBuilder) and is read-only
//! afterwards. Tables own their columns; a column refers back to its table by
//! identity ([`ObjectName`]) rather than by pointer. Table types are shared
//! through `Arc` so that table-valued parameters can point at the exact entity
//! held by the model.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Schema-qualified identity of a database object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectName {
    /// Owning schema, e.g. `dbo`
    pub schema: String,
    /// Object name within the schema
    pub name: String,
}

impl ObjectName {
    /// Creates a new object name
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Returns true if this identity matches the given schema and name.
    pub fn matches(&self, schema: &str, name: &str) -> bool {
        self.schema == schema && self.name == name
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Kinds of table constraints kept in the model.
///
/// Catalog constraint kinds other than these two are discarded on assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintType {
    /// `PRIMARY KEY`
    PrimaryKey,
    /// `FOREIGN KEY`
    ForeignKey,
}

/// The primary-key column a foreign key points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnReference {
    /// Schema of the referenced table
    pub schema: String,
    /// Referenced table
    pub table: String,
    /// Referenced column
    pub column: String,
}

/// A single-column constraint.
///
/// Multi-column keys appear as several constraints sharing one `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// Constraint name, e.g. `FK_Orders_Customers`
    pub name: String,
    /// Key kind
    pub constraint_type: ConstraintType,
    /// The constrained column of the owning table
    pub column_name: String,
    /// Referenced column, only set for foreign keys
    pub references: Option<ColumnReference>,
}

/// A table or table-type column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Identity of the owning table
    pub table: ObjectName,
    /// Column name
    pub name: String,
    /// Declared position from the catalog (1-based)
    pub ordinal: i32,
    /// Source (SQL Server) type name
    pub sql_type_name: String,
    /// Target type name resolved by the type name provider
    pub object_type_name: String,
    /// `SqlDbType` member used to bind a value of this column, if the source
    /// type has one
    pub sql_db_type: Option<String>,
    /// True if the target type is a value type that can be declared `Nullable<T>`
    pub can_be_nullable: bool,
    /// Maximum length, -1 for `max` types
    pub length: Option<i32>,
    /// Numeric precision
    pub precision: Option<i32>,
    /// Numeric scale
    pub scale: Option<i32>,
    /// `IDENTITY` column
    pub is_identity: bool,
    /// Part of the primary key; false when constraints were not collected
    pub is_primary_key: bool,
    /// Part of a foreign key; false when constraints were not collected
    pub is_foreign_key: bool,
    /// Accepts `NULL`
    pub is_nullable: bool,
    /// True if the value is generated by the server and must not be written
    pub is_read_only: bool,
    /// `ROWGUIDCOL` column
    pub is_row_guid: bool,
    /// Computed column
    pub is_computed: bool,
    /// True if the column declares a default
    pub has_default_value: bool,
    /// Default expression as stored in the catalog, e.g. `((0))`
    pub default_value: Option<String>,
}

/// A table, or a user-defined table type (which has no constraints).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Owning schema
    pub schema: String,
    /// Table or table type name
    pub name: String,
    /// Columns in declared order
    pub columns: Vec<Column>,
    /// Primary and foreign key constraints; empty for table types
    pub constraints: Vec<Constraint>,
}

impl Table {
    /// Returns the schema-qualified identity of this table.
    pub fn object_name(&self) -> ObjectName {
        ObjectName::new(&self.schema, &self.name)
    }

    /// Returns true if this table has the given schema and name.
    pub fn matches(&self, schema: &str, name: &str) -> bool {
        self.schema == schema && self.name == name
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns flagged as part of the primary key, in declared order.
    pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_primary_key)
    }

    /// Foreign-key constraints of this table.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints
            .iter()
            .filter(|c| c.constraint_type == ConstraintType::ForeignKey)
    }

    /// Describes the row shape a `SELECT` of all columns returns.
    pub fn result_set(&self) -> ResultSet {
        let columns = self
            .columns
            .iter()
            .zip(0u32..)
            .map(|(column, ordinal)| ResultColumn {
                ordinal,
                name: Some(column.name.clone()),
                sql_type_name: Some(column.sql_type_name.clone()),
                object_type_name: column.object_type_name.clone(),
                sql_db_type: column.sql_db_type.clone(),
                can_be_nullable: column.can_be_nullable,
                is_nullable: column.is_nullable,
            })
            .collect();
        ResultSet { columns }
    }
}

/// Direction of a stored procedure parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParameterDirection {
    /// `IN`
    #[default]
    Input,
    /// `OUT`
    Output,
    /// `INOUT`
    InputOutput,
}

/// A stored procedure parameter.
#[derive(Debug, Clone, Serialize)]
pub struct Parameter {
    /// Parameter name as declared, including the leading `@`
    pub name: String,
    /// 0-based position in the procedure's parameter list
    pub index: usize,
    /// Declared mode
    pub direction: ParameterDirection,
    /// Source type name; the user-defined type name for table-valued parameters
    pub sql_type_name: String,
    /// Target type name; `DataTable` for table-valued parameters
    pub object_type_name: String,
    /// `SqlDbType` member used to bind the parameter (`Structured` for
    /// table-valued parameters)
    pub sql_db_type: Option<String>,
    /// True if the target type is a value type that can be declared `Nullable<T>`
    pub can_be_nullable: bool,
    /// Maximum length, absent when the catalog reports 0
    pub length: Option<i32>,
    /// Numeric precision, absent when the catalog reports 0
    pub precision: Option<i32>,
    /// Numeric scale, absent when the catalog reports 0
    pub scale: Option<i32>,
    /// Always false for parameters
    pub is_identity: bool,
    /// Always true: the parameter catalog does not report nullability
    pub is_nullable: bool,
    /// True for table-valued parameters, which are passed `READONLY`
    pub is_read_only: bool,
    /// Declared with a user-defined table type
    pub is_table_valued: bool,
    /// Matching table type, only for table-valued parameters that resolved
    #[serde(serialize_with = "serialize_table_ref")]
    pub table_type: Option<Arc<Table>>,
}

fn serialize_table_ref<S>(table: &Option<Arc<Table>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    table
        .as_ref()
        .map(|t| t.object_name())
        .serialize(serializer)
}

/// One column of an inferred result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultColumn {
    /// 0-based, gap-free position
    pub ordinal: u32,
    /// Column name; unnamed expressions get a placeholder from the
    /// [`ObjectNameProvider`](crate::mapping::ObjectNameProvider)
    pub name: Option<String>,
    /// Source type name, if the server could describe it
    pub sql_type_name: Option<String>,
    /// Target type name resolved by the type name provider
    pub object_type_name: String,
    /// `SqlDbType` member for the source type, if it has one
    pub sql_db_type: Option<String>,
    /// True if the target type is a value type that can be declared `Nullable<T>`
    pub can_be_nullable: bool,
    /// Accepts `NULL`
    pub is_nullable: bool,
}

/// Shape of the rows a query returns.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultSet {
    /// Columns by ascending ordinal
    pub columns: Vec<ResultColumn>,
}

/// A stored procedure.
///
/// Only the first result set of a procedure is ever described; `result_set` is
/// `None` when inference failed or yielded no usable columns.
#[derive(Debug, Clone, Serialize)]
pub struct StoredProcedure {
    /// Owning schema
    pub schema: String,
    /// Procedure name
    pub name: String,
    /// Parameters in declared order
    pub parameters: Vec<Parameter>,
    /// Inferred first result set
    pub result_set: Option<ResultSet>,
}

impl StoredProcedure {
    /// Returns the schema-qualified identity of this procedure.
    pub fn object_name(&self) -> ObjectName {
        ObjectName::new(&self.schema, &self.name)
    }

    /// Returns the inferred result set, if any.
    pub fn result_set(&self) -> Option<&ResultSet> {
        self.result_set.as_ref()
    }

    /// Looks up a parameter by its declared name (including `@`).
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Build metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildMetadata {
    /// When the build finished
    pub built_at: chrono::DateTime<chrono::Utc>,
    /// Wall-clock build time, connect included
    pub duration_ms: u64,
    /// Version of this crate
    pub builder_version: String,
    /// Degraded conditions, tables first, then table types, then procedures
    pub warnings: Vec<String>,
}

impl Default for BuildMetadata {
    fn default() -> Self {
        Self {
            built_at: chrono::Utc::now(),
            duration_ms: 0,
            builder_version: env!("CARGO_PKG_VERSION").to_string(),
            warnings: Vec::new(),
        }
    }
}

/// The complete model of one database.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatabaseModel {
    /// Tables in catalog order
    pub tables: Vec<Table>,
    /// User-defined table types, shared with table-valued parameters
    pub table_types: Vec<Arc<Table>>,
    /// Stored procedures in catalog order
    pub stored_procedures: Vec<StoredProcedure>,
    /// Build bookkeeping
    pub metadata: BuildMetadata,
}

impl DatabaseModel {
    /// Looks up a table by schema and name.
    pub fn table(&self, schema: &str, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.matches(schema, name))
    }

    /// Looks up a table type by schema and name.
    pub fn table_type(&self, schema: &str, name: &str) -> Option<&Arc<Table>> {
        self.table_types.iter().find(|t| t.matches(schema, name))
    }

    /// Looks up a stored procedure by schema and name.
    pub fn stored_procedure(&self, schema: &str, name: &str) -> Option<&StoredProcedure> {
        self.stored_procedures
            .iter()
            .find(|p| p.schema == schema && p.name == name)
    }

    /// True if neither tables nor stored procedures were found.
    ///
    /// Table types are not considered; a database with only table types is
    /// still reported as empty.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.stored_procedures.is_empty()
    }

    /// Gets the total number of top-level objects
    pub fn object_count(&self) -> usize {
        self.tables
            .len()
            .saturating_add(self.table_types.len())
            .saturating_add(self.stored_procedures.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn column(table: &ObjectName, name: &str, ordinal: i32) -> Column {
        Column {
            table: table.clone(),
            name: name.to_string(),
            ordinal,
            sql_type_name: "int".to_string(),
            object_type_name: "int".to_string(),
            sql_db_type: Some("Int".to_string()),
            can_be_nullable: true,
            length: None,
            precision: Some(10),
            scale: Some(0),
            is_identity: false,
            is_primary_key: false,
            is_foreign_key: false,
            is_nullable: false,
            is_read_only: false,
            is_row_guid: false,
            is_computed: false,
            has_default_value: false,
            default_value: None,
        }
    }

    fn orders() -> Table {
        let id = ObjectName::new("dbo", "Orders");
        let mut key = column(&id, "Id", 1);
        key.is_primary_key = true;
        let mut customer = column(&id, "CustomerId", 2);
        customer.is_foreign_key = true;
        customer.is_nullable = true;

        Table {
            schema: "dbo".to_string(),
            name: "Orders".to_string(),
            columns: vec![key, customer],
            constraints: vec![
                Constraint {
                    name: "PK_Orders".to_string(),
                    constraint_type: ConstraintType::PrimaryKey,
                    column_name: "Id".to_string(),
                    references: None,
                },
                Constraint {
                    name: "FK_Orders_Customers".to_string(),
                    constraint_type: ConstraintType::ForeignKey,
                    column_name: "CustomerId".to_string(),
                    references: Some(ColumnReference {
                        schema: "dbo".to_string(),
                        table: "Customers".to_string(),
                        column: "Id".to_string(),
                    }),
                },
            ],
        }
    }

    #[test]
    fn test_object_name_display() {
        assert_eq!(ObjectName::new("sales", "Orders").to_string(), "sales.Orders");
        assert!(ObjectName::new("dbo", "X").matches("dbo", "X"));
        assert!(!ObjectName::new("dbo", "X").matches("sales", "X"));
    }

    #[test]
    fn test_table_key_accessors() {
        let table = orders();
        let keys: Vec<_> = table.primary_key_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(keys, vec!["Id"]);

        let fks: Vec<_> = table.foreign_keys().collect();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].references.as_ref().map(|r| r.table.as_str()), Some("Customers"));
        assert!(table.column("CustomerId").is_some());
        assert!(table.column("Missing").is_none());
    }

    #[test]
    fn test_table_result_set_is_zero_based() {
        let result_set = orders().result_set();
        let ordinals: Vec<u32> = result_set.columns.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1]);
        assert_eq!(result_set.columns[1].name.as_deref(), Some("CustomerId"));
        assert!(result_set.columns[1].is_nullable);
        assert!(result_set.columns[1].can_be_nullable);
        assert_eq!(result_set.columns[1].sql_db_type.as_deref(), Some("Int"));
    }

    #[test]
    fn test_empty_model() {
        let model = DatabaseModel::default();
        assert!(model.is_empty());
        assert_eq!(model.object_count(), 0);
        assert_eq!(model.metadata.builder_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_table_types_do_not_count_as_content() {
        let model = DatabaseModel {
            table_types: vec![Arc::new(orders())],
            ..Default::default()
        };
        assert!(model.is_empty());
        assert_eq!(model.object_count(), 1);
        assert!(model.table_type("dbo", "Orders").is_some());
    }

    #[test]
    fn test_parameter_serializes_table_type_as_name() {
        let parameter = Parameter {
            name: "@Rows".to_string(),
            index: 0,
            direction: ParameterDirection::Input,
            sql_type_name: "OrderRows".to_string(),
            object_type_name: "DataTable".to_string(),
            sql_db_type: Some("Structured".to_string()),
            can_be_nullable: false,
            length: None,
            precision: None,
            scale: None,
            is_identity: false,
            is_nullable: true,
            is_read_only: true,
            is_table_valued: true,
            table_type: Some(Arc::new(orders())),
        };

        let json = serde_json::to_value(&parameter).unwrap();
        assert_eq!(
            json["table_type"],
            serde_json::json!({"schema": "dbo", "name": "Orders"})
        );
        assert_eq!(json["direction"], "Input");
    }
}
