//! Build options: which object kinds to collect and which objects to keep.

use crate::mapping::{
    ClrTypeNameProvider, DefaultObjectNameProvider, ObjectNameProvider, TypeNameProvider,
};
use crate::{Result, error::ReverseDbError};
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Inclusion predicate over `(schema, name)`.
pub type ObjectFilter = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Keeps only objects in one of the given schemas.
///
/// # Example
/// ```rust
/// use dbreverse_core::config::filters;
///
/// let filter = filters::schemas(["dbo", "sales"]);
/// assert!(filter("sales", "Orders"));
/// assert!(!filter("audit", "Log"));
/// ```
pub fn schemas<I, S>(schemas: I) -> ObjectFilter
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let allowed: HashSet<String> = schemas.into_iter().map(Into::into).collect();
    Arc::new(move |schema, _name| allowed.contains(schema))
}

/// Drops objects whose `schema.name` matches the pattern.
///
/// # Errors
/// Returns a configuration error if the pattern is not a valid regex.
pub fn exclude_pattern(pattern: &str) -> Result<ObjectFilter> {
    let regex = Regex::new(pattern).map_err(|e| {
        ReverseDbError::configuration(format!("Invalid exclude pattern '{}': {}", pattern, e))
    })?;
    Ok(Arc::new(move |schema, name| {
        !regex.is_match(&format!("{}.{}", schema, name))
    }))
}

/// Keeps objects accepted by both filters.
pub fn both(first: ObjectFilter, second: ObjectFilter) -> ObjectFilter {
    Arc::new(move |schema, name| first(schema, name) && second(schema, name))
}

/// Per-pipeline toggles. A disabled pipeline issues no catalog query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectTypes {
    /// Collect tables (default true)
    pub tables: bool,
    /// Collect user-defined table types (default true)
    pub table_types: bool,
    /// Collect stored procedures (default true)
    pub stored_procedures: bool,
}

impl ObjectTypes {
    /// Every pipeline enabled.
    pub const fn all() -> Self {
        Self {
            tables: true,
            table_types: true,
            stored_procedures: true,
        }
    }

    /// Every pipeline disabled.
    pub const fn none() -> Self {
        Self {
            tables: false,
            table_types: false,
            stored_procedures: false,
        }
    }
}

impl Default for ObjectTypes {
    fn default() -> Self {
        Self::all()
    }
}

/// Options for one build of the database model.
///
/// # Example
/// ```rust
/// use dbreverse_core::config::{BuildOptions, ObjectTypes, filters};
///
/// let options = BuildOptions::new()
///     .with_object_types(ObjectTypes { table_types: false, ..ObjectTypes::all() })
///     .with_stored_procedure_filter(filters::schemas(["dbo"]));
///
/// assert!(options.includes_stored_procedure("dbo", "GetOrders"));
/// assert!(!options.includes_stored_procedure("audit", "Purge"));
/// assert!(options.includes_table("audit", "Log"));
/// ```
#[derive(Clone)]
pub struct BuildOptions {
    /// Which pipelines run (default: all)
    pub object_types: ObjectTypes,
    /// Table predicate (default: include everything)
    pub table_filter: Option<ObjectFilter>,
    /// Table type predicate (default: include everything)
    pub table_type_filter: Option<ObjectFilter>,
    /// Stored procedure predicate (default: include everything)
    pub stored_procedure_filter: Option<ObjectFilter>,
    /// Target type resolution (default: [`ClrTypeNameProvider`])
    pub type_name_provider: Arc<dyn TypeNameProvider>,
    /// Identifier policy, used for placeholder result column names
    /// (default: [`DefaultObjectNameProvider`] without schema prefixes)
    pub object_name_provider: Arc<dyn ObjectNameProvider>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            object_types: ObjectTypes::all(),
            table_filter: None,
            table_type_filter: None,
            stored_procedure_filter: None,
            type_name_provider: Arc::new(ClrTypeNameProvider),
            object_name_provider: Arc::new(DefaultObjectNameProvider::default()),
        }
    }
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("object_types", &self.object_types)
            .field("table_filter", &self.table_filter.is_some())
            .field("table_type_filter", &self.table_type_filter.is_some())
            .field("stored_procedure_filter", &self.stored_procedure_filter.is_some())
            .field("type_name_provider", &self.type_name_provider)
            .field("object_name_provider", &self.object_name_provider)
            .finish()
    }
}

fn accepts(filter: Option<&ObjectFilter>, schema: &str, name: &str) -> bool {
    filter.is_none_or(|f| f(schema, name))
}

impl BuildOptions {
    /// Creates options with every default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the pipeline toggles.
    pub fn with_object_types(mut self, object_types: ObjectTypes) -> Self {
        self.object_types = object_types;
        self
    }

    /// Builder method to set the table predicate.
    pub fn with_table_filter(mut self, filter: ObjectFilter) -> Self {
        self.table_filter = Some(filter);
        self
    }

    /// Builder method to set the table type predicate.
    pub fn with_table_type_filter(mut self, filter: ObjectFilter) -> Self {
        self.table_type_filter = Some(filter);
        self
    }

    /// Builder method to set the stored procedure predicate.
    pub fn with_stored_procedure_filter(mut self, filter: ObjectFilter) -> Self {
        self.stored_procedure_filter = Some(filter);
        self
    }

    /// Builder method to apply one predicate to every object kind.
    pub fn with_filter(self, filter: ObjectFilter) -> Self {
        self.with_table_filter(Arc::clone(&filter))
            .with_table_type_filter(Arc::clone(&filter))
            .with_stored_procedure_filter(filter)
    }

    /// Builder method to replace the type name provider.
    pub fn with_type_name_provider(mut self, provider: Arc<dyn TypeNameProvider>) -> Self {
        self.type_name_provider = provider;
        self
    }

    /// Builder method to replace the object name provider.
    pub fn with_object_name_provider(mut self, provider: Arc<dyn ObjectNameProvider>) -> Self {
        self.object_name_provider = provider;
        self
    }

    /// Builder method to use the default naming rules, prefixing names of
    /// objects outside `dbo` with their schema when `include_schema` is set.
    pub fn with_include_schema(self, include_schema: bool) -> Self {
        self.with_object_name_provider(Arc::new(DefaultObjectNameProvider::new(include_schema)))
    }

    /// Applies the table predicate.
    pub fn includes_table(&self, schema: &str, name: &str) -> bool {
        accepts(self.table_filter.as_ref(), schema, name)
    }

    /// Applies the table type predicate.
    pub fn includes_table_type(&self, schema: &str, name: &str) -> bool {
        accepts(self.table_type_filter.as_ref(), schema, name)
    }

    /// Applies the stored procedure predicate.
    pub fn includes_stored_procedure(&self, schema: &str, name: &str) -> bool {
        accepts(self.stored_procedure_filter.as_ref(), schema, name)
    }
}
