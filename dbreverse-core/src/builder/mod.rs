//! Database model orchestration.
//!
//! [`DatabaseBuilder`] drives three discovery pipelines against one catalog
//! session and joins their results into a [`DatabaseModel`]:
//!
//! - tables: table columns and column constraints, assembled per table
//! - table types: table type columns, assembled like tables without constraints
//! - stored procedures: routines and parameters, then one result set
//!   description per procedure
//!
//! The pipelines run concurrently. The only ordering between them is that
//! table-valued parameters are resolved after the table type pipeline has
//! finished. Only a failed connect aborts a build; every other problem is
//! logged, recorded in [`BuildMetadata::warnings`] and degrades the affected
//! pipeline.
//!
//! # Example
//! ```rust
//! use dbreverse_core::builder::DatabaseBuilder;
//! use dbreverse_core::catalog::CatalogSnapshot;
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let model = runtime
//!     .block_on(DatabaseBuilder::from_snapshot(CatalogSnapshot::default()).build())
//!     .unwrap();
//!
//! assert!(model.is_empty());
//! assert!(!model.metadata.warnings.is_empty());
//! ```

mod procedures;
mod result_sets;
mod tables;

#[cfg(test)]
mod tests;

pub use procedures::{assemble_procedures, parse_direction, resolve_table_type};
pub use result_sets::{assemble_result_set, attach_result_sets};
pub use tables::{assemble_tables, is_read_only, parse_constraint_type};

use crate::Result;
use crate::catalog::{CatalogQuery, CatalogSnapshot, CatalogSource, InMemoryCatalog};
use crate::config::BuildOptions;
use crate::models::{BuildMetadata, DatabaseModel, StoredProcedure, Table};
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

pub(crate) const NO_TABLES_WARNING: &str = "Could not find any tables or columns. If this is unexpected, please check the current user permissions.";
pub(crate) const NO_CONSTRAINTS_WARNING: &str = "Could not find any column constraints. If this is unexpected, please check the current user permissions.";
pub(crate) const NO_PROCEDURES_WARNING: &str = "Could not find any stored procedures. If this is unexpected, please check the current user permissions.";
pub(crate) const EMPTY_MODEL_WARNING: &str = "Could not find any tables or stored procedures in the database. Please make sure that you have a working connection with the appropriate permissions.";

/// Output of one pipeline.
#[derive(Debug, Clone)]
struct Collected<T> {
    items: Vec<T>,
    warnings: Vec<String>,
}

impl<T> Default for Collected<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl<T> Collected<T> {
    fn warn(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Unwraps a query outcome; a failed query counts as a missing record set.
    fn record_set<R>(&mut self, query: CatalogQuery, outcome: Result<Option<R>>) -> Option<R> {
        match outcome {
            Ok(records) => records,
            Err(e) => {
                self.warn(format!("Failed to query {}: {}", query, e));
                None
            }
        }
    }
}

/// Builds a [`DatabaseModel`] from a [`CatalogSource`].
pub struct DatabaseBuilder {
    catalog: Arc<dyn CatalogSource>,
    options: BuildOptions,
}

impl fmt::Debug for DatabaseBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseBuilder")
            .field("catalog", &self.catalog.safe_description())
            .field("options", &self.options)
            .finish()
    }
}

impl DatabaseBuilder {
    /// Creates a builder over any catalog source, with default options.
    pub fn new(catalog: Arc<dyn CatalogSource>) -> Self {
        Self {
            catalog,
            options: BuildOptions::default(),
        }
    }

    /// Creates a builder that replays a captured catalog.
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        Self::new(Arc::new(InMemoryCatalog::new(snapshot)))
    }

    /// Creates a builder over a live SQL Server catalog.
    ///
    /// The session is opened by [`DatabaseBuilder::build`].
    ///
    /// # Errors
    /// Returns a configuration error if the URL is invalid.
    #[cfg(feature = "mssql")]
    pub fn from_url(database_url: &str) -> Result<Self> {
        let catalog = crate::catalog::SqlServerCatalog::from_url(database_url)?;
        Ok(Self::new(Arc::new(catalog)))
    }

    /// Builder method to replace the build options.
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Current build options.
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// The catalog this builder reads from.
    pub fn catalog(&self) -> &Arc<dyn CatalogSource> {
        &self.catalog
    }

    /// Connects and builds the model.
    ///
    /// # Errors
    /// Returns [`ReverseDbError::Connection`](crate::ReverseDbError::Connection)
    /// if the catalog session cannot be opened. No partial model is returned in
    /// that case. Query failures never fail the build.
    pub async fn build(&self) -> Result<DatabaseModel> {
        let started = Instant::now();
        let catalog = self.catalog.as_ref();

        if let Err(e) = catalog.connect().await {
            tracing::error!("Failed to connect to {}: {}", catalog.safe_description(), e);
            return Err(e);
        }
        tracing::info!("Building database model from {}", catalog.safe_description());

        let table_types = self.collect_table_types(catalog).shared();
        let table_types_for_procedures = table_types.clone();
        let (tables, table_types, procedures) = tokio::join!(
            self.collect_tables(catalog),
            table_types,
            self.collect_procedures(catalog, table_types_for_procedures),
        );

        let mut warnings = Vec::new();
        warnings.extend(tables.warnings);
        warnings.extend(table_types.warnings);
        warnings.extend(procedures.warnings);

        let searched = self.options.object_types.tables || self.options.object_types.stored_procedures;
        if searched && tables.items.is_empty() && procedures.items.is_empty() {
            tracing::warn!("{}", EMPTY_MODEL_WARNING);
            warnings.push(EMPTY_MODEL_WARNING.to_string());
        }

        let duration = started.elapsed();
        tracing::info!(
            "Database model built in {:.2}s - found {} tables, {} table types, {} stored procedures",
            duration.as_secs_f64(),
            tables.items.len(),
            table_types.items.len(),
            procedures.items.len()
        );

        Ok(DatabaseModel {
            tables: tables.items,
            table_types: table_types.items,
            stored_procedures: procedures.items,
            metadata: BuildMetadata {
                duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                warnings,
                ..Default::default()
            },
        })
    }

    async fn collect_tables(&self, catalog: &dyn CatalogSource) -> Collected<Table> {
        let mut collected = Collected::default();
        if !self.options.object_types.tables {
            tracing::debug!("Table collection disabled");
            return collected;
        }

        let (columns, constraints) =
            tokio::join!(catalog.table_columns(), catalog.column_constraints());
        let columns = collected.record_set(CatalogQuery::TableColumns, columns);
        let constraints = collected.record_set(CatalogQuery::ColumnConstraints, constraints);

        let Some(columns) = columns else {
            collected.warn(NO_TABLES_WARNING);
            return collected;
        };
        let Some(constraints) = constraints else {
            collected.warn(NO_CONSTRAINTS_WARNING);
            return collected;
        };

        let options = &self.options;
        collected.items = assemble_tables(
            columns,
            Some(constraints),
            &|schema, name| options.includes_table(schema, name),
            options.type_name_provider.as_ref(),
        );
        tracing::debug!("Assembled {} tables", collected.items.len());
        collected
    }

    async fn collect_table_types(&self, catalog: &dyn CatalogSource) -> Collected<Arc<Table>> {
        let mut collected = Collected::default();
        if !self.options.object_types.table_types {
            tracing::debug!("Table type collection disabled");
            return collected;
        }

        let outcome = catalog.table_type_columns().await;
        let Some(columns) = collected.record_set(CatalogQuery::TableTypeColumns, outcome) else {
            tracing::debug!("No table type columns returned");
            return collected;
        };

        let options = &self.options;
        collected.items = assemble_tables(
            columns,
            None,
            &|schema, name| options.includes_table_type(schema, name),
            options.type_name_provider.as_ref(),
        )
        .into_iter()
        .map(Arc::new)
        .collect();
        tracing::debug!("Assembled {} table types", collected.items.len());
        collected
    }

    /// Waits for `table_types` before resolving table-valued parameters.
    async fn collect_procedures<F>(
        &self,
        catalog: &dyn CatalogSource,
        table_types: F,
    ) -> Collected<StoredProcedure>
    where
        F: Future<Output = Collected<Arc<Table>>>,
    {
        let mut collected = Collected::default();
        if !self.options.object_types.stored_procedures {
            tracing::debug!("Stored procedure collection disabled");
            return collected;
        }

        let (routines, parameters, table_types) =
            tokio::join!(catalog.routines(), catalog.parameters(), table_types);
        let routines = collected.record_set(CatalogQuery::Routines, routines);
        let parameters = collected.record_set(CatalogQuery::Parameters, parameters);

        let Some(routines) = routines else {
            collected.warn(NO_PROCEDURES_WARNING);
            return collected;
        };
        if parameters.is_none() {
            tracing::debug!("No parameter records returned; procedures will have no parameters");
        }

        let options = &self.options;
        let types = options.type_name_provider.as_ref();
        let mut procedures = assemble_procedures(
            routines,
            parameters.as_deref(),
            &table_types.items,
            &|schema, name| options.includes_stored_procedure(schema, name),
            types,
        );

        let names = options.object_name_provider.as_ref();
        let warnings = attach_result_sets(catalog, &mut procedures, types, names).await;
        collected.warnings.extend(warnings);
        collected.items = procedures;
        tracing::debug!("Assembled {} stored procedures", collected.items.len());
        collected
    }
}
