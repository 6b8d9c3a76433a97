//! Offline catalog backed by captured record sets.
//!
//! A [`CatalogSnapshot`] is the raw output of every catalog query, serialized
//! as JSON. [`InMemoryCatalog`] replays a snapshot through the
//! [`CatalogSource`] trait and records which queries were issued.

use super::{
    CatalogQuery, CatalogSource, ColumnConstraintRecord, ColumnRecord, ParameterRecord,
    ROUTINE_TYPE_PROCEDURE, ResultColumnRecord, RoutineRecord,
};
use crate::models::ObjectName;
use crate::{Result, error::ReverseDbError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// The inferred first result set of one procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedResultSet {
    /// Procedure schema
    pub schema: String,
    /// Procedure name
    pub name: String,
    /// `None` when the describe query returned no record set or failed
    pub columns: Option<Vec<ResultColumnRecord>>,
    /// Error of a failed describe query; replayed as a query failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A catalog query that failed while capturing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedFailure {
    /// The failed query
    pub query: CatalogQuery,
    /// Error message at capture time
    pub message: String,
}

/// Captured catalog record sets.
///
/// A `None` field stands for a query that returned no record set, which the
/// builder treats differently from an empty one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// When the snapshot was taken; absent for hand-written snapshots
    #[serde(default)]
    pub captured_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Routine record set
    #[serde(default)]
    pub routines: Option<Vec<RoutineRecord>>,
    /// Parameter record set
    #[serde(default)]
    pub parameters: Option<Vec<ParameterRecord>>,
    /// Table column record set
    #[serde(default)]
    pub table_columns: Option<Vec<ColumnRecord>>,
    /// Table type column record set
    #[serde(default)]
    pub table_type_columns: Option<Vec<ColumnRecord>>,
    /// Column constraint record set
    #[serde(default)]
    pub column_constraints: Option<Vec<ColumnConstraintRecord>>,
    /// Described first result sets, one per stored procedure
    #[serde(default)]
    pub result_sets: Vec<CapturedResultSet>,
    /// Queries that failed while capturing; replayed as query failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_queries: Vec<CapturedFailure>,
}

fn captured<T>(
    query: CatalogQuery,
    outcome: Result<Option<T>>,
    failures: &mut Vec<CapturedFailure>,
) -> Option<T> {
    match outcome {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!("Failed to capture {query}: {e}");
            failures.push(CapturedFailure {
                query,
                message: failure_message(&e),
            });
            None
        }
    }
}

/// The underlying cause, without the query context the replay adds back.
fn failure_message(error: &ReverseDbError) -> String {
    std::error::Error::source(error).map_or_else(|| error.to_string(), ToString::to_string)
}

fn replayed_failure(query: CatalogQuery, message: &str) -> ReverseDbError {
    ReverseDbError::query_failed(query.name(), std::io::Error::other(message.to_string()))
}

impl CatalogSnapshot {
    /// Runs every catalog query against `source` and records the outcome.
    ///
    /// Failed queries are recorded as missing record sets together with their
    /// error, so a replay reports the same failures. The first result set is
    /// described for every stored procedure found.
    ///
    /// # Errors
    /// Returns an error only if the session cannot be opened.
    pub async fn capture(source: &dyn CatalogSource) -> Result<Self> {
        source.connect().await?;
        tracing::debug!("Capturing catalog from {}", source.safe_description());

        let (routines, parameters, table_columns, table_type_columns, column_constraints) = tokio::join!(
            source.routines(),
            source.parameters(),
            source.table_columns(),
            source.table_type_columns(),
            source.column_constraints(),
        );

        let mut failures = Vec::new();
        let routines = captured(CatalogQuery::Routines, routines, &mut failures);
        let procedures: Vec<&RoutineRecord> = routines
            .iter()
            .flatten()
            .filter(|r| r.routine_type == ROUTINE_TYPE_PROCEDURE)
            .collect();

        let described = futures::future::join_all(procedures.iter().map(|r| async move {
            let outcome = source
                .describe_first_result_set(&r.specific_schema, &r.specific_name)
                .await;
            let (columns, error) = match outcome {
                Ok(columns) => (columns, None),
                Err(e) => {
                    tracing::warn!(
                        "Failed to capture the result set of {}.{}: {e}",
                        r.specific_schema,
                        r.specific_name
                    );
                    (None, Some(failure_message(&e)))
                }
            };
            CapturedResultSet {
                schema: r.specific_schema.clone(),
                name: r.specific_name.clone(),
                columns,
                error,
            }
        }))
        .await;

        tracing::info!(
            "Captured catalog with {} result set descriptions",
            described.len()
        );

        let parameters = captured(CatalogQuery::Parameters, parameters, &mut failures);
        let table_columns = captured(CatalogQuery::TableColumns, table_columns, &mut failures);
        let table_type_columns =
            captured(CatalogQuery::TableTypeColumns, table_type_columns, &mut failures);
        let column_constraints =
            captured(CatalogQuery::ColumnConstraints, column_constraints, &mut failures);

        Ok(Self {
            captured_at: Some(chrono::Utc::now()),
            routines,
            parameters,
            table_columns,
            table_type_columns,
            column_constraints,
            result_sets: described,
            failed_queries: failures,
        })
    }

    /// Parses a snapshot from JSON.
    ///
    /// # Errors
    /// Returns a serialization error for malformed input.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ReverseDbError::Serialization {
            context: "Failed to parse catalog snapshot".to_string(),
            source: e,
        })
    }

    /// Serializes the snapshot as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns a serialization error if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ReverseDbError::Serialization {
            context: "Failed to serialize catalog snapshot".to_string(),
            source: e,
        })
    }

    /// Reads a snapshot file.
    ///
    /// # Errors
    /// Returns an I/O or serialization error.
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ReverseDbError::Io {
                context: format!("Failed to read snapshot {}", path.display()),
                source: e,
            })?;
        Self::from_json(&json)
    }

    /// Writes the snapshot to a file.
    ///
    /// # Errors
    /// Returns an I/O or serialization error.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| ReverseDbError::Io {
                context: format!("Failed to write snapshot {}", path.display()),
                source: e,
            })
    }

    /// Adds (or replaces) the described result set of a procedure.
    pub fn with_result_set(
        mut self,
        schema: &str,
        name: &str,
        columns: Option<Vec<ResultColumnRecord>>,
    ) -> Self {
        self.result_sets
            .retain(|r| !(r.schema == schema && r.name == name));
        self.result_sets.push(CapturedResultSet {
            schema: schema.to_string(),
            name: name.to_string(),
            columns,
            error: None,
        });
        self
    }
}

/// A [`CatalogSource`] that replays a [`CatalogSnapshot`].
///
/// Queries can be made to fail on demand, and every issued query is logged so
/// that tests can assert on what the builder asked for.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    snapshot: CatalogSnapshot,
    fail_connect: bool,
    failing: HashSet<CatalogQuery>,
    connects: AtomicUsize,
    issued: Mutex<Vec<(CatalogQuery, Option<ObjectName>)>>,
}

impl InMemoryCatalog {
    /// Creates a catalog that replays `snapshot`.
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            snapshot,
            ..Default::default()
        }
    }

    /// Makes [`CatalogSource::connect`] fail.
    pub fn with_failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Makes every call of `query` fail with a query error.
    pub fn with_failing_query(mut self, query: CatalogQuery) -> Self {
        self.failing.insert(query);
        self
    }

    /// Number of `connect` calls so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Every query issued so far, in order.
    pub async fn issued_queries(&self) -> Vec<CatalogQuery> {
        self.issued.lock().await.iter().map(|(q, _)| *q).collect()
    }

    /// Number of times `query` was issued.
    pub async fn query_count(&self, query: CatalogQuery) -> usize {
        self.issued
            .lock()
            .await
            .iter()
            .filter(|(q, _)| *q == query)
            .count()
    }

    /// Procedures whose first result set was described, in call order.
    pub async fn described_procedures(&self) -> Vec<ObjectName> {
        self.issued
            .lock()
            .await
            .iter()
            .filter_map(|(_, target)| target.clone())
            .collect()
    }

    async fn issue<T: Clone>(
        &self,
        query: CatalogQuery,
        target: Option<ObjectName>,
        records: &Option<Vec<T>>,
        recorded_failure: Option<&str>,
    ) -> Result<Option<Vec<T>>> {
        self.issued.lock().await.push((query, target));
        if self.failing.contains(&query) {
            return Err(replayed_failure(query, "injected failure"));
        }
        if let Some(message) = recorded_failure {
            return Err(replayed_failure(query, message));
        }
        Ok(records.clone())
    }

    /// Replays a whole-record-set query.
    async fn replay<T: Clone>(
        &self,
        query: CatalogQuery,
        records: &Option<Vec<T>>,
    ) -> Result<Option<Vec<T>>> {
        let recorded_failure = self
            .snapshot
            .failed_queries
            .iter()
            .find(|f| f.query == query)
            .map(|f| f.message.as_str());
        self.issue(query, None, records, recorded_failure).await
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(ReverseDbError::connection_failed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(())
    }

    async fn routines(&self) -> Result<Option<Vec<RoutineRecord>>> {
        self.replay(CatalogQuery::Routines, &self.snapshot.routines)
            .await
    }

    async fn parameters(&self) -> Result<Option<Vec<ParameterRecord>>> {
        self.replay(CatalogQuery::Parameters, &self.snapshot.parameters)
            .await
    }

    async fn table_columns(&self) -> Result<Option<Vec<ColumnRecord>>> {
        self.replay(CatalogQuery::TableColumns, &self.snapshot.table_columns)
            .await
    }

    async fn table_type_columns(&self) -> Result<Option<Vec<ColumnRecord>>> {
        self.replay(
            CatalogQuery::TableTypeColumns,
            &self.snapshot.table_type_columns,
        )
        .await
    }

    async fn column_constraints(&self) -> Result<Option<Vec<ColumnConstraintRecord>>> {
        self.replay(
            CatalogQuery::ColumnConstraints,
            &self.snapshot.column_constraints,
        )
        .await
    }

    async fn describe_first_result_set(
        &self,
        schema: &str,
        name: &str,
    ) -> Result<Option<Vec<ResultColumnRecord>>> {
        let entry = self
            .snapshot
            .result_sets
            .iter()
            .find(|r| r.schema == schema && r.name == name);
        let columns = entry.and_then(|r| r.columns.clone());
        self.issue(
            CatalogQuery::DescribeFirstResultSet,
            Some(ObjectName::new(schema, name)),
            &columns,
            entry.and_then(|r| r.error.as_deref()),
        )
        .await
    }

    fn safe_description(&self) -> String {
        "in-memory catalog snapshot".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn routine(schema: &str, name: &str, routine_type: &str) -> RoutineRecord {
        RoutineRecord {
            specific_schema: schema.to_string(),
            specific_name: name.to_string(),
            routine_type: routine_type.to_string(),
        }
    }

    fn result_column(ordinal: i32, name: &str) -> ResultColumnRecord {
        ResultColumnRecord {
            column_ordinal: ordinal,
            name: Some(name.to_string()),
            type_name: Some("int".to_string()),
            source_table: None,
            source_column: None,
            is_nullable: false,
            is_hidden: false,
        }
    }

    #[tokio::test]
    async fn test_replay_distinguishes_missing_from_empty() {
        let snapshot = CatalogSnapshot {
            table_columns: Some(Vec::new()),
            ..Default::default()
        };
        let catalog = InMemoryCatalog::new(snapshot);

        assert_eq!(catalog.table_columns().await.unwrap(), Some(Vec::new()));
        assert_eq!(catalog.column_constraints().await.unwrap(), None);
        assert_eq!(catalog.query_count(CatalogQuery::TableColumns).await, 1);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let catalog = InMemoryCatalog::new(CatalogSnapshot::default())
            .with_failing_query(CatalogQuery::Parameters)
            .with_failing_connect();

        let error = catalog.connect().await.unwrap_err();
        assert!(matches!(error, ReverseDbError::Connection { .. }));
        assert_eq!(catalog.connect_count(), 1);

        let error = catalog.parameters().await.unwrap_err();
        assert!(matches!(error, ReverseDbError::Query { .. }));
        assert!(error.to_string().contains("parameters"));
    }

    #[tokio::test]
    async fn test_capture_describes_procedures_only() {
        let snapshot = CatalogSnapshot {
            routines: Some(vec![
                routine("dbo", "GetOrder", "PROCEDURE"),
                routine("dbo", "OrderLines", "FUNCTION"),
            ]),
            ..Default::default()
        }
        .with_result_set("dbo", "GetOrder", Some(vec![result_column(1, "Id")]));
        let source = InMemoryCatalog::new(snapshot);

        let captured = CatalogSnapshot::capture(&source).await.unwrap();

        assert!(captured.captured_at.is_some());
        assert_eq!(captured.result_sets.len(), 1);
        assert_eq!(captured.result_sets[0].name, "GetOrder");
        assert_eq!(
            source.described_procedures().await,
            vec![ObjectName::new("dbo", "GetOrder")]
        );
    }

    #[tokio::test]
    async fn test_capture_records_failed_queries() {
        let snapshot = CatalogSnapshot {
            column_constraints: Some(Vec::new()),
            ..Default::default()
        };
        let source =
            InMemoryCatalog::new(snapshot).with_failing_query(CatalogQuery::ColumnConstraints);

        let captured = CatalogSnapshot::capture(&source).await.unwrap();
        assert!(captured.column_constraints.is_none());
        assert_eq!(
            captured.failed_queries,
            vec![CapturedFailure {
                query: CatalogQuery::ColumnConstraints,
                message: "injected failure".to_string(),
            }]
        );

        let replayed = InMemoryCatalog::new(captured);
        let error = replayed.column_constraints().await.unwrap_err();
        assert_eq!(error.to_string(), "Catalog query failed: column constraints");
        assert_eq!(replayed.table_columns().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_describe_is_replayed_as_failure() {
        let snapshot = CatalogSnapshot {
            routines: Some(vec![routine("dbo", "GetOrder", "PROCEDURE")]),
            ..Default::default()
        }
        .with_result_set("dbo", "GetOrder", Some(vec![result_column(1, "Id")]));
        let source = InMemoryCatalog::new(snapshot)
            .with_failing_query(CatalogQuery::DescribeFirstResultSet);

        let captured = CatalogSnapshot::capture(&source).await.unwrap();
        assert_eq!(captured.result_sets[0].columns, None);
        assert_eq!(captured.result_sets[0].error.as_deref(), Some("injected failure"));

        let json = captured.to_json().unwrap();
        let replayed = InMemoryCatalog::new(CatalogSnapshot::from_json(&json).unwrap());
        assert!(replayed.describe_first_result_set("dbo", "GetOrder").await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let snapshot = CatalogSnapshot {
            routines: Some(vec![routine("sales", "Purge", "PROCEDURE")]),
            ..Default::default()
        }
        .with_result_set("sales", "Purge", None);
        snapshot.save(&path).await.unwrap();

        let loaded = CatalogSnapshot::load(&path).await.unwrap();
        assert_eq!(loaded.routines, snapshot.routines);
        assert_eq!(loaded.result_sets, snapshot.result_sets);
        assert!(loaded.table_columns.is_none());
    }

    #[test]
    fn test_malformed_snapshot() {
        let error = CatalogSnapshot::from_json("{ not json").unwrap_err();
        assert!(matches!(error, ReverseDbError::Serialization { .. }));
    }
}
