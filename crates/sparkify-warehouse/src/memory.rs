//! In-memory reference warehouse
//!
//! Executes the typed catalog with the Redshift behaviour the pipeline relies
//! on: guarded DDL, NOT NULL enforcement, informational primary and foreign
//! keys, identity columns and JSON COPY from an object store.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let warehouse = MemoryWarehouse::new();
//! warehouse
//!     .put_object("s3://bucket/song_data/a.json", r#"{"song_id": "S1"}"#)
//!     .await;
//!
//! let report = EtlPipeline::new(catalog).run(&warehouse, RunMode::Full).await?;
//! println!("{} songs", warehouse.row_count("songs").await.unwrap_or(0));
//! ```
//!
//! ## Simulating Failures
//!
//! ```rust,ignore
//! let warehouse = MemoryWarehouse::new().with_connection_failure();
//! assert!(warehouse.test_connection().await.is_err());
//! ```

use crate::adapter::{ExecError, ExecOutcome, Warehouse};
use crate::eval::{self, Relation};
use crate::loader::{self, ObjectStore};
use crate::value::{Row, Value};
use sparkify_core::TableDef;
use sparkify_sql::{CatalogStatement, StatementKind, Transform};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Rows and identity state of one table
#[derive(Debug, Clone)]
struct TableData {
    definition: TableDef,
    rows: Vec<Row>,
    next_identity: HashMap<usize, i64>,
}

impl TableData {
    fn new(definition: TableDef) -> Self {
        let next_identity = definition
            .columns
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.identity.map(|id| (i, id.seed)))
            .collect();

        Self {
            definition,
            rows: Vec::new(),
            next_identity,
        }
    }

    fn relation(&self) -> Relation<'_> {
        Relation {
            definition: &self.definition,
            rows: &self.rows,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, TableData>,
    executed: Vec<String>,
}

impl State {
    fn table(&self, name: &str) -> Result<&TableData, ExecError> {
        self.tables
            .get(name)
            .ok_or_else(|| ExecError::TableNotFound(name.to_string()))
    }
}

/// In-memory warehouse
///
/// Each statement runs under one write lock, so it applies completely or
/// not at all.
pub struct MemoryWarehouse {
    state: Arc<RwLock<State>>,

    /// Objects visible to COPY, keyed by URI
    objects: Arc<RwLock<ObjectStore>>,

    /// Errors to return for specific statement labels
    failures: Arc<RwLock<HashMap<String, ExecError>>>,

    /// Simulate connection failure
    fail_connection: bool,
}

impl MemoryWarehouse {
    /// Create an empty warehouse with an empty object store
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            objects: Arc::new(RwLock::new(ObjectStore::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            fail_connection: false,
        }
    }

    /// Configure to fail all connection tests
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Store an object for COPY to find
    pub async fn put_object(&self, uri: impl Into<String>, body: impl Into<String>) {
        self.objects.write().await.insert(uri.into(), body.into());
    }

    /// Make the statement with this label fail with `error`
    pub async fn fail_on(&self, label: impl Into<String>, error: ExecError) {
        self.failures.write().await.insert(label.into(), error);
    }

    /// Labels of successfully executed statements, oldest first
    pub async fn executed(&self) -> Vec<String> {
        self.state.read().await.executed.clone()
    }

    /// Number of rows in a table, `None` if it does not exist
    pub async fn row_count(&self, name: &str) -> Option<usize> {
        self.state.read().await.tables.get(name).map(|t| t.rows.len())
    }

    /// Rows of a table as column name → value maps
    pub async fn table_rows(&self, name: &str) -> Option<Vec<HashMap<String, Value>>> {
        let state = self.state.read().await;
        let table = state.tables.get(name)?;
        Some(
            table
                .rows
                .iter()
                .map(|row| {
                    table
                        .definition
                        .column_names()
                        .into_iter()
                        .map(str::to_string)
                        .zip(row.iter().cloned())
                        .collect()
                })
                .collect(),
        )
    }

    async fn copy(&self, state: &mut State, spec: &sparkify_sql::CopySpec) -> Result<usize, ExecError> {
        let table = state
            .tables
            .get_mut(&spec.table)
            .ok_or_else(|| ExecError::TableNotFound(spec.table.clone()))?;

        let rows = {
            let objects = self.objects.read().await;
            loader::load(&objects, spec, &table.definition)?
        };

        check_not_null(&table.definition, &rows)?;
        let count = rows.len();
        table.rows.extend(rows);
        Ok(count)
    }
}

impl Default for MemoryWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

fn insert(state: &mut State, transform: Transform) -> Result<usize, ExecError> {
    let selected = eval::select(transform, |name| state.table(name).map(TableData::relation))?;

    let target = state
        .tables
        .get_mut(transform.target())
        .ok_or_else(|| ExecError::TableNotFound(transform.target().to_string()))?;

    // Map the statement's column list onto the full table width
    let positions = transform
        .columns()
        .iter()
        .map(|name| {
            target
                .definition
                .column_index(name)
                .ok_or_else(|| ExecError::Unsupported(format!("{}.{} does not exist", target.definition.name, name)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut identity = target.next_identity.clone();
    let mut rows = Vec::with_capacity(selected.len());
    for values in selected {
        let mut row = vec![Value::Null; target.definition.columns.len()];
        for (value, &at) in values.into_iter().zip(&positions) {
            let column = &target.definition.columns[at];
            row[at] = value.coerce(&column.column_type).map_err(|reason| ExecError::Cast {
                table: target.definition.name.clone(),
                column: column.name.clone(),
                reason,
            })?;
        }

        for (at, column) in target.definition.columns.iter().enumerate() {
            if let (Some(spec), Some(next)) = (column.identity, identity.get_mut(&at)) {
                if row[at].is_null() {
                    row[at] = Value::Int(*next);
                    *next += spec.step;
                }
            }
        }
        rows.push(row);
    }

    check_not_null(&target.definition, &rows)?;

    let count = rows.len();
    target.rows.extend(rows);
    target.next_identity = identity;
    Ok(count)
}

fn check_not_null(definition: &TableDef, rows: &[Row]) -> Result<(), ExecError> {
    for row in rows {
        for (column, value) in definition.columns.iter().zip(row) {
            if column.not_null && value.is_null() {
                return Err(ExecError::Constraint {
                    table: definition.name.clone(),
                    column: column.name.clone(),
                    reason: "NULL in NOT NULL column".to_string(),
                });
            }
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl Warehouse for MemoryWarehouse {
    fn name(&self) -> &'static str {
        "Memory"
    }

    async fn execute(&self, statement: &CatalogStatement) -> Result<ExecOutcome, ExecError> {
        let label = statement.label();
        if let Some(error) = self.failures.read().await.get(&label) {
            return Err(error.clone());
        }

        let mut state = self.state.write().await;
        let rows = match &statement.kind {
            StatementKind::Drop { table } => {
                state.tables.remove(table);
                0
            }
            StatementKind::Create { definition } => {
                if !state.tables.contains_key(&definition.name) {
                    // REFERENCES needs the referenced relation to exist
                    if let Some(missing) = definition
                        .referenced_tables()
                        .into_iter()
                        .find(|t| !state.tables.contains_key(*t))
                    {
                        return Err(ExecError::TableNotFound(missing.to_string()));
                    }
                    state
                        .tables
                        .insert(definition.name.clone(), TableData::new(definition.clone()));
                }
                0
            }
            StatementKind::Copy { spec } => self.copy(&mut state, spec).await?,
            StatementKind::Insert { transform } => insert(&mut state, *transform)?,
        };

        state.executed.push(label);
        Ok(ExecOutcome::rows(rows))
    }

    async fn test_connection(&self) -> Result<(), ExecError> {
        if self.fail_connection {
            return Err(ExecError::Connection(
                "Simulated connection failure".to_string(),
            ));
        }
        Ok(())
    }
}
