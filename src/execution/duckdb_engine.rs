//! DuckDB Execution Engine
//!
//! Holds the single connection to the Argo store. The driver is synchronous, so each
//! call runs on the blocking pool behind a mutex.

use crate::error::{OceanError, Result};
use crate::execution::result::{ExecutionOutcome, ResultTable};
use duckdb::types::Value;
use duckdb::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            OceanError::Database(format!("Failed to open {}: {}", path.display(), e))
        })?;
        info!("Opened DuckDB database at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| OceanError::Database(format!("Failed to open in-memory database: {}", e)))?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run statements that return no rows (DDL, inserts). Used for seeding.
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            conn.execute_batch(&sql)
                .map_err(|e| OceanError::Database(format!("Batch failed: {}", e)))
        })
        .await
        .map_err(|e| OceanError::Database(format!("Blocking task failed: {}", e)))?
    }

    /// Declared type of `table.column` from the catalog, e.g. `VARCHAR`.
    ///
    /// Any failure (missing table, missing column, lookup error) yields `None`.
    pub async fn column_type(&self, table: &str, column: &str) -> Option<String> {
        let conn = Arc::clone(&self.conn);
        let table = table.to_string();
        let column = column.to_lowercase();

        let lookup = tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let conn = lock(&conn)?;
            let mut stmt = conn
                .prepare(
                    "SELECT data_type FROM information_schema.columns \
                     WHERE table_name = ? AND lower(column_name) = ?",
                )
                .map_err(|e| OceanError::Database(e.to_string()))?;
            let mut rows = stmt
                .query(duckdb::params![table, column])
                .map_err(|e| OceanError::Database(e.to_string()))?;
            let declared = match rows.next().map_err(|e| OceanError::Database(e.to_string()))? {
                Some(row) => Some(
                    row.get::<_, String>(0)
                        .map_err(|e| OceanError::Database(e.to_string()))?,
                ),
                None => None,
            };
            Ok(declared)
        })
        .await;

        match lookup {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                debug!("Column type lookup failed: {}", e);
                None
            }
            Err(e) => {
                debug!("Column type lookup task failed: {}", e);
                None
            }
        }
    }

    /// Execute one statement. Errors from the engine are caught, logged and
    /// returned as [`ExecutionOutcome::Failed`].
    pub async fn execute(&self, sql: &str) -> ExecutionOutcome {
        let conn = Arc::clone(&self.conn);
        let statement = sql.to_string();

        let result = tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            run_query(&conn, &statement)
        })
        .await
        .map_err(|e| OceanError::Database(format!("Blocking task failed: {}", e)))
        .and_then(|r| r);

        match result {
            Ok(table) => {
                info!(
                    rows = table.height(),
                    columns = table.width(),
                    "SQL executed"
                );
                ExecutionOutcome::Table(table)
            }
            Err(e) => {
                error!("SQL execution error: {}", e);
                ExecutionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Release the connection. Clones still alive keep it open until dropped.
    pub fn close(self) {
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => match mutex.into_inner() {
                Ok(conn) => {
                    if let Err((_, e)) = conn.close() {
                        error!("Failed to close DuckDB connection: {}", e);
                    } else {
                        info!("DuckDB connection closed");
                    }
                }
                Err(_) => error!("DuckDB connection mutex poisoned on close"),
            },
            Err(_) => debug!("DuckDB connection still shared; closing on last drop"),
        }
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| OceanError::Database("Connection mutex poisoned".to_string()))
}

fn run_query(conn: &Connection, sql: &str) -> Result<ResultTable> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| OceanError::Database(e.to_string()))?;
    let mut rows = stmt
        .query([])
        .map_err(|e| OceanError::Database(e.to_string()))?;

    let columns: Vec<String> = rows
        .as_ref()
        .map(|s| s.column_names())
        .unwrap_or_default();

    let mut data = Vec::new();
    while let Some(row) = rows.next().map_err(|e| OceanError::Database(e.to_string()))? {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(
                row.get::<_, Value>(idx)
                    .map_err(|e| OceanError::Database(e.to_string()))?,
            );
        }
        data.push(values);
    }

    ResultTable::from_rows(columns, data)
}
