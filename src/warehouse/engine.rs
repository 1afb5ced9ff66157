//! DuckDB-backed warehouse
//!
//! Raw records land as JSON documents in `<dataset>.<table>`, tagged with the
//! load that wrote them. Every resource run also leaves a row in
//! `<dataset>._loads`.

use crate::error::{Error, Result};
use crate::types::LoadStatus;
use chrono::{DateTime, Utc};
use duckdb::{params, AccessMode, Config, Connection};
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Ledger table name, created inside the dataset schema
pub const LOADS_TABLE: &str = "_loads";

static IDENTIFIER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Check a single SQL identifier (schema or table name)
pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}

/// Check a table reference: `table` or `schema.table`
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut parts = name.split('.');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(table), None, None) => IDENTIFIER_REGEX.is_match(table),
        (Some(schema), Some(table), None) => {
            IDENTIFIER_REGEX.is_match(schema) && IDENTIFIER_REGEX.is_match(table)
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}

/// One row of the load ledger
#[derive(Debug, Clone)]
pub struct LoadLedgerEntry {
    /// Load identifier shared by all rows of the run
    pub load_id: String,
    /// Pipeline name
    pub pipeline_name: String,
    /// Resource name
    pub resource: String,
    /// Destination table (qualified)
    pub table_name: String,
    /// Outcome
    pub status: LoadStatus,
    /// Rows committed (0 on failure)
    pub row_count: u64,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: DateTime<Utc>,
    /// Error message for failed runs
    pub error: Option<String>,
}

/// DuckDB warehouse connection
pub struct Warehouse {
    conn: Connection,
    path: Option<PathBuf>,
    read_only: bool,
}

impl Warehouse {
    /// Open (or create) a warehouse file, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|e| {
            Error::warehouse(format!("Failed to open '{}': {e}", path.display()))
        })?;

        tracing::debug!("Opened warehouse {}", path.display());

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            read_only: false,
        })
    }

    /// Open an existing warehouse file for reading only
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::warehouse(format!(
                "Warehouse '{}' does not exist",
                path.display()
            )));
        }

        let config = Config::default().access_mode(AccessMode::ReadOnly)?;
        let conn = Connection::open_with_flags(path, config).map_err(|e| {
            Error::warehouse(format!("Failed to open '{}': {e}", path.display()))
        })?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            read_only: true,
        })
    }

    /// Open a throwaway in-memory warehouse
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::warehouse(format!("Failed to create DuckDB connection: {e}")))?;
        Ok(Self {
            conn,
            path: None,
            read_only: false,
        })
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Database file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether writes are rejected
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Create the dataset schema, the raw table and the load ledger
    pub fn ensure_table(&self, dataset: &str, table: &str) -> Result<()> {
        validate_identifier(dataset)?;
        validate_identifier(table)?;

        let sql = format!(
            "CREATE SCHEMA IF NOT EXISTS {dataset};
             CREATE TABLE IF NOT EXISTS {dataset}.{table} (
                 _load_id VARCHAR NOT NULL,
                 _resource VARCHAR NOT NULL,
                 _loaded_at TIMESTAMP NOT NULL,
                 id VARCHAR,
                 data JSON
             );
             CREATE TABLE IF NOT EXISTS {dataset}.{LOADS_TABLE} (
                 load_id VARCHAR NOT NULL,
                 pipeline_name VARCHAR NOT NULL,
                 resource VARCHAR NOT NULL,
                 table_name VARCHAR NOT NULL,
                 status VARCHAR NOT NULL,
                 row_count BIGINT NOT NULL,
                 started_at TIMESTAMP NOT NULL,
                 finished_at TIMESTAMP NOT NULL,
                 error VARCHAR
             );"
        );

        self.conn
            .execute_batch(&sql)
            .map_err(|e| Error::warehouse(format!("Failed to create {dataset}.{table}: {e}")))
    }

    /// Start a transaction
    pub fn begin(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    /// Commit the open transaction
    pub fn commit(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Roll back the open transaction
    pub fn rollback(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    /// Delete the rows a resource previously wrote to `table`
    pub fn delete_resource(&self, table: &str, resource: &str) -> Result<usize> {
        validate_table_name(table)?;
        let deleted = self
            .conn
            .execute(&format!("DELETE FROM {table} WHERE _resource = ?"), [resource])
            .map_err(|e| Error::warehouse(format!("Failed to clear {table}: {e}")))?;
        Ok(deleted)
    }

    /// Append raw records under one load id
    pub fn append_records(
        &self,
        table: &str,
        load_id: &str,
        resource: &str,
        loaded_at: DateTime<Utc>,
        records: &[Value],
    ) -> Result<usize> {
        validate_table_name(table)?;

        let sql = format!(
            "INSERT INTO {table} (_load_id, _resource, _loaded_at, id, data)
             VALUES (?, ?, CAST(? AS TIMESTAMP), ?, CAST(? AS JSON))"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let loaded_at = format_timestamp(loaded_at);

        for record in records {
            let id = record_id(record);
            let data = serde_json::to_string(record)?;
            stmt.execute(params![load_id, resource, loaded_at, id, data])
                .map_err(|e| Error::warehouse(format!("Failed to insert into {table}: {e}")))?;
        }

        Ok(records.len())
    }

    /// Write a ledger row
    pub fn record_load(&self, dataset: &str, entry: &LoadLedgerEntry) -> Result<()> {
        validate_identifier(dataset)?;

        let sql = format!(
            "INSERT INTO {dataset}.{LOADS_TABLE}
                 (load_id, pipeline_name, resource, table_name, status, row_count,
                  started_at, finished_at, error)
             VALUES (?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), ?)"
        );

        self.conn.execute(
            &sql,
            params![
                entry.load_id,
                entry.pipeline_name,
                entry.resource,
                entry.table_name,
                entry.status.as_str(),
                entry.row_count as i64,
                format_timestamp(entry.started_at),
                format_timestamp(entry.finished_at),
                entry.error,
            ],
        )?;
        Ok(())
    }

    /// Count rows in a table
    pub fn count_rows(&self, table: &str) -> Result<u64> {
        validate_table_name(table)?;
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .map_err(|e| Error::warehouse(format!("Failed to count {table}: {e}")))?;
        Ok(count as u64)
    }

    /// List user tables as `schema.table`
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT table_schema || '.' || table_name AS full_name
             FROM information_schema.tables
             WHERE table_schema NOT IN ('information_schema', 'pg_catalog')
             ORDER BY table_schema, table_name",
        )?;

        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| Error::warehouse(format!("Failed to query tables: {e}")))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(tables)
    }

    /// Read a table as JSON objects, one per row
    pub fn query_table(&self, table: &str, limit: Option<usize>) -> Result<Vec<Value>> {
        validate_table_name(table)?;

        let limit_clause = limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default();
        let sql = format!(
            "SELECT CAST(to_json(q) AS VARCHAR) FROM (SELECT * FROM {table}{limit_clause}) AS q"
        );

        tracing::debug!("Executing query: {}", sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| Error::warehouse(format!("Failed to query {table}: {e}")))?
            .collect::<std::result::Result<_, _>>()?;

        rows.iter()
            .map(|row| serde_json::from_str(row).map_err(Error::from))
            .collect()
    }
}

impl std::fmt::Debug for Warehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warehouse")
            .field("path", &self.path)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

/// Natural key of a record, if it carries one
fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}
