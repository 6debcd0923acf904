//! SQLite-backed run store.
//!
//! Persists one row per execution attempt in a single table. `id` is the
//! durable insertion-order key; the definition timestamp and the attempt
//! time are stored as RFC 2822 text.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Params, Row};
use tracing::debug;

use funcmig::{Direction, RunRecord, RunStatus, RunStore, StoreError};

const DEFAULT_TABLE: &str = "function_migrations";
const SELECT_FIELDS: &str = "id, name, direction, status, error, timestamp, created";

/// Run store persisting attempts in SQLite.
pub struct SqliteStore {
    conn: Connection,
    table: String,
}

impl SqliteStore {
    /// Open (or create) a database at `path` with the default table name.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_table(path, DEFAULT_TABLE)
    }

    /// Open (or create) a database at `path` with an explicit table name.
    pub fn open_with_table(
        path: impl AsRef<Path>,
        table: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(backend)?;
        Ok(Self {
            conn,
            table: table.into(),
        })
    }

    /// Open an in-memory database, for fixtures and tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Ok(Self {
            conn,
            table: DEFAULT_TABLE.to_string(),
        })
    }

    fn query_one<P: Params>(&self, sql: &str, params: P) -> Result<Option<RunRecord>, StoreError> {
        let mut stmt = self.conn.prepare(sql).map_err(backend)?;
        let mut rows = stmt.query_map(params, read_row).map_err(backend)?;

        match rows.next() {
            Some(raw) => Ok(Some(decode(raw.map_err(backend)?)?)),
            None => Ok(None),
        }
    }

    fn query_all<P: Params>(&self, sql: &str, params: P) -> Result<Vec<RunRecord>, StoreError> {
        let mut stmt = self.conn.prepare(sql).map_err(backend)?;
        let rows = stmt.query_map(params, read_row).map_err(backend)?;

        let mut records = Vec::new();
        for raw in rows {
            records.push(decode(raw.map_err(backend)?)?);
        }
        Ok(records)
    }
}

impl RunStore for SqliteStore {
    fn create_store(&self) -> Result<(), StoreError> {
        let query = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                direction TEXT NOT NULL,
                status TEXT NOT NULL,
                error TEXT NULL,
                timestamp TEXT NOT NULL,
                created TEXT NOT NULL
            )",
            self.table
        );
        self.conn.execute_batch(&query).map_err(backend)?;

        debug!(table = %self.table, "Ensured migration run table");
        Ok(())
    }

    fn clear_store(&self) -> Result<(), StoreError> {
        let query = format!("DELETE FROM {}", self.table);
        self.conn.execute(&query, []).map_err(backend)?;
        Ok(())
    }

    fn last_run(&self) -> Result<Option<RunRecord>, StoreError> {
        let query = format!(
            "SELECT {} FROM {} ORDER BY id DESC LIMIT 1",
            SELECT_FIELDS, self.table
        );
        self.query_one(&query, [])
    }

    fn last_run_with_status(&self, status: RunStatus) -> Result<Option<RunRecord>, StoreError> {
        let query = format!(
            "SELECT {} FROM {} WHERE status = ?1 ORDER BY id DESC LIMIT 1",
            SELECT_FIELDS, self.table
        );
        self.query_one(&query, params![status.to_string()])
    }

    fn last_run_by_name(&self, name: &str) -> Result<Option<RunRecord>, StoreError> {
        let query = format!(
            "SELECT {} FROM {} WHERE name = ?1 ORDER BY id DESC LIMIT 1",
            SELECT_FIELDS, self.table
        );
        self.query_one(&query, params![name])
    }

    fn all_runs_by_name(&self, name: &str) -> Result<Vec<RunRecord>, StoreError> {
        let query = format!(
            "SELECT {} FROM {} WHERE name = ?1 ORDER BY id ASC",
            SELECT_FIELDS, self.table
        );
        self.query_all(&query, params![name])
    }

    fn list(&self) -> Result<Vec<RunRecord>, StoreError> {
        let query = format!("SELECT {} FROM {} ORDER BY id ASC", SELECT_FIELDS, self.table);
        self.query_all(&query, [])
    }

    fn save(&self, record: &RunRecord, attempt_error: Option<&str>) -> Result<(), StoreError> {
        let status = match attempt_error {
            Some(_) => RunStatus::Failure,
            None => record.status,
        };
        let error = attempt_error.unwrap_or(record.error.as_str());

        let query = format!(
            "INSERT INTO {} (name, direction, status, error, timestamp, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            self.table
        );
        self.conn
            .execute(
                &query,
                params![
                    record.name,
                    record.direction.to_string(),
                    status.to_string(),
                    error,
                    record.timestamp.to_rfc2822(),
                    record.created.to_rfc2822(),
                ],
            )
            .map_err(backend)?;

        Ok(())
    }
}

/// Row image before text columns are decoded.
struct RawRow {
    id: i64,
    name: String,
    direction: String,
    status: String,
    error: Option<String>,
    timestamp: String,
    created: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        name: row.get(1)?,
        direction: row.get(2)?,
        status: row.get(3)?,
        error: row.get(4)?,
        timestamp: row.get(5)?,
        created: row.get(6)?,
    })
}

fn decode(raw: RawRow) -> Result<RunRecord, StoreError> {
    let direction = raw.direction.parse::<Direction>().map_err(|_| {
        StoreError::Corrupt(format!(
            "unknown direction {:?} in row {}",
            raw.direction, raw.id
        ))
    })?;
    let status = raw.status.parse::<RunStatus>().map_err(|_| {
        StoreError::Corrupt(format!("unknown status {:?} in row {}", raw.status, raw.id))
    })?;
    let timestamp = decode_time(&raw.timestamp, raw.id)?;
    let created = decode_time(&raw.created, raw.id)?;

    Ok(RunRecord {
        id: raw.id,
        name: raw.name,
        direction,
        status,
        error: raw.error.unwrap_or_default(),
        timestamp,
        created,
    })
}

fn decode_time(text: &str, id: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc2822(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad time {:?} in row {}: {}", text, id, e)))
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(Box::new(err))
}
