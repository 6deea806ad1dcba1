//! Relational backend: SQLite via `rusqlite`.
//!
//! One table per record type with a fixed column set — the id column, the
//! full document as JSON, and an update timestamp. Writes run inside
//! `BEGIN IMMEDIATE` transactions, which acquire the database write lock up
//! front and play the role the collection file lock plays in the flat-file
//! backend: commit happens only after the full field set is staged.
//!
//! `update_fields` builds its `json_set` paths exclusively from
//! whitelist-validated field names. No identifier taken from caller input
//! ever reaches SQL text without passing the whitelist first; values always
//! travel as bound parameters.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::debug;

use coverledger_types::{whitelist, CoverledgerError, Record, RecordType, Result};

use crate::RecordStore;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS policies (
    policy_id  TEXT PRIMARY KEY,
    doc        TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS claims (
    claim_id   TEXT PRIMARY KEY,
    doc        TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// SQLite-backed [`RecordStore`].
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a file-backed store.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> Result<()> {
        // WAL mode keeps readers unblocked while a writer holds the
        // IMMEDIATE lock (no-op for in-memory databases).
        let _ = conn.execute("PRAGMA journal_mode = WAL", []);
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(())
    }

    /// Run `body` inside a `BEGIN IMMEDIATE` transaction, committing on
    /// `Ok` and rolling back on `Err`.
    fn with_immediate_txn<T>(
        &self,
        body: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        conn.execute("BEGIN IMMEDIATE", []).map_err(db_err)?;
        let result = body(&conn);
        match &result {
            Ok(_) => {
                conn.execute("COMMIT", []).map_err(db_err)?;
            }
            Err(_) => {
                let _ = conn.execute("ROLLBACK", []);
            }
        }
        result
    }
}

/// Collapse a rusqlite error into the central `Database` variant.
fn db_err(err: rusqlite::Error) -> CoverledgerError {
    CoverledgerError::Database(err.to_string())
}

impl RecordStore for SqliteStore {
    fn get(&self, record_type: RecordType, id: &str) -> Result<Record> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let table = record_type.collection();
        let id_col = record_type.id_field();

        let doc: Option<String> = conn
            .query_row(
                &format!("SELECT doc FROM {table} WHERE {id_col} = ?1"),
                [id],
                |row| row.get(0),
            )
            .optional().map_err(db_err)?;

        let doc = doc.ok_or_else(|| CoverledgerError::RecordNotFound {
            collection: table.to_string(),
            id: id.to_string(),
        })?;
        serde_json::from_str(&doc).map_err(|e| CoverledgerError::Serialization(e.to_string()))
    }

    fn put(&self, record_type: RecordType, id: &str, record: &Record) -> Result<()> {
        let mut record = record.clone();
        record.set(record_type.id_field(), Value::String(id.to_string()));
        let doc = serde_json::to_string(&record)
            .map_err(|e| CoverledgerError::Serialization(e.to_string()))?;

        let table = record_type.collection();
        let id_col = record_type.id_field();

        self.with_immediate_txn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} ({id_col}, doc, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT({id_col}) DO UPDATE SET doc = excluded.doc,
                         updated_at = excluded.updated_at"
                ),
                rusqlite::params![id, doc, Utc::now().to_rfc3339()],
            )
            .map_err(db_err)?;
            Ok(())
        })?;
        debug!(collection = table, id, "record stored");
        Ok(())
    }

    fn update_fields(
        &self,
        record_type: RecordType,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        // Whitelist check before any SQL text is constructed.
        whitelist::validate(record_type, fields.keys().map(String::as_str)).map_err(
            |rejected| CoverledgerError::InvalidUpdateFields {
                record_type,
                fields: rejected,
            },
        )?;

        if fields.is_empty() {
            // Nothing to stage; still require the record to exist.
            if !self.exists(record_type, id)? {
                return Err(CoverledgerError::RecordNotFound {
                    collection: record_type.collection().to_string(),
                    id: id.to_string(),
                });
            }
            return Ok(());
        }

        let table = record_type.collection();
        let id_col = record_type.id_field();

        // json_set paths come from the validated names only; values are
        // bound parameters.
        let mut sql = format!("UPDATE {table} SET doc = json_set(doc");
        let mut params: Vec<String> = Vec::with_capacity(fields.len() + 2);
        for (i, (name, value)) in fields.iter().enumerate() {
            write!(sql, ", '$.{name}', json(?{})", i + 1)
                .map_err(|e| CoverledgerError::Internal(e.to_string()))?;
            params.push(
                serde_json::to_string(value)
                    .map_err(|e| CoverledgerError::Serialization(e.to_string()))?,
            );
        }
        write!(
            sql,
            "), updated_at = ?{} WHERE {id_col} = ?{}",
            fields.len() + 1,
            fields.len() + 2
        )
        .map_err(|e| CoverledgerError::Internal(e.to_string()))?;
        params.push(Utc::now().to_rfc3339());
        params.push(id.to_string());

        self.with_immediate_txn(|conn| {
            let changed = conn
                .execute(&sql, params_from_iter(params.iter()))
                .map_err(db_err)?;
            if changed == 0 {
                return Err(CoverledgerError::RecordNotFound {
                    collection: table.to_string(),
                    id: id.to_string(),
                });
            }
            Ok(())
        })?;
        debug!(collection = table, id, fields = fields.len(), "record fields updated");
        Ok(())
    }

    fn exists(&self, record_type: RecordType, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let table = record_type.collection();
        let id_col = record_type.id_field();
        let found: Option<i64> = conn
            .query_row(
                &format!("SELECT 1 FROM {table} WHERE {id_col} = ?1"),
                [id],
                |row| row.get(0),
            )
            .optional().map_err(db_err)?;
        Ok(found.is_some())
    }
}
