//! # coverledger-store
//!
//! The Atomic Record Store: durable key→document storage with crash-safe
//! replace semantics and collection-scoped mutual exclusion.
//!
//! Two backends sit behind one [`RecordStore`] trait:
//!
//! - [`FileStore`] — one JSON document per collection, a sibling zero-byte
//!   lock marker, writes staged out-of-place and renamed into place while
//!   the lock is held;
//! - [`SqliteStore`] — one table per record type with a fixed column set;
//!   `BEGIN IMMEDIATE` transactions play the role of the file lock, and
//!   partial updates interpolate only whitelist-validated field names.
//!
//! Readers never take the lock: rename-based replace (or SQLite's own
//! reader isolation) guarantees they always see a complete committed
//! version.

pub mod atomic;
pub mod file_store;
pub mod lock;
pub mod sqlite_store;

use serde_json::{Map, Value};

use coverledger_types::{Record, RecordType, Result};

pub use file_store::FileStore;
pub use lock::{CollectionGuard, CollectionLock};
pub use sqlite_store::SqliteStore;

/// Durable key→document storage for policies and claims.
///
/// All implementations guarantee: writes to a collection are serialized,
/// a failed operation leaves the stored bytes untouched, and
/// `update_fields` rejects non-whitelisted names before any I/O.
pub trait RecordStore: Send + Sync {
    /// Fetch a record. `RecordNotFound` when the id is unknown.
    fn get(&self, record_type: RecordType, id: &str) -> Result<Record>;

    /// Full replace; creates the record if absent. The stored record's id
    /// field is stamped from `id`.
    fn put(&self, record_type: RecordType, id: &str, record: &Record) -> Result<()>;

    /// Partial update of whitelisted fields only. Any name outside the
    /// type's allow-list fails the whole call with no side effect.
    fn update_fields(
        &self,
        record_type: RecordType,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<()>;

    /// Whether a record with this id exists.
    fn exists(&self, record_type: RecordType, id: &str) -> Result<bool>;
}
