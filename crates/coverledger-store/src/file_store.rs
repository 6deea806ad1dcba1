//! Flat-file backend: one JSON document per collection.
//!
//! Layout inside the data directory:
//!
//! ```text
//! policies.json       all policies, an object mapping id → record
//! policies.lock       zero-byte lock marker
//! claims.json         all claims
//! claims.lock         zero-byte lock marker
//! ```
//!
//! Every write runs as: acquire the collection lock → load the current
//! document → mutate in memory → stage the full serialized document →
//! rename into place → release the lock. The lock is held across both the
//! write and the rename. Readers never lock; the rename guarantees they
//! open a complete version.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::debug;

use coverledger_types::{whitelist, CoverledgerError, Record, RecordType, Result};

use crate::atomic::write_atomic;
use crate::lock::CollectionLock;
use crate::RecordStore;

/// One collection's on-disk state: the data file and its lock.
struct Collection {
    path: PathBuf,
    lock: CollectionLock,
}

/// The whole-document shape of a collection file. `BTreeMap` keeps the
/// serialized form stable across rewrites.
type Document = BTreeMap<String, Record>;

impl Collection {
    fn open(dir: &Path, record_type: RecordType, lock_timeout: Duration) -> Result<Self> {
        let name = record_type.collection();
        Ok(Self {
            path: dir.join(format!("{name}.json")),
            lock: CollectionLock::open(dir, name, lock_timeout)?,
        })
    }

    /// Read the last-committed document. Missing file means empty
    /// collection. Lock-free by design.
    fn load(&self) -> Result<Document> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => {
                return Err(CoverledgerError::Io(format!(
                    "read {:?}: {e}",
                    self.path
                )))
            }
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            CoverledgerError::Serialization(format!("parse {:?}: {e}", self.path))
        })
    }

    /// Run `mutate` on the current document and commit the result, all
    /// under the collection lock.
    fn commit<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Document) -> Result<()>,
    {
        let _guard = self.lock.acquire()?;
        let mut doc = self.load()?;
        mutate(&mut doc)?;
        let bytes = serde_json::to_vec_pretty(&doc)
            .map_err(|e| CoverledgerError::Serialization(e.to_string()))?;
        write_atomic(&self.path, &bytes)
        // _guard drops here: lock released only after the rename landed
    }
}

/// Flat-file [`RecordStore`] backend.
pub struct FileStore {
    policies: Collection,
    claims: Collection,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>, lock_timeout: Duration) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| CoverledgerError::Io(format!("create data dir {dir:?}: {e}")))?;
        Ok(Self {
            policies: Collection::open(&dir, RecordType::Policy, lock_timeout)?,
            claims: Collection::open(&dir, RecordType::Claim, lock_timeout)?,
        })
    }

    fn collection(&self, record_type: RecordType) -> &Collection {
        match record_type {
            RecordType::Policy => &self.policies,
            RecordType::Claim => &self.claims,
        }
    }
}

impl RecordStore for FileStore {
    fn get(&self, record_type: RecordType, id: &str) -> Result<Record> {
        self.collection(record_type)
            .load()?
            .remove(id)
            .ok_or_else(|| CoverledgerError::RecordNotFound {
                collection: record_type.collection().to_string(),
                id: id.to_string(),
            })
    }

    fn put(&self, record_type: RecordType, id: &str, record: &Record) -> Result<()> {
        let mut record = record.clone();
        record.set(record_type.id_field(), Value::String(id.to_string()));

        self.collection(record_type).commit(|doc| {
            doc.insert(id.to_string(), record);
            Ok(())
        })?;
        debug!(collection = record_type.collection(), id, "record stored");
        Ok(())
    }

    fn update_fields(
        &self,
        record_type: RecordType,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        // Whitelist check comes first: on rejection nothing is locked,
        // loaded, or written.
        whitelist::validate(record_type, fields.keys().map(String::as_str)).map_err(
            |rejected| CoverledgerError::InvalidUpdateFields {
                record_type,
                fields: rejected,
            },
        )?;

        self.collection(record_type).commit(|doc| {
            let record = doc
                .get_mut(id)
                .ok_or_else(|| CoverledgerError::RecordNotFound {
                    collection: record_type.collection().to_string(),
                    id: id.to_string(),
                })?;
            record.merge(fields);
            Ok(())
        })?;
        debug!(
            collection = record_type.collection(),
            id,
            fields = fields.len(),
            "record fields updated"
        );
        Ok(())
    }

    fn exists(&self, record_type: RecordType, id: &str) -> Result<bool> {
        Ok(self.collection(record_type).load()?.contains_key(id))
    }
}
