//! The record model: opaque field maps keyed by a string identifier.
//!
//! Records are deliberately schemaless at the type level — the HTTP layer
//! above this core decides what a policy or claim contains at creation.
//! The structural guarantees live elsewhere: the store guarantees no reader
//! ever observes a partial write, and the whitelist guarantees updates only
//! touch pre-approved fields.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoverledgerError, Result};

// ---------------------------------------------------------------------------
// RecordType
// ---------------------------------------------------------------------------

/// The two record types this core persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    Policy,
    Claim,
}

impl RecordType {
    /// The collection name backing this type (file stem / table name).
    #[must_use]
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Policy => "policies",
            Self::Claim => "claims",
        }
    }

    /// The name of the identifier field inside a record of this type.
    #[must_use]
    pub fn id_field(&self) -> &'static str {
        match self {
            Self::Policy => "policy_id",
            Self::Claim => "claim_id",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Policy => write!(f, "policy"),
            Self::Claim => write!(f, "claim"),
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// An opaque mapping from field name to JSON value.
///
/// Invariant: every persisted record is valid JSON and carries its own
/// identifier under the type's id field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Extract this record's identifier for the given type.
    pub fn id(&self, record_type: RecordType) -> Result<String> {
        self.0
            .get(record_type.id_field())
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(CoverledgerError::MissingRecordId { record_type })
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Merge a field map into this record, overwriting existing values.
    /// Callers must whitelist-validate `fields` first; this method does
    /// no checking of its own.
    pub fn merge(&mut self, fields: &Map<String, Value>) {
        for (k, v) in fields {
            self.0.insert(k.clone(), v.clone());
        }
    }

    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
