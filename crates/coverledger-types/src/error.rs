//! Error types for the CoverLedger core.
//!
//! All errors use the `CL_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation errors (update whitelist, record shape)
//! - 2xx: Authorization / signature errors
//! - 3xx: Replay / conflict errors
//! - 4xx: Storage errors
//! - 5xx: Not-found errors
//! - 6xx: Fulfillment errors (payment accepted, record not persisted)
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::RecordType;

/// Central error enum for all CoverLedger operations.
#[derive(Debug, Error)]
pub enum CoverledgerError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// A partial update named at least one field outside the per-type
    /// whitelist. No mutation occurred; the offending names are listed.
    #[error("CL_ERR_100: Invalid update fields for {record_type}: {}", fields.join(", "))]
    InvalidUpdateFields {
        record_type: RecordType,
        fields: Vec<String>,
    },

    /// A record presented for storage is missing its identifier field.
    #[error("CL_ERR_101: Record is missing its {} field", record_type.id_field())]
    MissingRecordId { record_type: RecordType },

    // =================================================================
    // Authorization / Signature Errors (2xx)
    // =================================================================
    /// The ed25519 signature didn't verify against the payer identity.
    #[error("CL_ERR_200: Authorization signature verification failed")]
    BadSignature,

    /// The authorization's validity window has elapsed.
    #[error("CL_ERR_201: Authorization expired: not_after {not_after}, now {now}")]
    AuthorizationExpired { not_after: i64, now: i64 },

    /// The authorization's validity window hasn't opened yet.
    #[error("CL_ERR_202: Authorization not yet valid: not_before {not_before}, now {now}")]
    AuthorizationNotYetValid { not_before: i64, now: i64 },

    /// The authorization names a payee other than the configured one.
    #[error("CL_ERR_203: Wrong payee: expected {expected}, got {actual}")]
    WrongPayee { expected: String, actual: String },

    /// The authorization names an asset other than the configured one.
    #[error("CL_ERR_204: Wrong asset: expected {expected}, got {actual}")]
    WrongAsset { expected: String, actual: String },

    /// The authorized amount is below the required minimum.
    #[error("CL_ERR_205: Insufficient amount: minimum {minimum}, got {actual}")]
    InsufficientAmount { minimum: Decimal, actual: Decimal },

    /// The payer address couldn't be decoded into a verifying key.
    #[error("CL_ERR_206: Malformed payer address: {reason}")]
    MalformedPayer { reason: String },

    // =================================================================
    // Replay / Conflict Errors (3xx)
    // =================================================================
    /// The (payer, nonce) pair was already used — replay rejected.
    #[error("CL_ERR_300: Nonce replay detected for payer {payer} nonce {nonce}")]
    NonceReplay { payer: String, nonce: String },

    // =================================================================
    // Storage Errors (4xx)
    // =================================================================
    /// Collection lock acquisition exceeded its bound. The caller may
    /// retry with backoff; the core never retries silently.
    #[error("CL_ERR_400: Lock timeout on collection {collection} after {waited_ms}ms")]
    LockTimeout { collection: String, waited_ms: u64 },

    /// I/O error from the backing medium.
    #[error("CL_ERR_401: I/O error: {0}")]
    Io(String),

    /// Serialization / deserialization error.
    #[error("CL_ERR_402: Serialization error: {0}")]
    Serialization(String),

    /// Relational backend error.
    #[error("CL_ERR_403: Database error: {0}")]
    Database(String),

    // =================================================================
    // Not-Found Errors (5xx)
    // =================================================================
    /// No record with this identifier exists in the collection.
    #[error("CL_ERR_500: Record not found in {collection}: {id}")]
    RecordNotFound { collection: String, id: String },

    // =================================================================
    // Fulfillment Errors (6xx)
    // =================================================================
    /// Payment was verified (nonce burned) but the record write failed.
    /// Distinct from a payment rejection: the caller must reconcile
    /// out-of-band, never retry with the same authorization.
    #[error("CL_ERR_600: Fulfillment failed for payer {payer} nonce {nonce}: {cause}")]
    FulfillmentFailed {
        payer: String,
        nonce: String,
        cause: String,
    },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("CL_ERR_900: Internal error: {0}")]
    Internal(String),
}

impl CoverledgerError {
    /// Whether the caller may reasonably retry the failed operation.
    ///
    /// Only transient storage contention qualifies. Validation, signature,
    /// and replay rejections are final: retrying a rejected replay must
    /// not succeed, and a fulfillment failure has already burned its nonce.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, CoverledgerError>;

impl From<std::io::Error> for CoverledgerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CoverledgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = CoverledgerError::RecordNotFound {
            collection: "policies".into(),
            id: "pol-1".into(),
        };
        let msg = format!("{err}");
        assert!(msg.starts_with("CL_ERR_500"), "Got: {msg}");
        assert!(msg.contains("pol-1"));
    }

    #[test]
    fn invalid_fields_lists_offenders() {
        let err = CoverledgerError::InvalidUpdateFields {
            record_type: RecordType::Policy,
            fields: vec!["owner".into(), "secret".into()],
        };
        let msg = format!("{err}");
        assert!(msg.contains("CL_ERR_100"));
        assert!(msg.contains("owner, secret"));
    }

    #[test]
    fn only_lock_timeout_is_retryable() {
        assert!(
            CoverledgerError::LockTimeout {
                collection: "policies".into(),
                waited_ms: 5000,
            }
            .is_retryable()
        );
        assert!(
            !CoverledgerError::NonceReplay {
                payer: "0xaa".into(),
                nonce: "n1".into(),
            }
            .is_retryable()
        );
        assert!(!CoverledgerError::BadSignature.is_retryable());
        assert!(
            !CoverledgerError::FulfillmentFailed {
                payer: "0xaa".into(),
                nonce: "n1".into(),
                cause: "disk full".into(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn all_errors_have_cl_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(CoverledgerError::BadSignature),
            Box::new(CoverledgerError::Io("disk full".into())),
            Box::new(CoverledgerError::Internal("test".into())),
            Box::new(CoverledgerError::MissingRecordId {
                record_type: RecordType::Claim,
            }),
            Box::new(CoverledgerError::AuthorizationExpired {
                not_after: 100,
                now: 200,
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("CL_ERR_"),
                "Error missing CL_ERR_ prefix: {msg}"
            );
        }
    }
}
