//! Identifiers used throughout CoverLedger.
//!
//! Policy and claim IDs are caller-visible strings, immutable once assigned
//! and never reused. `PayerAddress` is the hex form of an ed25519 public
//! key; `RequestId` uses UUIDv7 for time-ordered tracing.

use std::fmt;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::PAYER_KEY_LEN;
use crate::error::{CoverledgerError, Result};

// ---------------------------------------------------------------------------
// PolicyId
// ---------------------------------------------------------------------------

/// Unique policy identifier. Assigned once, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(pub String);

impl PolicyId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ClaimId
// ---------------------------------------------------------------------------

/// Unique claim identifier. Minted from UUIDv7 so claims sort by filing time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimId(pub String);

impl ClaimId {
    /// Mint a fresh claim identifier.
    #[must_use]
    pub fn mint() -> Self {
        Self(format!("clm-{}", Uuid::now_v7()))
    }

    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PayerAddress
// ---------------------------------------------------------------------------

/// A payer identity: the lowercase `0x`-prefixed hex encoding of an ed25519
/// public key (32 bytes).
///
/// Construction normalizes to lowercase, so equality and nonce-ledger keying
/// are case-insensitive with respect to the caller's input. The address is
/// the verification key — there is no separate key registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayerAddress(String);

impl PayerAddress {
    /// Normalize an address string. The hex payload is not validated here;
    /// decoding happens in [`PayerAddress::verifying_key`] where a failure
    /// maps to a verification error.
    #[must_use]
    pub fn new(addr: impl AsRef<str>) -> Self {
        Self(addr.as_ref().to_lowercase())
    }

    /// Build an address from a public key.
    #[must_use]
    pub fn from_pubkey(key: &VerifyingKey) -> Self {
        Self(format!("0x{}", hex::encode(key.as_bytes())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the address back into its ed25519 verifying key.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        let hex_part = self
            .0
            .strip_prefix("0x")
            .ok_or_else(|| CoverledgerError::MalformedPayer {
                reason: "missing 0x prefix".into(),
            })?;
        let bytes = hex::decode(hex_part).map_err(|e| CoverledgerError::MalformedPayer {
            reason: format!("invalid hex: {e}"),
        })?;
        let bytes: [u8; PAYER_KEY_LEN] =
            bytes
                .try_into()
                .map_err(|v: Vec<u8>| CoverledgerError::MalformedPayer {
                    reason: format!("expected {PAYER_KEY_LEN} bytes, got {}", v.len()),
                })?;
        VerifyingKey::from_bytes(&bytes).map_err(|e| CoverledgerError::MalformedPayer {
            reason: format!("not a valid ed25519 point: {e}"),
        })
    }
}

impl fmt::Display for PayerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// Identifier for a single manager request. UUIDv7 for time-ordered sorting
/// in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn claim_id_uniqueness() {
        let a = ClaimId::mint();
        let b = ClaimId::mint();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("clm-"));
    }

    #[test]
    fn claim_id_ordering() {
        let a = ClaimId::mint();
        let b = ClaimId::mint();
        assert!(a < b);
    }

    #[test]
    fn payer_address_normalizes_case() {
        let a = PayerAddress::new("0xABCDef");
        let b = PayerAddress::new("0xabcdef");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "0xabcdef");
    }

    #[test]
    fn payer_address_roundtrips_pubkey() {
        let key = SigningKey::generate(&mut OsRng);
        let addr = PayerAddress::from_pubkey(&key.verifying_key());
        let recovered = addr.verifying_key().unwrap();
        assert_eq!(recovered.as_bytes(), key.verifying_key().as_bytes());
    }

    #[test]
    fn payer_address_rejects_missing_prefix() {
        let addr = PayerAddress::new("abcdef");
        assert!(matches!(
            addr.verifying_key(),
            Err(CoverledgerError::MalformedPayer { .. })
        ));
    }

    #[test]
    fn payer_address_rejects_wrong_length() {
        let addr = PayerAddress::new("0xabcd");
        assert!(matches!(
            addr.verifying_key(),
            Err(CoverledgerError::MalformedPayer { .. })
        ));
    }

    #[test]
    fn serde_roundtrips() {
        let pid = PolicyId::new("pol-7");
        let json = serde_json::to_string(&pid).unwrap();
        assert_eq!(json, "\"pol-7\"");
        let back: PolicyId = serde_json::from_str(&json).unwrap();
        assert_eq!(pid, back);

        let rid = RequestId::new();
        let json = serde_json::to_string(&rid).unwrap();
        let back: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(rid, back);
    }
}
