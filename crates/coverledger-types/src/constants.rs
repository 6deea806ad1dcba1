//! System-wide constants and defaults.

/// How long a used nonce is retained in the ledger, in seconds.
///
/// This is the single replay-protection horizon: an authorization whose
/// nonce was burned more than this long ago could in principle be replayed,
/// but its validity window (bounded by the same horizon at issuance time)
/// will have elapsed first.
pub const NONCE_EXPIRY_SECS: i64 = 3_600;

/// Default bound on collection-lock acquisition before the operation fails.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Sleep between non-blocking lock probes while waiting for the lock.
pub const LOCK_RETRY_INTERVAL_MS: u64 = 10;

/// Minimum seconds between nonce-ledger eviction sweeps. Eviction never
/// runs on every reservation.
pub const DEFAULT_EVICTION_INTERVAL_SECS: i64 = 60;

/// Collection file names for the flat-file backend.
pub const POLICIES_FILE: &str = "policies.json";
/// Claims collection file name.
pub const CLAIMS_FILE: &str = "claims.json";
/// Nonce ledger file name. Lives beside the record files but is a distinct
/// failure domain: record corruption never touches it and vice versa.
pub const NONCE_LEDGER_FILE: &str = "nonce_ledger.json";

/// Byte length of an ed25519 public key (and of a decoded payer address).
pub const PAYER_KEY_LEN: usize = 32;

/// Byte length of an ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;
