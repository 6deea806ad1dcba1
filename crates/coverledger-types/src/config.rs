//! Configuration for the CoverLedger core.

use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants;

/// Configuration shared by the store, ledger, verifier, and manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Directory holding the record files, lock markers, and nonce ledger.
    pub data_dir: PathBuf,
    /// The only payee this deployment accepts authorizations for.
    pub expected_payee: String,
    /// The only asset this deployment accepts authorizations in.
    pub expected_asset: String,
    /// Minimum authorized amount for a policy premium.
    pub min_premium: Decimal,
    /// Replay-protection horizon: used nonces older than this are evicted.
    pub nonce_expiry_secs: i64,
    /// Bound on collection-lock acquisition before the operation fails.
    pub lock_timeout_ms: u64,
    /// Minimum seconds between nonce-ledger eviction sweeps.
    pub eviction_interval_secs: i64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            expected_payee: String::new(),
            expected_asset: String::new(),
            min_premium: Decimal::ZERO,
            nonce_expiry_secs: constants::NONCE_EXPIRY_SECS,
            lock_timeout_ms: constants::DEFAULT_LOCK_TIMEOUT_MS,
            eviction_interval_secs: constants::DEFAULT_EVICTION_INTERVAL_SECS,
        }
    }
}

impl CoreConfig {
    /// Convenience constructor for the common fields; the rest default.
    #[must_use]
    pub fn new(
        data_dir: impl Into<PathBuf>,
        expected_payee: impl Into<String>,
        expected_asset: impl Into<String>,
        min_premium: Decimal,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            expected_payee: expected_payee.into(),
            expected_asset: expected_asset.into(),
            min_premium,
            ..Self::default()
        }
    }

    /// Path of the nonce ledger file inside the data directory.
    #[must_use]
    pub fn nonce_ledger_path(&self) -> PathBuf {
        self.data_dir.join(constants::NONCE_LEDGER_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_constants() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.nonce_expiry_secs, 3_600);
        assert_eq!(cfg.lock_timeout_ms, 5_000);
        assert_eq!(cfg.eviction_interval_secs, 60);
    }

    #[test]
    fn ledger_path_under_data_dir() {
        let cfg = CoreConfig::new("/var/lib/coverledger", "acme", "USDC", Decimal::ONE);
        assert_eq!(
            cfg.nonce_ledger_path(),
            PathBuf::from("/var/lib/coverledger/nonce_ledger.json")
        );
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = CoreConfig::new("data", "acme", "USDC", Decimal::new(50, 0));
        let json = serde_json::to_string(&cfg).unwrap();
        let back: CoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.expected_payee, back.expected_payee);
        assert_eq!(cfg.min_premium, back.min_premium);
        assert_eq!(cfg.data_dir, back.data_dir);
    }
}
