//! The nonce ledger: a durable set of `payer:nonce` keys with timestamps.
//!
//! An explicit object with injected persistence, not ambient global state:
//! each instance owns one ledger file, loads it in full at construction,
//! and flushes on every successful reservation. Distinct instances are
//! fully isolated, which is what makes the ledger testable.
//!
//! The check-and-insert is a single atomic unit: callers serialize through
//! an in-process mutex plus the same cross-process file lock the record
//! store uses, and the on-disk file is re-read under that lock so a
//! reservation committed by another process is always observed. A
//! reservation is only reported accepted once it is durable — persistence
//! failure rolls the in-memory insert back and surfaces as a storage
//! error, never as Accepted.
//!
//! Replay protection is bounded by the expiry horizon: entries older than
//! the horizon are swept on load and periodically afterwards, never on
//! every reservation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use coverledger_store::atomic::write_atomic;
use coverledger_store::CollectionLock;
use coverledger_types::{CoreConfig, CoverledgerError, PayerAddress, Result};

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// The key was absent and is now durably recorded.
    Accepted,
    /// The key was already present; nothing was mutated.
    AlreadyUsed,
}

/// On-disk and in-memory shape: `"payer:nonce"` → used-at epoch seconds.
type Entries = HashMap<String, i64>;

struct LedgerState {
    entries: Entries,
    last_sweep: i64,
}

/// Durable set of used `(payer, nonce)` pairs.
pub struct NonceLedger {
    path: PathBuf,
    lock: CollectionLock,
    expiry_secs: i64,
    eviction_interval_secs: i64,
    state: Mutex<LedgerState>,
}

impl NonceLedger {
    /// Load the ledger from its file, dropping entries already outside the
    /// replay horizon (lazy eviction). A missing file is an empty ledger.
    pub fn load(config: &CoreConfig, now: i64) -> Result<Self> {
        let path = config.nonce_ledger_path();
        let dir = path
            .parent()
            .ok_or_else(|| CoverledgerError::Internal(format!("ledger path {path:?} has no parent")))?;
        std::fs::create_dir_all(dir)
            .map_err(|e| CoverledgerError::Io(format!("create data dir {dir:?}: {e}")))?;

        let lock = CollectionLock::open(
            dir,
            "nonce_ledger",
            Duration::from_millis(config.lock_timeout_ms),
        )?;

        // Load and evict under the lock. The swept map is written back so
        // the file never resurrects an expired entry on the next re-read.
        let guard = lock.acquire()?;
        let mut entries = read_entries(&path)?;
        let before = entries.len();
        sweep(&mut entries, config.nonce_expiry_secs, now);
        let evicted = before - entries.len();
        if evicted > 0 {
            persist_entries(&path, &entries)?;
        }
        drop(guard);
        info!(loaded = entries.len(), evicted, "nonce ledger loaded");

        Ok(Self {
            path,
            lock,
            expiry_secs: config.nonce_expiry_secs,
            eviction_interval_secs: config.eviction_interval_secs,
            state: Mutex::new(LedgerState {
                entries,
                last_sweep: now,
            }),
        })
    }

    /// Atomically check for `(payer, nonce)` and, if absent, record it
    /// durably with the given timestamp.
    ///
    /// Returns [`Reservation::AlreadyUsed`] without mutation when the key
    /// exists. An `Err` means the reservation is *not* held: a failed
    /// persist rolls back the in-memory insert.
    pub fn try_reserve(
        &self,
        payer: &PayerAddress,
        nonce: &str,
        now: i64,
    ) -> Result<Reservation> {
        let key = ledger_key(payer, nonce);
        let mut state = self.state.lock();
        let _guard = self.lock.acquire()?;

        // Another process may have committed since our last read; the file
        // is the source of truth while the lock is held.
        let mut entries = read_entries(&self.path)?;

        if now - state.last_sweep >= self.eviction_interval_secs {
            sweep(&mut entries, self.expiry_secs, now);
            state.last_sweep = now;
        }

        if entries.contains_key(&key) {
            debug!(%payer, nonce, "nonce already used");
            state.entries = entries;
            return Ok(Reservation::AlreadyUsed);
        }

        entries.insert(key.clone(), now);
        if let Err(e) = self.persist(&entries) {
            // Not durable — the reservation must not be observable either.
            entries.remove(&key);
            state.entries = entries;
            return Err(e);
        }

        state.entries = entries;
        debug!(%payer, nonce, "nonce reserved");
        Ok(Reservation::Accepted)
    }

    /// Whether a key is currently recorded. Reads the in-memory mirror.
    #[must_use]
    pub fn contains(&self, payer: &PayerAddress, nonce: &str) -> bool {
        self.state.lock().entries.contains_key(&ledger_key(payer, nonce))
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    fn persist(&self, entries: &Entries) -> Result<()> {
        persist_entries(&self.path, entries)
    }
}

fn persist_entries(path: &std::path::Path, entries: &Entries) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(entries)
        .map_err(|e| CoverledgerError::Serialization(e.to_string()))?;
    write_atomic(path, &bytes)
}

fn ledger_key(payer: &PayerAddress, nonce: &str) -> String {
    // PayerAddress is already lowercase-normalized.
    format!("{}:{}", payer.as_str(), nonce)
}

fn read_entries(path: &std::path::Path) -> Result<Entries> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
        Err(e) => return Err(CoverledgerError::Io(format!("read {path:?}: {e}"))),
    };
    serde_json::from_slice(&bytes)
        .map_err(|e| CoverledgerError::Serialization(format!("parse {path:?}: {e}")))
}

/// Drop entries outside the replay horizon.
fn sweep(entries: &mut Entries, expiry_secs: i64, now: i64) {
    entries.retain(|_, used_at| now - *used_at <= expiry_secs);
}
