//! Collection-scoped mutual exclusion across threads and processes.
//!
//! Each collection gets a dedicated zero-byte marker file
//! (`<collection>.lock`) that exists only to be locked — it never holds
//! data, so acquiring it can never race with readers of the data file.
//!
//! Two layers compose into one critical section:
//!
//! 1. an in-process [`parking_lot::Mutex`] gate — POSIX fcntl locks are
//!    per-process, so two threads of the same process would both "acquire"
//!    the file lock without this;
//! 2. a non-blocking `fcntl(F_SETLK)` exclusive lock on the marker,
//!    probed in a bounded retry loop for cross-process exclusion.
//!
//! Acquisition is bounded by a timeout; on expiry the operation fails with
//! `LockTimeout` rather than deadlocking. The returned guard releases both
//! layers on `Drop`, so the lock is held across the staging write *and* the
//! rename, and released on every exit path.

use std::fs::{File, OpenOptions};
use std::os::fd::{AsFd, AsRawFd};
use std::path::Path;
use std::time::{Duration, Instant};

use coverledger_types::constants::LOCK_RETRY_INTERVAL_MS;
use coverledger_types::{CoverledgerError, Result};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Whole-file `flock` request of the given type (`F_WRLCK` / `F_UNLCK`).
fn whole_file_flock(lock_type: i32) -> libc::flock {
    let lock_type = i16::try_from(lock_type).expect("fcntl lock type must fit in i16");
    let whence = i16::try_from(libc::SEEK_SET).expect("SEEK_SET must fit in i16");
    libc::flock {
        l_type: lock_type,
        l_whence: whence,
        l_start: 0,
        l_len: 0,
        l_pid: 0,
    }
}

/// Attempt a non-blocking whole-file POSIX advisory lock via `fcntl(F_SETLK)`.
///
/// Returns `Ok(true)` if the lock was acquired, `Ok(false)` if it would
/// block (another process holds a conflicting lock), and `Err` for real
/// I/O errors.
fn posix_try_lock(file: &impl AsFd) -> Result<bool> {
    let flock = whole_file_flock(libc::F_WRLCK);
    match nix::fcntl::fcntl(
        file.as_fd().as_raw_fd(),
        nix::fcntl::FcntlArg::F_SETLK(&flock),
    ) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::EACCES | nix::errno::Errno::EAGAIN) => Ok(false),
        Err(e) => Err(CoverledgerError::Io(e.to_string())),
    }
}

/// Release a POSIX advisory lock.
fn posix_unlock(file: &impl AsFd) -> Result<()> {
    let flock = whole_file_flock(libc::F_UNLCK);
    nix::fcntl::fcntl(
        file.as_fd().as_raw_fd(),
        nix::fcntl::FcntlArg::F_SETLK(&flock),
    )
    .map_err(|e| CoverledgerError::Io(e.to_string()))?;
    Ok(())
}

/// Mutual exclusion for one collection's write path.
///
/// One instance per collection per process: fcntl locks never conflict
/// within a process, so the in-process gate only covers threads sharing
/// this instance.
pub struct CollectionLock {
    collection: String,
    /// The marker file. Kept open for the life of the lock: closing any fd
    /// to a file drops the process's fcntl locks on it.
    marker: File,
    /// In-process gate. Always taken before the file lock.
    gate: Mutex<()>,
    timeout: Duration,
}

impl CollectionLock {
    /// Open (creating if absent) the marker file `<collection>.lock` in
    /// `dir`. The marker is never truncated or written.
    pub fn open(dir: &Path, collection: &str, timeout: Duration) -> Result<Self> {
        let path = dir.join(format!("{collection}.lock"));
        let marker = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| CoverledgerError::Io(format!("open lock marker {path:?}: {e}")))?;
        Ok(Self {
            collection: collection.to_string(),
            marker,
            gate: Mutex::new(()),
            timeout,
        })
    }

    /// Acquire the collection lock, waiting at most the configured timeout
    /// across both layers.
    pub fn acquire(&self) -> Result<CollectionGuard<'_>> {
        let start = Instant::now();

        let gate = self
            .gate
            .try_lock_for(self.timeout)
            .ok_or_else(|| self.timeout_error(start))?;

        loop {
            if posix_try_lock(&self.marker)? {
                debug!(collection = %self.collection, "collection lock acquired");
                return Ok(CollectionGuard { lock: self, _gate: gate });
            }
            if start.elapsed() >= self.timeout {
                // gate guard drops here, releasing the in-process layer
                return Err(self.timeout_error(start));
            }
            std::thread::sleep(Duration::from_millis(LOCK_RETRY_INTERVAL_MS));
        }
    }

    fn timeout_error(&self, start: Instant) -> CoverledgerError {
        let waited_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        warn!(collection = %self.collection, waited_ms, "collection lock timeout");
        CoverledgerError::LockTimeout {
            collection: self.collection.clone(),
            waited_ms,
        }
    }

    /// The collection this lock serializes.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

/// RAII guard over one collection's critical section. Both lock layers are
/// released on `Drop`, on every exit path.
pub struct CollectionGuard<'a> {
    lock: &'a CollectionLock,
    _gate: MutexGuard<'a, ()>,
}

impl Drop for CollectionGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = posix_unlock(&self.lock.marker) {
            // Unlock can only fail if the fd went bad; the lock dies with
            // the process either way.
            warn!(collection = %self.lock.collection, error = %e, "failed to release file lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = CollectionLock::open(dir.path(), "policies", Duration::from_millis(500)).unwrap();

        let guard = lock.acquire().unwrap();
        drop(guard);
        // Reacquirable after release
        let _guard = lock.acquire().unwrap();
    }

    #[test]
    fn marker_file_created_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let _lock =
            CollectionLock::open(dir.path(), "claims", Duration::from_millis(500)).unwrap();
        let meta = std::fs::metadata(dir.path().join("claims.lock")).unwrap();
        assert_eq!(meta.len(), 0, "lock marker must never contain data");
    }

    #[test]
    fn second_thread_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock = std::sync::Arc::new(
            CollectionLock::open(dir.path(), "policies", Duration::from_millis(100)).unwrap(),
        );

        let guard = lock.acquire().unwrap();

        let contender = std::sync::Arc::clone(&lock);
        let handle = std::thread::spawn(move || contender.acquire().map(|_| ()));
        let err = handle.join().unwrap().unwrap_err();
        assert!(
            matches!(err, CoverledgerError::LockTimeout { .. }),
            "expected LockTimeout, got {err:?}"
        );
        assert!(err.is_retryable());

        drop(guard);
        // After release the same thread path succeeds
        let _guard = lock.acquire().unwrap();
    }

    #[test]
    fn different_collections_do_not_contend() {
        let dir = tempfile::tempdir().unwrap();
        let policies =
            CollectionLock::open(dir.path(), "policies", Duration::from_millis(100)).unwrap();
        let claims =
            CollectionLock::open(dir.path(), "claims", Duration::from_millis(100)).unwrap();

        let _p = policies.acquire().unwrap();
        // Holding policies must not block claims
        let _c = claims.acquire().unwrap();
    }
}
