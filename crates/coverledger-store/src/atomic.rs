//! Crash-safe atomic file replace.
//!
//! A new version is fully staged out-of-place, fsynced, then renamed over
//! the canonical path in one indivisible step. A reader that opens the
//! canonical path always sees a complete prior or complete new version,
//! never a half-written one.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use coverledger_types::{CoverledgerError, Result};

/// Write `bytes` to `path` via stage-and-rename.
///
/// The caller must hold the collection lock across this entire call — the
/// rename is part of the critical section, not an afterthought.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = staging_path(path);

    let mut file = File::create(&tmp)
        .map_err(|e| CoverledgerError::Io(format!("create staging file {tmp:?}: {e}")))?;
    file.write_all(bytes)
        .map_err(|e| CoverledgerError::Io(format!("write staging file {tmp:?}: {e}")))?;
    // Data must be durable before the rename makes it the canonical version,
    // or a crash could publish an empty file.
    file.sync_all()
        .map_err(|e| CoverledgerError::Io(format!("sync staging file {tmp:?}: {e}")))?;
    drop(file);

    std::fs::rename(&tmp, path)
        .map_err(|e| CoverledgerError::Io(format!("rename {tmp:?} over {path:?}: {e}")))?;

    // Persist the directory entry so the rename survives a crash.
    if let Some(parent) = path.parent() {
        let dir = File::open(parent)
            .map_err(|e| CoverledgerError::Io(format!("open dir {parent:?}: {e}")))?;
        dir.sync_all()
            .map_err(|e| CoverledgerError::Io(format!("sync dir {parent:?}: {e}")))?;
    }

    Ok(())
}

/// Staging sibling for `path`: `policies.json` → `policies.json.tmp`.
fn staging_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    std::path::PathBuf::from(name)
}
