//! Per-key lock files for the file-backed store.
//!
//! A key lock is a file created with create_new semantics (exclusive create),
//! so only one process or thread at a time can run a command on that key.
//! The file carries JSON metadata naming its holder, which is used to break
//! locks abandoned by a crashed process.

use crate::error::{LockerError, Result};
use crate::events::local_actor;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Pause between attempts while another holder owns the key.
const RETRY_INTERVAL: std::time::Duration = std::time::Duration::from_millis(5);

/// Metadata written into every key lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyLockMetadata {
    /// Holder of the lock (`user@HOST`).
    owner: String,

    /// Process ID of the holder.
    pid: u32,

    /// When the lock was taken.
    created_at: DateTime<Utc>,
}

impl KeyLockMetadata {
    fn new() -> Self {
        Self {
            owner: local_actor(),
            pid: std::process::id(),
            created_at: Utc::now(),
        }
    }

    fn from_file(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }
}

/// RAII guard for a key lock file.
///
/// When dropped, the lock file is deleted. If deletion fails, a warning is
/// printed but no panic occurs.
#[derive(Debug)]
pub(super) struct KeyLock {
    path: PathBuf,
}

impl KeyLock {
    /// Take the lock at `path`, waiting up to `timeout` for the current holder.
    ///
    /// Locks older than `stale_after` are broken.
    pub(super) fn acquire(
        path: &Path,
        timeout: std::time::Duration,
        stale_after: Duration,
    ) -> Result<Self> {
        let deadline = Instant::now() + timeout;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let json = serde_json::to_string(&KeyLockMetadata::new())
                        .map_err(|e| LockerError::store("failed to serialize key lock", e))?;

                    if let Err(e) = file.write_all(json.as_bytes()) {
                        let _ = fs::remove_file(path);
                        return Err(LockerError::store("failed to write key lock", e));
                    }

                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if break_if_stale(path, stale_after)? {
                        continue;
                    }

                    if Instant::now() >= deadline {
                        let holder = KeyLockMetadata::from_file(path)
                            .map(|meta| format!(" (held by {} pid {})", meta.owner, meta.pid))
                            .unwrap_or_default();
                        return Err(LockerError::StoreFailure(format!(
                            "timed out waiting for key lock '{}'{}",
                            path.display(),
                            holder
                        )));
                    }

                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(LockerError::store(
                        &format!("failed to acquire key lock '{}'", path.display()),
                        e,
                    ));
                }
            }
        }
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != ErrorKind::NotFound
        {
            eprintln!(
                "Warning: failed to release key lock '{}': {}",
                self.path.display(),
                e
            );
        }
    }
}

/// Remove the lock file if its holder has been gone longer than `stale_after`.
///
/// Falls back to the file's modification time while the metadata is still
/// being written.
fn break_if_stale(path: &Path, stale_after: Duration) -> Result<bool> {
    let created_at = match KeyLockMetadata::from_file(path) {
        Some(meta) => meta.created_at,
        None => match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => DateTime::<Utc>::from(modified),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(LockerError::store("failed to inspect key lock", e)),
        },
    };

    if Utc::now().signed_duration_since(created_at) <= stale_after {
        return Ok(false);
    }

    eprintln!(
        "Warning: breaking stale key lock '{}' (created {})",
        path.display(),
        created_at.to_rfc3339()
    );
    crate::fs::remove_if_exists(path)?;
    Ok(true)
}
