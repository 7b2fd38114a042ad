//! Atomic filesystem operations for the file-backed store.
//!
//! All atomic writes follow this pattern:
//! 1. Write content to a temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Atomically rename it over the target
//!
//! Source and destination must be on the same filesystem for the rename to
//! be atomic, which is why the temporary file lives next to the target
//! (named `.{filename}.{pid}-{seq}.tmp`, unique per writer so that concurrent
//! writers never share one). A crash may leave such a file behind; store
//! scans skip dot-files.

use crate::error::{LockerError, Result};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// A name component unique to this process and call.
pub fn unique_suffix() -> String {
    format!(
        "{}-{}",
        std::process::id(),
        WRITE_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Atomically write bytes to a file.
///
/// The target file is never observable in a partial state.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            LockerError::store(
                &format!("failed to create directory '{}'", parent.display()),
                e,
            )
        })?;
    }

    let temp_path = generate_temp_path(path)?;
    write_and_sync(&temp_path, content)?;
    atomic_replace(&temp_path, path)
}

/// Remove a file, treating "already gone" as success.
///
/// Returns whether a file was actually removed.
pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(LockerError::store(
            &format!("failed to remove '{}'", path.display()),
            e,
        )),
    }
}

/// Generate a temporary file path in the same directory as the target.
fn generate_temp_path(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LockerError::StoreFailure("invalid file path".to_string()))?;

    Ok(parent.join(format!(".{}.{}.tmp", filename, unique_suffix())))
}

/// Write content to a file and sync to disk.
fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        LockerError::store(
            &format!("failed to create temporary file '{}'", path.display()),
            e,
        )
    })?;

    file.write_all(content).map_err(|e| {
        let _ = fs::remove_file(path);
        LockerError::store("failed to write temporary file", e)
    })?;

    file.sync_all().map_err(|e| {
        let _ = fs::remove_file(path);
        LockerError::store("failed to sync temporary file", e)
    })?;

    Ok(())
}

/// Rename the temporary file over the target.
fn atomic_replace(source: &Path, target: &Path) -> Result<()> {
    fs::rename(source, target).map_err(|e| {
        let _ = fs::remove_file(source);
        LockerError::store(
            &format!("failed to atomically replace '{}'", target.display()),
            e,
        )
    })?;

    sync_parent_dir(target);
    Ok(())
}

/// Persist the directory entry of a freshly renamed file.
#[cfg(unix)]
fn sync_parent_dir(target: &Path) {
    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_target: &Path) {}
