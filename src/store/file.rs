//! Directory-backed store backend.
//!
//! # Layout
//!
//! ```text
//! <store>/
//!   data/<hex(key)>.json    one Entry document per key
//!   locks/<hex(key)>.lock   held while a command runs on that key
//! ```
//!
//! Keys are hex-encoded so that any entity name (including `/` and `|`)
//! maps to a single flat file name. Documents are replaced atomically, so
//! scans can read them without taking key locks.

use super::guard::KeyLock;
use super::{Entry, SlotStore};
use crate::config::Config;
use crate::context::StoreContext;
use crate::error::{LockerError, Result};
use crate::fs::{atomic_write, remove_if_exists, unique_suffix};
use chrono::{Duration, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const DOCUMENT_EXTENSION: &str = "json";

/// Store whose keys are JSON documents in a shared directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
    locks_dir: PathBuf,
    timeout: std::time::Duration,
    stale_after: Duration,
}

impl FileStore {
    /// Open the store described by `ctx` and verify that it is usable.
    pub fn open(ctx: &StoreContext, config: &Config) -> Result<Self> {
        let store = Self {
            data_dir: ctx.data_dir.clone(),
            locks_dir: ctx.locks_dir.clone(),
            timeout: std::time::Duration::from_millis(config.store_timeout_ms),
            stale_after: config.store_lock_stale()?,
        };
        store.check()?;
        Ok(store)
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", hex::encode(key), DOCUMENT_EXTENSION))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.locks_dir.join(format!("{}.lock", hex::encode(key)))
    }

    fn load(path: &Path) -> Result<Option<Entry>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LockerError::store(
                    &format!("failed to read '{}'", path.display()),
                    e,
                ));
            }
        };

        serde_json::from_str(&content).map(Some).map_err(|e| {
            LockerError::store(&format!("corrupt document '{}'", path.display()), e)
        })
    }

    fn save(path: &Path, entry: &Entry) -> Result<()> {
        let json = serde_json::to_string_pretty(entry)
            .map_err(|e| LockerError::store("failed to serialize entry", e))?;
        atomic_write(path, json.as_bytes())
    }

    fn decode_key(path: &Path) -> Option<String> {
        if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        if stem.starts_with('.') {
            return None;
        }
        let bytes = hex::decode(stem).ok()?;
        String::from_utf8(bytes).ok()
    }
}

impl SlotStore for FileStore {
    fn check(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.locks_dir] {
            if !dir.is_dir() {
                return Err(LockerError::StoreFailure(format!(
                    "store directory '{}' is missing",
                    dir.display()
                )));
            }
        }

        let marker = self.data_dir.join(format!(".ping-{}", unique_suffix()));
        atomic_write(&marker, b"pong")?;
        remove_if_exists(&marker)?;
        Ok(())
    }

    fn with_slot<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Option<Entry>) -> Result<R>,
    ) -> Result<R> {
        let _lock = KeyLock::acquire(&self.lock_path(key), self.timeout, self.stale_after)?;

        let path = self.document_path(key);
        let on_disk = Self::load(&path)?;
        let now = Utc::now();
        let current = on_disk.clone().filter(|entry| !entry.is_expired(now));

        let mut slot = current.clone();
        let result = f(&mut slot)?;

        match slot {
            Some(entry) if Some(&entry) != on_disk.as_ref() => Self::save(&path, &entry)?,
            Some(_) => {}
            None if on_disk.is_some() => {
                remove_if_exists(&path)?;
            }
            None => {}
        }

        Ok(result)
    }

    fn live_keys(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.data_dir).map_err(|e| {
            LockerError::store(
                &format!("failed to read store directory '{}'", self.data_dir.display()),
                e,
            )
        })?;

        let now = Utc::now();
        let mut keys = Vec::new();

        for entry in entries {
            let entry =
                entry.map_err(|e| LockerError::store("failed to read store directory entry", e))?;
            let path = entry.path();

            let Some(key) = Self::decode_key(&path) else {
                continue;
            };

            // Deleted between listing and reading.
            let Some(document) = Self::load(&path)? else {
                continue;
            };

            if !document.is_expired(now) {
                keys.push(key);
            } else {
                // Rechecked under the key lock; a fresh write is kept.
                self.with_slot(&key, |_| Ok(()))?;
            }
        }

        Ok(keys)
    }
}
