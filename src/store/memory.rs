//! In-process store backend.

use super::{Entry, SlotStore};
use crate::error::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

/// Mutex-guarded map of entries.
///
/// Useful for tests and for embedding the engine in a single process; every
/// command holds the map lock for its whole read-modify-write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStore for MemoryStore {
    fn check(&self) -> Result<()> {
        Ok(())
    }

    fn with_slot<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Option<Entry>) -> Result<R>,
    ) -> Result<R> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        let now = Utc::now();
        let current = entries.remove(key).filter(|entry| !entry.is_expired(now));

        let mut slot = current.clone();
        let result = f(&mut slot);
        let keep = if result.is_ok() { slot } else { current };

        if let Some(entry) = keep {
            entries.insert(key.to_string(), entry);
        }
        result
    }

    /// Expired entries are dropped from the map on the way.
    fn live_keys(&self) -> Result<Vec<String>> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        let now = Utc::now();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(entries.keys().cloned().collect())
    }
}
