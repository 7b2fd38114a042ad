//! Shared key-value store for nodelocker.
//!
//! All cross-request coordination goes through this layer: entity records,
//! credentials and rate-limit counters. The command set mirrors the
//! single-key atomic commands of a networked key-value server:
//!
//! - hash records (`hget_all`, `hset`, `hset_nx`, `hdel`, `replace_hash`)
//! - counters with a fixed expiry window (`incr_window`)
//! - key lifetime (`expire`, `ttl`, `delete`)
//! - ordered prefix scans (`scan_prefix`)
//!
//! # Atomicity
//!
//! Each command touches exactly one key and is atomic with respect to other
//! commands on the same key. `replace_hash` and `delete` accept a
//! [`Precondition`] so that read-then-decide callers can turn their decision
//! into a compare-and-swap instead of a blind write.
//!
//! # Expiry
//!
//! Expired keys are invisible to every command and are evicted lazily the
//! next time they are touched.
//!
//! # Backends
//!
//! Backends implement the small [`SlotStore`] trait; the full [`KvStore`]
//! command set is provided on top of it.

mod file;
mod guard;
mod memory;


pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::{LockerError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field map of a hash record.
pub type Fields = BTreeMap<String, String>;

/// Value held under a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Hash(Fields),
    Counter(i64),
}

/// A stored value together with its optional expiry instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub value: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn hash(fields: Fields, ttl: Option<Duration>, now: DateTime<Utc>) -> Self {
        Self {
            value: Value::Hash(fields),
            expires_at: ttl.map(|ttl| now + ttl),
        }
    }

    /// Whether the entry's lifetime has run out at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn fields(&self, key: &str) -> Result<&Fields> {
        match &self.value {
            Value::Hash(fields) => Ok(fields),
            Value::Counter(_) => Err(wrong_type(key)),
        }
    }

    fn fields_mut(&mut self, key: &str) -> Result<&mut Fields> {
        match &mut self.value {
            Value::Hash(fields) => Ok(fields),
            Value::Counter(_) => Err(wrong_type(key)),
        }
    }
}

fn wrong_type(key: &str) -> LockerError {
    LockerError::StoreFailure(format!("key '{}' holds the wrong kind of value", key))
}

/// Condition a conditional write must satisfy at the moment it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition<'a> {
    /// Unconditional.
    Always,

    /// The hash field must currently hold `expected`; `None` means the
    /// field (or the whole key) must be absent.
    FieldEquals {
        field: &'a str,
        expected: Option<&'a str>,
    },
}

impl Precondition<'_> {
    fn holds(&self, current: Option<&Entry>) -> bool {
        match self {
            Precondition::Always => true,
            Precondition::FieldEquals { field, expected } => {
                let actual = current.and_then(|entry| match &entry.value {
                    Value::Hash(fields) => fields.get(*field).map(String::as_str),
                    Value::Counter(_) => None,
                });
                actual == *expected
            }
        }
    }
}

/// The store command set used by the engine adapters.
pub trait KvStore: Send + Sync {
    /// Verify that the store is reachable and writable.
    fn ping(&self) -> Result<()>;

    /// Read every field of a hash record.
    fn hget_all(&self, key: &str) -> Result<Option<Fields>>;

    /// Read one field of a hash record.
    fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        Ok(self.hget_all(key)?.and_then(|mut fields| fields.remove(field)))
    }

    /// Merge fields into a hash record, creating it if needed. Expiry is kept.
    fn hset(&self, key: &str, fields: &Fields) -> Result<()>;

    /// Merge fields into a hash record if the precondition holds. Returns
    /// whether the write happened.
    fn hset_if(&self, key: &str, fields: &Fields, precondition: &Precondition<'_>) -> Result<bool>;

    /// Set a field only if it does not exist yet. Returns whether it was set.
    fn hset_nx(&self, key: &str, field: &str, value: &str) -> Result<bool>;

    /// Remove one field. Removing the last field removes the key.
    fn hdel(&self, key: &str, field: &str) -> Result<bool>;

    /// Replace the whole record with `fields` and the given lifetime, if the
    /// precondition holds. Returns whether the write happened.
    fn replace_hash(
        &self,
        key: &str,
        fields: &Fields,
        ttl: Option<Duration>,
        precondition: &Precondition<'_>,
    ) -> Result<bool>;

    /// Remove a key if the precondition holds. Returns whether a live key
    /// was removed.
    fn delete(&self, key: &str, precondition: &Precondition<'_>) -> Result<bool>;

    /// Attach a lifetime to an existing key. A non-positive lifetime removes
    /// the key immediately. Returns whether the key existed.
    fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remaining lifetime of a key; `None` if absent or persistent.
    fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Live keys starting with `prefix`, sorted.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Increment a counter. The increment that creates the counter also
    /// starts its window; the counter disappears when the window ends.
    fn incr_window(&self, key: &str, window: Duration) -> Result<i64>;
}

/// Storage primitive every backend provides.
///
/// `with_slot` runs `f` on the current live entry of `key` (expired entries
/// appear as `None`) while holding exclusive access to that key. The slot
/// content after `f` returns `Ok` is persisted; on `Err` nothing is written.
pub trait SlotStore: Send + Sync {
    /// Backend health check.
    fn check(&self) -> Result<()>;

    /// Exclusive read-modify-write of one key.
    fn with_slot<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Option<Entry>) -> Result<R>,
    ) -> Result<R>;

    /// Keys of all live entries, in any order.
    fn live_keys(&self) -> Result<Vec<String>>;
}

impl<T: SlotStore> KvStore for T {
    fn ping(&self) -> Result<()> {
        self.check()
    }

    fn hget_all(&self, key: &str) -> Result<Option<Fields>> {
        self.with_slot(key, |slot| match slot.as_ref() {
            Some(entry) => Ok(Some(entry.fields(key)?.clone())),
            None => Ok(None),
        })
    }

    fn hset(&self, key: &str, fields: &Fields) -> Result<()> {
        self.with_slot(key, |slot| {
            match slot.as_mut() {
                Some(entry) => entry.fields_mut(key)?.extend(fields.clone()),
                None => *slot = Some(Entry::hash(fields.clone(), None, Utc::now())),
            }
            Ok(())
        })
    }

    fn hset_if(&self, key: &str, fields: &Fields, precondition: &Precondition<'_>) -> Result<bool> {
        self.with_slot(key, |slot| {
            if let Some(entry) = slot.as_ref() {
                entry.fields(key)?;
            }
            if !precondition.holds(slot.as_ref()) {
                return Ok(false);
            }
            match slot.as_mut() {
                Some(entry) => entry.fields_mut(key)?.extend(fields.clone()),
                None => *slot = Some(Entry::hash(fields.clone(), None, Utc::now())),
            }
            Ok(true)
        })
    }

    fn hset_nx(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        self.with_slot(key, |slot| match slot.as_mut() {
            Some(entry) => {
                let fields = entry.fields_mut(key)?;
                if fields.contains_key(field) {
                    return Ok(false);
                }
                fields.insert(field.to_string(), value.to_string());
                Ok(true)
            }
            None => {
                let fields = Fields::from([(field.to_string(), value.to_string())]);
                *slot = Some(Entry::hash(fields, None, Utc::now()));
                Ok(true)
            }
        })
    }

    fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        self.with_slot(key, |slot| {
            let Some(entry) = slot.as_mut() else {
                return Ok(false);
            };
            let fields = entry.fields_mut(key)?;
            let removed = fields.remove(field).is_some();
            if fields.is_empty() {
                *slot = None;
            }
            Ok(removed)
        })
    }

    fn replace_hash(
        &self,
        key: &str,
        fields: &Fields,
        ttl: Option<Duration>,
        precondition: &Precondition<'_>,
    ) -> Result<bool> {
        self.with_slot(key, |slot| {
            if let Some(entry) = slot.as_ref() {
                entry.fields(key)?;
            }
            if !precondition.holds(slot.as_ref()) {
                return Ok(false);
            }
            *slot = Some(Entry::hash(fields.clone(), ttl, Utc::now()));
            Ok(true)
        })
    }

    fn delete(&self, key: &str, precondition: &Precondition<'_>) -> Result<bool> {
        self.with_slot(key, |slot| {
            if slot.is_none() || !precondition.holds(slot.as_ref()) {
                return Ok(false);
            }
            *slot = None;
            Ok(true)
        })
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.with_slot(key, |slot| {
            let Some(entry) = slot.as_mut() else {
                return Ok(false);
            };
            if ttl <= Duration::zero() {
                *slot = None;
            } else {
                entry.expires_at = Some(Utc::now() + ttl);
            }
            Ok(true)
        })
    }

    fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        self.with_slot(key, |slot| {
            Ok(slot
                .as_ref()
                .and_then(|entry| entry.expires_at)
                .map(|at| at - Utc::now()))
        })
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .live_keys()?
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn incr_window(&self, key: &str, window: Duration) -> Result<i64> {
        self.with_slot(key, |slot| match slot {
            Some(Entry {
                value: Value::Counter(count),
                ..
            }) => {
                *count += 1;
                Ok(*count)
            }
            Some(_) => Err(wrong_type(key)),
            None => {
                *slot = Some(Entry {
                    value: Value::Counter(1),
                    expires_at: Some(Utc::now() + window),
                });
                Ok(1)
            }
        })
    }
}
