//! Entity records on top of the key-value store.

use super::{Entity, EntityKind, EntityState, FIELD_USER};
use crate::error::Result;
use crate::store::{KvStore, Precondition};
use chrono::Duration;

/// Typed access to entity records.
///
/// Every write replaces the whole record in one store command, so a reader
/// never sees a record with some fields updated and others not.
#[derive(Clone, Copy)]
pub struct EntityStore<'a> {
    kv: &'a dyn KvStore,
}

impl<'a> EntityStore<'a> {
    pub fn new(kv: &'a dyn KvStore) -> Self {
        Self { kv }
    }

    /// Read a record. `Ok(None)` means the entity has no record (unlocked).
    pub fn get(&self, kind: EntityKind, name: &str) -> Result<Option<Entity>> {
        match self.kv.hget_all(&kind.key(name))? {
            Some(fields) => Entity::from_fields(kind, name, &fields).map(Some),
            None => Ok(None),
        }
    }

    /// Write a record unconditionally.
    pub fn set(&self, entity: &Entity, ttl: Option<Duration>) -> Result<()> {
        self.kv
            .replace_hash(&entity.key(), &entity.to_fields(), ttl, &Precondition::Always)?;
        Ok(())
    }

    /// Write a record only if its owner is still `expected_owner` (`None`:
    /// no record). Returns whether the write happened.
    pub fn put_if_owner(
        &self,
        entity: &Entity,
        ttl: Option<Duration>,
        expected_owner: Option<&str>,
    ) -> Result<bool> {
        self.kv.replace_hash(
            &entity.key(),
            &entity.to_fields(),
            ttl,
            &owner_is(expected_owner),
        )
    }

    /// Remove a record. Returns whether one existed.
    pub fn delete(&self, kind: EntityKind, name: &str) -> Result<bool> {
        self.kv.delete(&kind.key(name), &Precondition::Always)
    }

    /// Remove a record only if its owner is still `expected_owner`.
    pub fn delete_if_owner(
        &self,
        kind: EntityKind,
        name: &str,
        expected_owner: &str,
    ) -> Result<bool> {
        self.kv
            .delete(&kind.key(name), &owner_is(Some(expected_owner)))
    }

    /// Names of all live records of a kind, sorted.
    pub fn scan_by_kind(&self, kind: EntityKind) -> Result<Vec<String>> {
        let prefix = kind.prefix();
        Ok(self
            .kv
            .scan_prefix(&prefix)?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    /// Attach a lifetime to a record so the store releases it on its own.
    pub fn set_expiry(&self, kind: EntityKind, name: &str, ttl: Duration) -> Result<bool> {
        self.kv.expire(&kind.key(name), ttl)
    }

    /// Names of locked hosts whose parent is `environment`, sorted.
    pub fn locked_hosts_in(&self, environment: &str) -> Result<Vec<String>> {
        let mut hosts = Vec::new();
        for name in self.scan_by_kind(EntityKind::Host)? {
            // Expired between scan and read.
            let Some(host) = self.get(EntityKind::Host, &name)? else {
                continue;
            };
            if host.state == EntityState::Locked && host.parent == environment {
                hosts.push(name);
            }
        }
        Ok(hosts)
    }
}

fn owner_is(expected: Option<&str>) -> Precondition<'_> {
    Precondition::FieldEquals {
        field: FIELD_USER,
        expected,
    }
}
