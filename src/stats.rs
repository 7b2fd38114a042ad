//! Read-only summary of the lock table.
//!
//! Built only from `scan_by_kind` and `get`, so producing a report never
//! changes engine state.

use crate::entity::{Entity, EntityKind, EntityState, EntityStore, LastDay};
use crate::error::{LockerError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;

/// A locked entity as shown in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockedEntry {
    pub name: String,
    pub owner: String,
    #[serde(rename = "lastday", skip_serializing_if = "Option::is_none")]
    pub last_day: Option<LastDay>,
}

impl LockedEntry {
    fn from_entity(entity: Entity) -> Self {
        Self {
            name: entity.name,
            owner: entity.owner,
            last_day: entity.last_day,
        }
    }
}

/// Environment names grouped by state, plus locked hosts. Every list is
/// sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    #[serde(rename = "validenvs")]
    pub valid_envs: Vec<String>,
    #[serde(rename = "lockedenvs")]
    pub locked_envs: Vec<LockedEntry>,
    #[serde(rename = "maintenvs")]
    pub maint_envs: Vec<String>,
    #[serde(rename = "termdenvs")]
    pub termd_envs: Vec<String>,
    #[serde(rename = "lockedhosts")]
    pub locked_hosts: Vec<LockedEntry>,
}

/// Name filter for reports.
#[derive(Debug, Clone)]
pub struct NameFilter {
    globs: GlobSet,
}

impl NameFilter {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                continue;
            }
            let glob = Glob::new(pattern).map_err(|e| {
                LockerError::InputInvalid(format!("invalid filter '{}': {}", pattern, e))
            })?;
            builder.add(glob);
        }
        let globs = builder
            .build()
            .map_err(|e| LockerError::InputInvalid(format!("invalid filter: {}", e)))?;
        Ok(Self { globs })
    }

    /// An empty filter matches everything.
    pub fn matches(&self, name: &str) -> bool {
        self.globs.is_empty() || self.globs.is_match(name)
    }
}

impl Stats {
    /// Collect the current lock table, keeping names accepted by `filter`.
    ///
    /// A record that cannot be read is reported on stderr and skipped.
    pub fn collect(entities: &EntityStore<'_>, filter: Option<&NameFilter>) -> Result<Self> {
        let mut stats = Stats::default();

        for entity in load_all(entities, EntityKind::Environment, filter)? {
            match entity.state {
                EntityState::Unlocked => stats.valid_envs.push(entity.name),
                EntityState::Locked => stats.locked_envs.push(LockedEntry::from_entity(entity)),
                EntityState::Maintenance => stats.maint_envs.push(entity.name),
                EntityState::Terminated => stats.termd_envs.push(entity.name),
            }
        }

        for entity in load_all(entities, EntityKind::Host, filter)? {
            if entity.state == EntityState::Locked {
                stats.locked_hosts.push(LockedEntry::from_entity(entity));
            }
        }

        Ok(stats)
    }

    pub fn total_envs(&self) -> usize {
        self.valid_envs.len() + self.locked_envs.len() + self.maint_envs.len() + self.termd_envs.len()
    }
}

fn load_all(
    entities: &EntityStore<'_>,
    kind: EntityKind,
    filter: Option<&NameFilter>,
) -> Result<Vec<Entity>> {
    let mut loaded = Vec::new();
    for name in entities.scan_by_kind(kind)? {
        if filter.is_some_and(|f| !f.matches(&name)) {
            continue;
        }
        match entities.get(kind, &name) {
            Ok(Some(entity)) => loaded.push(entity),
            // Expired between scan and read.
            Ok(None) => {}
            Err(e) => eprintln!("Warning: skipping '{}': {}", kind.key(&name), e),
        }
    }
    Ok(loaded)
}
