//! Lock state machine.
//!
//! Environment states:
//!
//! ```text
//!            lock              maintenance
//! (absent) -------> locked    unlocked ------> maintenance
//!    ^                |          ^                  |
//!    +----- unlock ---+          +---- create ------+
//!
//! any --terminate--> terminated
//! ```
//!
//! Hosts only move between absent and locked, and may be locked only while
//! their parent environment exists and is unlocked.
//!
//! Every write is conditional on the owner the decision was based on, so two
//! racing lockers cannot both succeed; the loser sees `OwnershipConflict`.

use crate::credentials::ADMIN;
use crate::entity::{
    Entity, EntityKind, EntityState, EntityStore, LastDay, LockStatus, derive_parent,
};
use crate::error::{LockerError, Result};
use crate::store::KvStore;
use chrono::{DateTime, Duration, Local};

/// Record of an entity before and after one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub previous: Option<Entity>,
    pub current: Option<Entity>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Lock decisions for one request, evaluated at a fixed instant.
pub struct LockMachine<'a> {
    entities: EntityStore<'a>,
    now: DateTime<Local>,
}

fn is_admin(user: &str) -> bool {
    user == ADMIN
}

impl<'a> LockMachine<'a> {
    pub fn new(kv: &'a dyn KvStore, now: DateTime<Local>) -> Self {
        Self {
            entities: EntityStore::new(kv),
            now,
        }
    }

    pub fn lock(
        &self,
        kind: EntityKind,
        name: &str,
        actor: &str,
        last_day: LastDay,
    ) -> Result<Transition> {
        match kind {
            EntityKind::Environment => self.lock_environment(name, actor, last_day),
            EntityKind::Host => self.lock_host(name, actor, last_day),
        }
    }

    pub fn unlock(&self, kind: EntityKind, name: &str, actor: &str) -> Result<Transition> {
        match kind {
            EntityKind::Environment => self.unlock_environment(name, actor),
            EntityKind::Host => self.unlock_host(name, actor),
        }
    }

    pub fn lock_environment(&self, name: &str, actor: &str, last_day: LastDay) -> Result<Transition> {
        let ttl = self.ttl_for(last_day)?;
        let kind = EntityKind::Environment;
        let previous = self.entities.get(kind, name)?;

        if let Some(current) = &previous
            && !is_admin(actor)
        {
            match current.state {
                EntityState::Maintenance | EntityState::Terminated => {
                    return Err(LockerError::EntityUnavailable {
                        entity: current.key(),
                        state: current.state.to_string(),
                    });
                }
                _ => Self::check_owner(current, actor)?,
            }
        }

        let hosts = self.entities.locked_hosts_in(name)?;
        if !hosts.is_empty() {
            return Err(LockerError::HostsLocked {
                environment: name.to_string(),
                hosts,
            });
        }

        let entity = Entity::locked(kind, name, actor, last_day);
        self.write(entity, previous, ttl)
    }

    pub fn unlock_environment(&self, name: &str, actor: &str) -> Result<Transition> {
        self.release(EntityKind::Environment, name, actor)
    }

    /// Hierarchy view of an environment.
    pub fn environment_lock_status(&self, name: &str) -> Result<LockStatus> {
        let entity = self.entities.get(EntityKind::Environment, name)?;
        Ok(LockStatus::of(entity.as_ref()))
    }

    pub fn lock_host(&self, name: &str, actor: &str, last_day: LastDay) -> Result<Transition> {
        let ttl = self.ttl_for(last_day)?;
        let parent = derive_parent(name);

        let status = self.environment_lock_status(parent)?;
        if status != LockStatus::Unlocked {
            return Err(LockerError::ParentUnavailable {
                parent: parent.to_string(),
                status: status.to_string(),
            });
        }

        let previous = self.entities.get(EntityKind::Host, name)?;
        if let Some(current) = &previous
            && !is_admin(actor)
        {
            Self::check_owner(current, actor)?;
        }

        let entity = Entity::locked(EntityKind::Host, name, actor, last_day);
        self.write(entity, previous, ttl)
    }

    pub fn unlock_host(&self, name: &str, actor: &str) -> Result<Transition> {
        self.release(EntityKind::Host, name, actor)
    }

    pub fn set_environment_maintenance(&self, name: &str) -> Result<Transition> {
        self.administer(Entity::environment(name, EntityState::Maintenance, ""))
    }

    /// Terminated environments record `admin` as their owner.
    pub fn terminate_environment(&self, name: &str) -> Result<Transition> {
        self.administer(Entity::environment(name, EntityState::Terminated, ADMIN))
    }

    /// Register an environment as unlocked so hosts under it can be locked.
    /// Also returns a maintenance or terminated environment to service.
    /// A user's running lock is never replaced.
    pub fn create_environment(&self, name: &str) -> Result<Transition> {
        if let Some(current) = self.entities.get(EntityKind::Environment, name)?
            && current.state == EntityState::Locked
        {
            return Err(LockerError::OwnershipConflict {
                entity: current.key(),
                owner: current.owner,
            });
        }
        self.administer(Entity::environment(name, EntityState::Unlocked, ""))
    }

    fn ttl_for(&self, last_day: LastDay) -> Result<Duration> {
        last_day.ttl_from(&self.now).ok_or_else(|| {
            LockerError::InputInvalid(format!("lastday '{}' is in the past", last_day))
        })
    }

    fn check_owner(current: &Entity, actor: &str) -> Result<()> {
        match current.owner() {
            Some(owner) if owner != actor => Err(LockerError::OwnershipConflict {
                entity: current.key(),
                owner: owner.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn write(&self, entity: Entity, previous: Option<Entity>, ttl: Duration) -> Result<Transition> {
        let expected = previous.as_ref().map(|e| e.owner.as_str());
        if !self.entities.put_if_owner(&entity, Some(ttl), expected)? {
            return Err(self.lost_race(entity.kind, &entity.name));
        }
        Ok(Transition {
            previous,
            current: Some(entity),
        })
    }

    fn release(&self, kind: EntityKind, name: &str, actor: &str) -> Result<Transition> {
        let Some(current) = self.entities.get(kind, name)? else {
            return Ok(Transition {
                previous: None,
                current: None,
            });
        };

        if !is_admin(actor) {
            match current.state {
                // Created by the administrator, not locked by anyone.
                EntityState::Unlocked => {
                    return Ok(Transition {
                        previous: Some(current.clone()),
                        current: Some(current),
                    });
                }
                EntityState::Maintenance | EntityState::Terminated => {
                    return Err(LockerError::EntityUnavailable {
                        entity: current.key(),
                        state: current.state.to_string(),
                    });
                }
                EntityState::Locked => Self::check_owner(&current, actor)?,
            }
        }

        if !self.entities.delete_if_owner(kind, name, &current.owner)? {
            // Expired meanwhile: already released.
            if self.entities.get(kind, name)?.is_none() {
                return Ok(Transition {
                    previous: Some(current),
                    current: None,
                });
            }
            return Err(self.lost_race(kind, name));
        }

        Ok(Transition {
            previous: Some(current),
            current: None,
        })
    }

    fn administer(&self, entity: Entity) -> Result<Transition> {
        let previous = self.entities.get(entity.kind, &entity.name)?;
        self.entities.set(&entity, None)?;
        Ok(Transition {
            previous,
            current: Some(entity),
        })
    }

    fn lost_race(&self, kind: EntityKind, name: &str) -> LockerError {
        let owner = match self.entities.get(kind, name) {
            Ok(Some(entity)) => entity.owner,
            Ok(None) => String::new(),
            Err(e) => return e,
        };
        LockerError::OwnershipConflict {
            entity: kind.key(name),
            owner,
        }
    }
}
