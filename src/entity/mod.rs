//! Entity model for nodelocker.
//!
//! Two kinds of lockable entity exist: environments and the hosts that belong
//! to them. Each entity is one hash record in the shared store under the key
//! `{type}:{name}`:
//!
//! ```text
//! env:prod        state=locked   parent=n/a   user=alice  lastday=20991231
//! host:prod-db-1  state=locked   parent=prod  user=bob    lastday=20991130
//! ```
//!
//! An absent record is the unlocked state. A host's parent environment is
//! derived from its name (see [`derive_parent`]).

mod date;
mod naming;
mod store;

pub use date::{LastDay, is_valid_date};
pub use naming::{derive_parent, validate_entity_name, validate_username};
pub use store::EntityStore;

use crate::error::{LockerError, Result};
use crate::store::Fields;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parent value stored on environment records.
pub const NO_PARENT: &str = "n/a";

pub(crate) const FIELD_STATE: &str = "state";
pub(crate) const FIELD_PARENT: &str = "parent";
pub(crate) const FIELD_USER: &str = "user";
pub(crate) const FIELD_LASTDAY: &str = "lastday";

/// Kind of lockable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "env")]
    Environment,
    #[serde(rename = "host")]
    Host,
}

impl EntityKind {
    /// Wire and key form: `env` or `host`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Environment => "env",
            EntityKind::Host => "host",
        }
    }

    /// Key prefix shared by every record of this kind.
    pub fn prefix(&self) -> String {
        format!("{}:", self.as_str())
    }

    /// Store key of the named entity.
    pub fn key(&self, name: &str) -> String {
        format!("{}:{}", self.as_str(), name)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = LockerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "env" => Ok(EntityKind::Environment),
            "host" => Ok(EntityKind::Host),
            "" => Err(LockerError::InputInvalid(
                "no 'type' parameter specified".to_string(),
            )),
            _ => Err(LockerError::InputInvalid(format!(
                "wrong 'type' specified ('{}'), must be 'env' or 'host'",
                s
            ))),
        }
    }
}

/// Stored state of an entity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityState {
    Unlocked,
    Locked,
    Maintenance,
    Terminated,
}

impl EntityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityState::Unlocked => "unlocked",
            EntityState::Locked => "locked",
            EntityState::Maintenance => "maintenance",
            EntityState::Terminated => "terminated",
        }
    }

    /// Parse a stored state value. Older records use `valid`, `maint` and
    /// `termnd`.
    pub fn from_stored(value: &str) -> Option<Self> {
        match value {
            "unlocked" | "valid" => Some(EntityState::Unlocked),
            "locked" => Some(EntityState::Locked),
            "maintenance" | "maint" => Some(EntityState::Maintenance),
            "terminated" | "termnd" => Some(EntityState::Terminated),
            _ => None,
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an environment as seen by the host hierarchy rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    /// No record exists.
    Absent,
    Unlocked,
    Locked,
    Maintenance,
    Terminated,
}

impl LockStatus {
    pub fn of(entity: Option<&Entity>) -> Self {
        match entity.map(|e| e.state) {
            None => LockStatus::Absent,
            Some(EntityState::Unlocked) => LockStatus::Unlocked,
            Some(EntityState::Locked) => LockStatus::Locked,
            Some(EntityState::Maintenance) => LockStatus::Maintenance,
            Some(EntityState::Terminated) => LockStatus::Terminated,
        }
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LockStatus::Absent => "absent",
            LockStatus::Unlocked => "unlocked",
            LockStatus::Locked => "locked",
            LockStatus::Maintenance => "maintenance",
            LockStatus::Terminated => "terminated",
        })
    }
}

/// One environment or host record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: EntityKind,

    pub name: String,

    pub state: EntityState,

    /// Current holder; empty when nobody holds the entity.
    #[serde(rename = "user")]
    pub owner: String,

    /// Parent environment for hosts, [`NO_PARENT`] for environments.
    pub parent: String,

    /// Inclusive last day of the lock.
    #[serde(rename = "lastday", skip_serializing_if = "Option::is_none")]
    pub last_day: Option<LastDay>,
}

impl Entity {
    /// A locked record held by `owner` through `last_day`.
    pub fn locked(kind: EntityKind, name: &str, owner: &str, last_day: LastDay) -> Self {
        let parent = match kind {
            EntityKind::Environment => NO_PARENT,
            EntityKind::Host => derive_parent(name),
        };
        Self {
            kind,
            name: name.to_string(),
            state: EntityState::Locked,
            owner: owner.to_string(),
            parent: parent.to_string(),
            last_day: Some(last_day),
        }
    }

    /// An environment record set by an administrative transition.
    pub fn environment(name: &str, state: EntityState, owner: &str) -> Self {
        Self {
            kind: EntityKind::Environment,
            name: name.to_string(),
            state,
            owner: owner.to_string(),
            parent: NO_PARENT.to_string(),
            last_day: None,
        }
    }

    pub fn key(&self) -> String {
        self.kind.key(&self.name)
    }

    /// The holder, if any.
    pub fn owner(&self) -> Option<&str> {
        (!self.owner.is_empty()).then_some(self.owner.as_str())
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(FIELD_STATE.to_string(), self.state.as_str().to_string());
        fields.insert(FIELD_PARENT.to_string(), self.parent.clone());
        fields.insert(FIELD_USER.to_string(), self.owner.clone());
        if let Some(day) = self.last_day {
            fields.insert(FIELD_LASTDAY.to_string(), day.to_string());
        }
        fields
    }

    /// Rebuild a record from its stored fields.
    ///
    /// A record that cannot be interpreted is a store failure, never an
    /// absent entity.
    pub fn from_fields(kind: EntityKind, name: &str, fields: &Fields) -> Result<Self> {
        let key = kind.key(name);
        let malformed = |what: &str| LockerError::StoreFailure(format!("record '{}' has {}", key, what));

        let state = match fields.get(FIELD_STATE) {
            Some(value) => EntityState::from_stored(value)
                .ok_or_else(|| malformed(&format!("unknown state '{}'", value)))?,
            None => return Err(malformed("no state")),
        };

        let last_day = match fields.get(FIELD_LASTDAY).map(String::as_str) {
            None | Some("") => None,
            Some(value) => Some(
                LastDay::parse(value)
                    .map_err(|_| malformed(&format!("invalid lastday '{}'", value)))?,
            ),
        };

        let parent = match fields.get(FIELD_PARENT) {
            Some(parent) if !parent.is_empty() => parent.clone(),
            _ => match kind {
                EntityKind::Environment => NO_PARENT.to_string(),
                EntityKind::Host => derive_parent(name).to_string(),
            },
        };

        Ok(Self {
            kind,
            name: name.to_string(),
            state,
            owner: fields.get(FIELD_USER).cloned().unwrap_or_default(),
            parent,
            last_day,
        })
    }
}
