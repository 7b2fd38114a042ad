//! Per-call request values.
//!
//! Each request carries everything one engine call needs; nothing about a
//! request outlives the call or is shared between calls. Fields are kept as
//! the raw strings the caller supplied so that validation can report every
//! problem at once.

use crate::error::{LockerError, Result};
use std::fmt;
use std::str::FromStr;

/// Lock or unlock of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionRequest {
    /// `env` or `host`.
    pub kind: String,
    pub name: String,
    pub user: String,
    pub token: String,
    /// `YYYYMMDD`; required for lock, ignored for unlock.
    pub last_day: Option<String>,
    /// Rate-limit identity of the caller.
    pub client: String,
}

/// Creation of a new user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterRequest {
    pub user: String,
    pub token: String,
    pub client: String,
}

/// Administrative action, authorized by the `admin` token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminRequest {
    pub action: String,
    /// User name for `user-purge`, entity name otherwise.
    pub name: String,
    pub token: String,
    pub client: String,
}

/// Administrative actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    /// Remove a user that forgot their token.
    UserPurge,
    /// Register an environment in the unlocked state.
    EnvCreate,
    /// Release an environment from any state.
    EnvUnlock,
    EnvMaintenance,
    EnvTerminate,
    /// Release a stuck host.
    HostUnlock,
}

impl AdminAction {
    pub const ALL: [AdminAction; 6] = [
        AdminAction::UserPurge,
        AdminAction::EnvCreate,
        AdminAction::EnvUnlock,
        AdminAction::EnvMaintenance,
        AdminAction::EnvTerminate,
        AdminAction::HostUnlock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::UserPurge => "user-purge",
            AdminAction::EnvCreate => "env-create",
            AdminAction::EnvUnlock => "env-unlock",
            AdminAction::EnvMaintenance => "env-maintenance",
            AdminAction::EnvTerminate => "env-terminate",
            AdminAction::HostUnlock => "host-unlock",
        }
    }
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminAction {
    type Err = LockerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| LockerError::InputInvalid(format!("illegal 'action' parameter '{}'", s)))
    }
}
