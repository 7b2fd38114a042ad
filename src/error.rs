//! Error types for nodelocker.
//!
//! Uses thiserror for derive macros. Every variant carries a stable
//! HTTP-status-equivalent code for the request boundary and an exit code
//! for the CLI.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for lock engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockerError {
    /// Malformed type, name, date, user or action.
    #[error("{0}")]
    InputInvalid(String),

    /// No `admin` user has been registered yet.
    #[error("no 'admin' user present, cannot continue")]
    AdministrationNotInitialized,

    /// Unknown user or wrong token.
    #[error("illegal user or token")]
    IllegalCredentials,

    /// The entity is locked by somebody else.
    #[error("'{entity}' is owned by '{owner}'")]
    OwnershipConflict { entity: String, owner: String },

    /// A host lock was refused because of its parent environment.
    #[error("parent environment '{parent}' is {status}, cannot lock host")]
    ParentUnavailable { parent: String, status: String },

    /// An environment lock was refused because hosts under it are locked.
    #[error("environment '{environment}' has locked hosts: {}", hosts.join(", "))]
    HostsLocked {
        environment: String,
        hosts: Vec<String>,
    },

    /// The environment is in maintenance or terminated.
    #[error("'{entity}' is {state}")]
    EntityUnavailable { entity: String, state: String },

    /// Registration of a name that is already taken.
    #[error("user '{0}' already exists")]
    UserExists(String),

    /// The named user has no credential record.
    #[error("user '{0}' not found")]
    UserNotFound(String),

    /// The shared store failed to complete an operation.
    #[error("store operation failed: {0}")]
    StoreFailure(String),

    /// The client exceeded its request quota.
    #[error("rate limit exceeded ({limit} requests per window)")]
    RateLimited { limit: u32 },
}

impl LockerError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockerError::InputInvalid(_)
            | LockerError::UserExists(_)
            | LockerError::UserNotFound(_) => exit_codes::USER_ERROR,
            LockerError::AdministrationNotInitialized | LockerError::IllegalCredentials => {
                exit_codes::AUTH_FAILURE
            }
            LockerError::OwnershipConflict { .. }
            | LockerError::ParentUnavailable { .. }
            | LockerError::HostsLocked { .. }
            | LockerError::EntityUnavailable { .. } => exit_codes::LOCK_FAILURE,
            LockerError::StoreFailure(_) => exit_codes::STORE_FAILURE,
            LockerError::RateLimited { .. } => exit_codes::RATE_LIMITED,
        }
    }

    /// Returns the HTTP status this error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            LockerError::InputInvalid(_) => 400,
            LockerError::AdministrationNotInitialized => 423,
            LockerError::IllegalCredentials
            | LockerError::OwnershipConflict { .. }
            | LockerError::ParentUnavailable { .. }
            | LockerError::HostsLocked { .. }
            | LockerError::EntityUnavailable { .. }
            | LockerError::UserExists(_) => 403,
            LockerError::UserNotFound(_) => 404,
            LockerError::StoreFailure(_) => 500,
            LockerError::RateLimited { .. } => 429,
        }
    }

    pub(crate) fn store(context: &str, err: impl std::fmt::Display) -> Self {
        LockerError::StoreFailure(format!("{}: {}", context, err))
    }
}

/// Result type alias for nodelocker operations.
pub type Result<T> = std::result::Result<T, LockerError>;
