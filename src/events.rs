//! Audit log for nodelocker.
//!
//! Every committed mutation appends one event to an append-only NDJSON file
//! (one JSON object per line) at `<store>/events/events.ndjson`, so that lock
//! history can be reconstructed across all machines sharing the store.
//!
//! # Event Format
//!
//! Each event is a JSON object with the following fields:
//! - `ts`: RFC3339 timestamp
//! - `action`: The action performed (lock, unlock, register, env_terminate, ...)
//! - `actor`: The acting user, or `user@HOST` for local maintenance
//! - `entity`: Optional entity key (`env:prod`, `host:prod-db-1`)
//! - `details`: Freeform object with action-specific details
//!
//! # Usage
//!
//! Events are appended after the store write they describe has committed.
//! A failed append is reported as a warning and never undoes the mutation.
//!
//! ```no_run
//! use nodelocker::context::StoreContext;
//! use nodelocker::events::{Event, EventAction, EventLog};
//! use serde_json::json;
//!
//! let ctx = StoreContext::resolve(None)?;
//! let log = EventLog::in_store(&ctx);
//! let event = Event::new(EventAction::Lock)
//!     .with_actor("alice")
//!     .with_entity("env:prod")
//!     .with_details(json!({"lastday": "20991231"}));
//! log.append(&event)?;
//! # Ok::<(), nodelocker::error::LockerError>(())
//! ```

use crate::context::StoreContext;
use crate::error::{LockerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const EVENTS_FILE: &str = "events.ndjson";

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Store initialization
    Init,
    /// Entity locked by a user
    Lock,
    /// Entity released by a user
    Unlock,
    /// New credential registered
    Register,
    /// Credential removed by the administrator
    UserPurge,
    /// Environment created in the unlocked state
    EnvCreate,
    /// Environment released by the administrator
    EnvUnlock,
    /// Environment put into maintenance
    EnvMaintenance,
    /// Environment terminated
    EnvTerminate,
    /// Stuck host released by the administrator
    HostUnlock,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Init => write!(f, "init"),
            EventAction::Lock => write!(f, "lock"),
            EventAction::Unlock => write!(f, "unlock"),
            EventAction::Register => write!(f, "register"),
            EventAction::UserPurge => write!(f, "user_purge"),
            EventAction::EnvCreate => write!(f, "env_create"),
            EventAction::EnvUnlock => write!(f, "env_unlock"),
            EventAction::EnvMaintenance => write!(f, "env_maintenance"),
            EventAction::EnvTerminate => write!(f, "env_terminate"),
            EventAction::HostUnlock => write!(f, "host_unlock"),
        }
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: EventAction,

    /// Who performed the action.
    pub actor: String,

    /// Entity key the action applied to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    /// Create a new event with the given action.
    ///
    /// The actor defaults to the local `USER@HOSTNAME`; request-driven events
    /// replace it with the acting user via [`Event::with_actor`].
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: local_actor(),
            entity: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn with_entity(mut self, key: impl Into<String>) -> Self {
        self.entity = Some(key.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| LockerError::store("failed to serialize event", e))
    }
}

/// `USER@HOSTNAME` of the current process.
pub(crate) fn local_actor() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Append-only NDJSON event file.
#[derive(Debug, Clone)]
pub struct EventLog {
    dir: PathBuf,
}

impl EventLog {
    /// The audit log of a store.
    pub fn in_store(ctx: &StoreContext) -> Self {
        Self {
            dir: ctx.events_dir.clone(),
        }
    }

    /// Path to the events file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(EVENTS_FILE)
    }

    /// Append an event as a single JSON line, creating the file and its
    /// directory if needed.
    pub fn append(&self, event: &Event) -> Result<()> {
        let json_line = event.to_ndjson_line()?;
        let events_file = self.path();

        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| {
                LockerError::store(
                    &format!("failed to create events directory '{}'", self.dir.display()),
                    e,
                )
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&events_file)
            .map_err(|e| open_error(&events_file, e))?;

        writeln!(file, "{}", json_line).map_err(|e| {
            LockerError::store(
                &format!("failed to write event to '{}'", events_file.display()),
                e,
            )
        })?;

        file.sync_all().map_err(|e| {
            LockerError::store(
                &format!("failed to sync events file '{}'", events_file.display()),
                e,
            )
        })
    }

    /// Append an event for a mutation that has already committed. Failure
    /// is reported on stderr only.
    pub fn record(&self, event: &Event) {
        if let Err(e) = self.append(event) {
            eprintln!(
                "Warning: failed to record '{}' event in audit log: {}",
                event.action, e
            );
        }
    }
}

fn open_error(path: &Path, e: std::io::Error) -> LockerError {
    LockerError::store(
        &format!("failed to open events file '{}'", path.display()),
        e,
    )
}
