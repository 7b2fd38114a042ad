//! Store location resolution for nodelocker.
//!
//! Every command locates the shared store through this module, so that lock
//! records, credentials, rate counters and the audit log always land in the
//! same directory no matter where the command is invoked from.
//!
//! Resolution order: explicit `--store` path, then `NODELOCKER_HOME`, then
//! `./.nodelocker` relative to the working directory.

use crate::error::{LockerError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming the store directory.
pub const STORE_ENV_VAR: &str = "NODELOCKER_HOME";

/// Default store directory relative to the working directory.
pub const DEFAULT_STORE_DIR: &str = ".nodelocker";

/// Resolved paths for a nodelocker store. All paths are absolute.
#[derive(Debug, Clone)]
pub struct StoreContext {
    /// Root directory of the store.
    pub root: PathBuf,

    /// One JSON document per key lives here.
    pub data_dir: PathBuf,

    /// Per-key lock files.
    pub locks_dir: PathBuf,

    /// Audit log directory.
    pub events_dir: PathBuf,
}

impl StoreContext {
    /// Resolve the store from an optional explicit path, the environment,
    /// or the current working directory.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::at(path);
        }

        if let Ok(home) = env::var(STORE_ENV_VAR)
            && !home.trim().is_empty()
        {
            return Self::at(home.trim());
        }

        let cwd = env::current_dir().map_err(|e| {
            LockerError::InputInvalid(format!("failed to get current working directory: {}", e))
        })?;

        Self::at(cwd.join(DEFAULT_STORE_DIR))
    }

    /// Build the context for a specific store root.
    pub fn at<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            env::current_dir()
                .map_err(|e| {
                    LockerError::InputInvalid(format!(
                        "failed to get current working directory: {}",
                        e
                    ))
                })?
                .join(root)
        };

        Ok(Self {
            data_dir: root.join("data"),
            locks_dir: root.join("locks"),
            events_dir: root.join("events"),
            root,
        })
    }

    /// Path to the store configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    /// Whether `init` has been run for this store.
    pub fn is_initialized(&self) -> bool {
        self.data_dir.is_dir() && self.locks_dir.is_dir()
    }
}

/// Resolve the store and require that it has been initialized.
///
/// An unusable store is fatal for every command except `init`.
pub fn require_initialized_store(explicit: Option<&Path>) -> Result<StoreContext> {
    let ctx = StoreContext::resolve(explicit)?;

    if !ctx.is_initialized() {
        return Err(LockerError::StoreFailure(format!(
            "no store found at '{}'. Run `nodelocker init` first.",
            ctx.root.display()
        )));
    }

    Ok(ctx)
}
