//! Implementation of the `nodelocker init` command.
//!
//! # What `nodelocker init` does
//!
//! 1. Resolves the store directory (`--store`, `$NODELOCKER_HOME`, `./.nodelocker`)
//! 2. Creates `data/`, `locks/` and `events/` under it
//! 3. Creates `config.yaml` with default settings (if missing)
//! 4. Opens the store once to verify that it is usable
//! 5. Records an `init` event in the audit log
//!
//! The command is idempotent: an existing configuration and existing records
//! are left untouched.

use crate::config::Config;
use crate::context::StoreContext;
use crate::error::{LockerError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::fs::atomic_write;
use crate::store::{FileStore, KvStore};
use serde_json::json;
use std::fs;
use std::path::Path;

/// Execute the `nodelocker init` command.
pub fn cmd_init(store: Option<&Path>) -> Result<()> {
    let ctx = StoreContext::resolve(store)?;
    let config_created = init_store(&ctx)?;

    println!("Initialized nodelocker store.");
    println!();
    println!("Store:  {}", ctx.root.display());
    println!(
        "Config: {}{}",
        ctx.config_path().display(),
        if config_created { "" } else { " (existing)" }
    );
    println!();
    println!("Register the administrator first:");
    println!("  nodelocker register --user admin --token <TOKEN>");

    Ok(())
}

/// Create the store layout. Returns whether a new config file was written.
fn init_store(ctx: &StoreContext) -> Result<bool> {
    for dir in [&ctx.root, &ctx.data_dir, &ctx.locks_dir, &ctx.events_dir] {
        fs::create_dir_all(dir).map_err(|e| {
            LockerError::store(&format!("failed to create '{}'", dir.display()), e)
        })?;
    }

    let config_path = ctx.config_path();
    let config_created = !config_path.exists();
    let config = if config_created {
        let config = Config::default();
        atomic_write(&config_path, config.to_yaml()?.as_bytes())?;
        config
    } else {
        Config::load(&config_path)?
    };

    FileStore::open(ctx, &config)?.ping()?;

    if config.audit_log {
        EventLog::in_store(ctx).record(&Event::new(EventAction::Init).with_details(json!({
            "store": ctx.root.display().to_string(),
            "config_created": config_created,
        })));
    }

    Ok(config_created)
}
