//! Implementation of the `nodelocker lock` and `nodelocker unlock` commands.

use super::{report, resolve_client};
use crate::cli::{LockArgs, UnlockArgs};
use crate::context::require_initialized_store;
use crate::engine::{ActionRequest, Engine};
use crate::error::Result;
use std::path::Path;

/// Execute the `nodelocker lock` command.
pub fn cmd_lock(store: Option<&Path>, args: LockArgs) -> Result<()> {
    let ctx = require_initialized_store(store)?;
    let engine = Engine::open(&ctx)?;
    report(engine.lock(&lock_request(args)))
}

/// Execute the `nodelocker unlock` command.
pub fn cmd_unlock(store: Option<&Path>, args: UnlockArgs) -> Result<()> {
    let ctx = require_initialized_store(store)?;
    let engine = Engine::open(&ctx)?;
    report(engine.unlock(&unlock_request(args)))
}

fn lock_request(args: LockArgs) -> ActionRequest {
    ActionRequest {
        kind: args.kind.unwrap_or_default(),
        name: args.name.unwrap_or_default(),
        user: args.user.unwrap_or_default(),
        token: args.token.unwrap_or_default(),
        last_day: args.lastday,
        client: resolve_client(args.client),
    }
}

fn unlock_request(args: UnlockArgs) -> ActionRequest {
    ActionRequest {
        kind: args.kind.unwrap_or_default(),
        name: args.name.unwrap_or_default(),
        user: args.user.unwrap_or_default(),
        token: args.token.unwrap_or_default(),
        last_day: None,
        client: resolve_client(args.client),
    }
}
