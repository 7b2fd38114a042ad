//! Implementation of the `nodelocker register` command.

use super::{report, resolve_client};
use crate::cli::RegisterArgs;
use crate::context::require_initialized_store;
use crate::engine::{Engine, RegisterRequest};
use crate::error::Result;
use std::path::Path;

/// Execute the `nodelocker register` command.
pub fn cmd_register(store: Option<&Path>, args: RegisterArgs) -> Result<()> {
    let ctx = require_initialized_store(store)?;
    let engine = Engine::open(&ctx)?;

    let req = RegisterRequest {
        user: args.user.unwrap_or_default(),
        token: args.token.unwrap_or_default(),
        client: resolve_client(args.client),
    };
    report(engine.register(&req))
}
