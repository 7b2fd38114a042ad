//! Implementation of the `nodelocker admin` command.

use super::{report, resolve_client};
use crate::cli::AdminArgs;
use crate::context::require_initialized_store;
use crate::engine::{AdminRequest, Engine};
use crate::error::Result;
use std::path::Path;

/// Execute the `nodelocker admin <action>` command.
pub fn cmd_admin(store: Option<&Path>, args: AdminArgs) -> Result<()> {
    let ctx = require_initialized_store(store)?;
    let engine = Engine::open(&ctx)?;

    let req = AdminRequest {
        action: args.action,
        name: args.name.unwrap_or_default(),
        token: args.token.unwrap_or_default(),
        client: resolve_client(args.client),
    };
    report(engine.admin(&req))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::LockStatus;
    use crate::error::LockerError;
    use crate::test_support::{ADMIN_TOKEN, create_test_store, register};

    fn args(action: &str, name: &str, token: &str) -> AdminArgs {
        AdminArgs {
            action: action.to_string(),
            name: Some(name.to_string()),
            token: Some(token.to_string()),
            client: None,
        }
    }

    #[test]
    fn create_then_maintenance() {
        let (_temp, ctx) = create_test_store();
        register(&Engine::open(&ctx).unwrap(), "admin", ADMIN_TOKEN);

        cmd_admin(Some(&ctx.root), args("env-create", "prod", ADMIN_TOKEN)).unwrap();
        cmd_admin(Some(&ctx.root), args("env-maintenance", "prod", ADMIN_TOKEN)).unwrap();

        let engine = Engine::open(&ctx).unwrap();
        assert_eq!(
            engine.machine().environment_lock_status("prod").unwrap(),
            LockStatus::Maintenance
        );
    }

    #[test]
    fn wrong_token_is_refused() {
        let (_temp, ctx) = create_test_store();
        register(&Engine::open(&ctx).unwrap(), "admin", ADMIN_TOKEN);

        let err = cmd_admin(Some(&ctx.root), args("env-create", "prod", "nope")).unwrap_err();
        assert_eq!(err, LockerError::IllegalCredentials);
    }
}
