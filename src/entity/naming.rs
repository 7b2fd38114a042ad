//! Entity and user name rules.

use super::EntityKind;
use crate::error::{LockerError, Result};

/// Characters that end the environment prefix of a host name.
pub const PARENT_SEPARATORS: [char; 5] = ['-', '_', '/', '.', '|'];

const MAX_ENTITY_NAME_LEN: usize = 253;
const MAX_USERNAME_LEN: usize = 64;

/// Parent environment of a host: the part of the name before the first
/// separator, or the whole name when it has none.
pub fn derive_parent(host: &str) -> &str {
    match host.find(|c: char| PARENT_SEPARATORS.contains(&c)) {
        Some(index) => &host[..index],
        None => host,
    }
}

pub fn validate_entity_name(kind: EntityKind, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LockerError::InputInvalid(
            "no 'name' parameter specified".to_string(),
        ));
    }

    if name.chars().count() > MAX_ENTITY_NAME_LEN {
        return Err(LockerError::InputInvalid(format!(
            "name is longer than {} characters",
            MAX_ENTITY_NAME_LEN
        )));
    }

    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(LockerError::InputInvalid(format!(
            "name '{}' contains whitespace or control characters",
            name.escape_default()
        )));
    }

    if kind == EntityKind::Host && derive_parent(name).is_empty() {
        return Err(LockerError::InputInvalid(format!(
            "host name '{}' does not start with an environment name",
            name
        )));
    }

    Ok(())
}

pub fn validate_username(user: &str) -> Result<()> {
    if user.is_empty() {
        return Err(LockerError::InputInvalid(
            "no 'user' parameter specified".to_string(),
        ));
    }

    if user.chars().count() > MAX_USERNAME_LEN {
        return Err(LockerError::InputInvalid(format!(
            "user name is longer than {} characters",
            MAX_USERNAME_LEN
        )));
    }

    if user.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(LockerError::InputInvalid(format!(
            "user name '{}' contains whitespace or control characters",
            user.escape_default()
        )));
    }

    Ok(())
}
