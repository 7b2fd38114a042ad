//! Exit code constants for the nodelocker CLI.
//!
//! - 0: Success
//! - 1: User error (bad input, unknown or duplicate user)
//! - 2: Authentication failure (bad credentials, no admin registered yet)
//! - 3: Lock refusal (ownership, hierarchy, or unavailable environment)
//! - 4: Store failure
//! - 5: Rate limited

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: malformed type, name, date, or user record problems.
pub const USER_ERROR: i32 = 1;

/// Authentication failure: illegal credentials or uninitialized administration.
pub const AUTH_FAILURE: i32 = 2;

/// Lock refusal: the entity is owned elsewhere or its hierarchy blocks the lock.
pub const LOCK_FAILURE: i32 = 3;

/// Store failure: the shared store could not complete an operation.
pub const STORE_FAILURE: i32 = 4;

/// Too many requests from the same client within the rate window.
pub const RATE_LIMITED: i32 = 5;
