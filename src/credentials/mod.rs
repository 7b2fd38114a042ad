//! User credentials for nodelocker.
//!
//! Every acting user authenticates with a token checked against a salted,
//! deliberately slow hash. Hashes written by older deployments use a fast
//! fixed-salt scheme; they still verify and are replaced on first successful
//! use.

mod hashing;
mod store;

pub use hashing::{
    CURRENT_SCHEME_PREFIX, HashCost, Scheme, hash_password, needs_upgrade, verify_password,
};
pub use store::CredentialStore;

#[cfg(test)]
pub(crate) use hashing::legacy_hash;

/// The bootstrap administrator.
pub const ADMIN: &str = "admin";

/// Store key of the credential hash.
pub const CREDENTIALS_KEY: &str = "user";

/// Result of checking a user's token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Invalid,
    NotFound,
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid)
    }
}
