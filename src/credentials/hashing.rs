//! Password hash schemes.
//!
//! Current hashes are Argon2id PHC strings (`$argon2id$v=19$m=...`). The
//! deprecated scheme is a single SHA-1 over fixed pre/post salts, stored as 40
//! lowercase hex digits, optionally behind a `sha1$` marker.
//!
//! Any other stored value, bcrypt (`$2a$`, `$2b$`, `$2y$`) included, is an
//! unsupported scheme: it never verifies and is never upgraded. Such users
//! must be purged and registered again.

use crate::error::{LockerError, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use sha1::{Digest, Sha1};

/// Version marker of the current scheme.
pub const CURRENT_SCHEME_PREFIX: &str = "$argon2";

const LEGACY_PREFIX: &str = "sha1$";
const LEGACY_PRE_SALT: &str = "68947b1f416c3a5655e1ff9e7c7935f6";
const LEGACY_POST_SALT: &str = "5f09dd9c81596ea3cc93ce0df58e26d8";

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl HashCost {
    fn hasher(&self) -> Result<Argon2<'static>> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| LockerError::InputInvalid(format!("invalid hash cost: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hash a password with the current scheme and a fresh random salt.
pub fn hash_password(password: &str, cost: &HashCost) -> Result<String> {
    let salt = SaltString::generate(&mut rand_core::OsRng);
    cost.hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| LockerError::store("failed to hash password", e))
}

/// Scheme a stored hash was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Argon2,
    LegacySha1,
    Unsupported,
}

impl Scheme {
    pub fn of(stored: &str) -> Self {
        if stored.starts_with(CURRENT_SCHEME_PREFIX) {
            return Scheme::Argon2;
        }
        let digest = stored.strip_prefix(LEGACY_PREFIX).unwrap_or(stored);
        if digest.len() == 40 && digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            Scheme::LegacySha1
        } else {
            Scheme::Unsupported
        }
    }
}

/// Check a password against a stored hash of a supported scheme.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match Scheme::of(stored) {
        Scheme::Argon2 => {
            let Ok(parsed) = PasswordHash::new(stored) else {
                return false;
            };
            // Cost parameters are read from the hash itself.
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        }
        Scheme::LegacySha1 => {
            let digest = stored.strip_prefix(LEGACY_PREFIX).unwrap_or(stored);
            legacy_digest(password).eq_ignore_ascii_case(digest)
        }
        Scheme::Unsupported => false,
    }
}

/// Whether a stored hash uses the deprecated scheme that is re-hashed on a
/// successful verify.
pub fn needs_upgrade(stored: &str) -> bool {
    Scheme::of(stored) == Scheme::LegacySha1
}

fn legacy_digest(password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(LEGACY_PRE_SALT.as_bytes());
    hasher.update(password.as_bytes());
    hasher.update(LEGACY_POST_SALT.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash in the deprecated scheme, as older deployments stored it.
#[cfg(test)]
pub(crate) fn legacy_hash(password: &str) -> String {
    legacy_digest(password)
}
