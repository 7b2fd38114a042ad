use super::hashing::{HashCost, hash_password, needs_upgrade, verify_password};
use super::{CREDENTIALS_KEY, Verification};
use crate::error::{LockerError, Result};
use crate::store::{Fields, KvStore, Precondition};

/// Credential records in the shared store: one field per user in the
/// `user` hash.
#[derive(Clone, Copy)]
pub struct CredentialStore<'a> {
    kv: &'a dyn KvStore,
    cost: HashCost,
}

impl<'a> CredentialStore<'a> {
    pub fn new(kv: &'a dyn KvStore, cost: HashCost) -> Self {
        Self { kv, cost }
    }

    /// Create a credential. Fails with `UserExists` if the name is taken.
    pub fn register(&self, user: &str, password: &str) -> Result<()> {
        let hash = hash_password(password, &self.cost)?;
        if !self.kv.hset_nx(CREDENTIALS_KEY, user, &hash)? {
            return Err(LockerError::UserExists(user.to_string()));
        }
        Ok(())
    }

    /// Check a password. A valid password stored under a deprecated scheme
    /// is re-hashed with the current one; failing to store the new hash does
    /// not change the result.
    ///
    /// The new hash only replaces the exact value that was verified, so a
    /// concurrent purge or re-registration is never overwritten.
    pub fn verify(&self, user: &str, password: &str) -> Result<Verification> {
        let Some(stored) = self.kv.hget(CREDENTIALS_KEY, user)? else {
            return Ok(Verification::NotFound);
        };

        if !verify_password(password, &stored) {
            return Ok(Verification::Invalid);
        }

        if needs_upgrade(&stored)
            && let Err(e) = self.upgrade(user, password, &stored)
        {
            eprintln!(
                "Warning: failed to upgrade password hash for '{}': {}",
                user, e
            );
        }

        Ok(Verification::Valid)
    }

    /// Returns whether the new hash was stored.
    fn upgrade(&self, user: &str, password: &str, stored: &str) -> Result<bool> {
        let hash = hash_password(password, &self.cost)?;
        self.kv.hset_if(
            CREDENTIALS_KEY,
            &Fields::from([(user.to_string(), hash)]),
            &Precondition::FieldEquals {
                field: user,
                expected: Some(stored),
            },
        )
    }

    pub fn user_exists(&self, user: &str) -> Result<bool> {
        Ok(self.kv.hget(CREDENTIALS_KEY, user)?.is_some())
    }

    /// Remove a credential.
    pub fn purge(&self, user: &str) -> Result<()> {
        if !self.kv.hdel(CREDENTIALS_KEY, user)? {
            return Err(LockerError::UserNotFound(user.to_string()));
        }
        Ok(())
    }
}
