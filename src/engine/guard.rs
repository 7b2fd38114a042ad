//! Request validation helpers and the admin bootstrap guard.

use super::response::Rejection;
use crate::credentials::{ADMIN, CredentialStore, Verification};
use crate::error::{LockerError, Result};
use crate::ratelimit::RateDecision;

/// Refuse every mutation until the `admin` user exists, except those made
/// by `admin` itself (so that it can be registered first).
pub fn require_admin_present(credentials: &CredentialStore<'_>, acting_user: &str) -> Result<()> {
    if acting_user == ADMIN || credentials.user_exists(ADMIN)? {
        return Ok(());
    }
    Err(LockerError::AdministrationNotInitialized)
}

/// Verify a user's token; anything but a match is `IllegalCredentials`.
pub fn authenticate(credentials: &CredentialStore<'_>, user: &str, token: &str) -> Result<()> {
    if user.is_empty() || token.is_empty() {
        return Err(LockerError::IllegalCredentials);
    }
    match credentials.verify(user, token)? {
        Verification::Valid => Ok(()),
        Verification::Invalid | Verification::NotFound => Err(LockerError::IllegalCredentials),
    }
}

/// Problems found while validating one request, in the order found.
#[derive(Debug, Default)]
pub struct Checks {
    errors: Vec<LockerError>,
}

impl Checks {
    /// Keep the value of a passing check, record the error of a failing one.
    pub fn check<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    pub fn push(&mut self, error: LockerError) {
        self.errors.push(error);
    }

    pub fn finish(self, rate_limit: Option<RateDecision>) -> std::result::Result<(), Rejection> {
        match Rejection::from_errors(self.errors, rate_limit) {
            Some(rejection) => Err(rejection),
            None => Ok(()),
        }
    }
}
