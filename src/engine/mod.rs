//! The lock engine: request checks in front of the lock state machine.
//!
//! Every mutation runs the same pipeline:
//!
//! 1. rate limiter (a denied request stops here)
//! 2. admin bootstrap guard
//! 3. input validation (type, name, date)
//! 4. credential verification
//! 5. lock state machine
//!
//! Steps 2 to 4 accumulate their problems so a caller sees all of them at
//! once. Credentials are only checked once the guard has passed, so a
//! refused bootstrap request leaves the store untouched apart from its rate
//! counter.

mod guard;
mod machine;
mod request;
mod response;
#[cfg(test)]
mod tests;

pub use guard::{Checks, authenticate, require_admin_present};
pub use machine::{LockMachine, Transition};
pub use request::{ActionRequest, AdminAction, AdminRequest, RegisterRequest};
pub use response::{Accepted, Outcome, Rejection, Response, Snapshot};

use crate::config::Config;
use crate::context::StoreContext;
use crate::credentials::{ADMIN, CredentialStore, HashCost};
use crate::entity::{
    Entity, EntityKind, EntityStore, LastDay, validate_entity_name, validate_username,
};
use crate::error::{LockerError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::ratelimit::{RateDecision, RateLimitConfig, RateLimiter};
use crate::store::{FileStore, KvStore};
use chrono::Local;
use serde_json::json;
use std::sync::Arc;

const OK_ENV_LOCKED: &str = "OK: Environment locked successfully.";
const OK_HOST_LOCKED: &str = "OK: Host has been locked successfully.";
const OK_ENV_UNLOCKED: &str = "OK: Environment unlocked.";
const OK_HOST_UNLOCKED: &str = "OK: Host has been unlocked successfully.";
const OK_USER_PURGED: &str = "OK: User purged.";
const OK_ENV_CREATED: &str = "OK: Environment created.";
const OK_ENV_MAINTENANCE: &str = "OK: Environment is in maintenance mode now.";
const OK_ENV_TERMINATED: &str = "OK: Environment terminated.";

/// Lock engine bound to one shared store.
pub struct Engine {
    store: Arc<dyn KvStore>,
    cost: HashCost,
    rate_limit: RateLimitConfig,
    events: Option<EventLog>,
}

impl Engine {
    pub fn new(store: Arc<dyn KvStore>, config: &Config) -> Self {
        Self {
            store,
            cost: config.hash_cost(),
            rate_limit: config.rate_limit(),
            events: None,
        }
    }

    /// Record committed mutations in `log`.
    pub fn with_events(mut self, log: EventLog) -> Self {
        self.events = Some(log);
        self
    }

    /// Open the engine over an initialized on-disk store. Fails if the store
    /// is unusable.
    pub fn open(ctx: &StoreContext) -> Result<Self> {
        let config_path = ctx.config_path();
        let config = if config_path.exists() {
            Config::load(&config_path)?
        } else {
            Config::default()
        };

        let store = FileStore::open(ctx, &config)?;
        let engine = Self::new(Arc::new(store), &config);

        Ok(if config.audit_log {
            engine.with_events(EventLog::in_store(ctx))
        } else {
            engine
        })
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    pub fn entities(&self) -> EntityStore<'_> {
        EntityStore::new(self.store.as_ref())
    }

    pub fn credentials(&self) -> CredentialStore<'_> {
        CredentialStore::new(self.store.as_ref(), self.cost)
    }

    /// State machine evaluated at the current local time.
    pub fn machine(&self) -> LockMachine<'_> {
        LockMachine::new(self.store.as_ref(), Local::now())
    }

    /// Lock an environment or host until the end of `last_day`.
    pub fn lock(&self, req: &ActionRequest) -> Outcome<Entity> {
        let rate = self.admit(&req.client)?;
        let mut checks = Checks::default();

        let (guard_ok, kind) = self.check_target(&mut checks, req);
        let last_day = checks.check(LastDay::parse(req.last_day.as_deref().unwrap_or("")));
        self.check_user(&mut checks, req, guard_ok);
        checks.finish(rate)?;

        let (Some(kind), Some(last_day)) = (kind, last_day) else {
            return Err(Rejection::new(
                LockerError::InputInvalid("incomplete lock request".to_string()),
                rate,
            ));
        };

        let transition = self
            .machine()
            .lock(kind, &req.name, &req.user, last_day)
            .map_err(|e| Rejection::new(e, rate))?;
        let entity = transition
            .current
            .clone()
            .ok_or_else(|| Rejection::new(LockerError::StoreFailure("lock not recorded".into()), rate))?;

        self.audit(
            Event::new(EventAction::Lock)
                .with_actor(req.user.as_str())
                .with_entity(entity.key())
                .with_details(json!({
                    "lastday": last_day.to_string(),
                    "parent": entity.parent,
                    "previous_owner": transition.previous.as_ref().and_then(|e| e.owner()),
                })),
        );

        let message = match kind {
            EntityKind::Environment => OK_ENV_LOCKED,
            EntityKind::Host => OK_HOST_LOCKED,
        };
        Ok(accepted(200, message, entity, rate))
    }

    /// Release an environment or host. The value is the record left behind,
    /// if any.
    pub fn unlock(&self, req: &ActionRequest) -> Outcome<Option<Entity>> {
        let rate = self.admit(&req.client)?;
        let mut checks = Checks::default();

        let (guard_ok, kind) = self.check_target(&mut checks, req);
        self.check_user(&mut checks, req, guard_ok);
        checks.finish(rate)?;

        let Some(kind) = kind else {
            return Err(Rejection::new(
                LockerError::InputInvalid("incomplete unlock request".to_string()),
                rate,
            ));
        };

        let transition = self
            .machine()
            .unlock(kind, &req.name, &req.user)
            .map_err(|e| Rejection::new(e, rate))?;

        if transition.changed() {
            self.audit(
                Event::new(EventAction::Unlock)
                    .with_actor(req.user.as_str())
                    .with_entity(kind.key(&req.name))
                    .with_details(json!({
                        "previous_owner": transition.previous.as_ref().and_then(|e| e.owner()),
                    })),
            );
        }

        let message = match kind {
            EntityKind::Environment => OK_ENV_UNLOCKED,
            EntityKind::Host => OK_HOST_UNLOCKED,
        };
        Ok(accepted(200, message, transition.current, rate))
    }

    /// Create a user. Registering `admin` is allowed before any other user
    /// exists; everything else waits for it.
    pub fn register(&self, req: &RegisterRequest) -> Outcome<()> {
        let rate = self.admit(&req.client)?;
        let credentials = self.credentials();
        let mut checks = Checks::default();

        checks.check(require_admin_present(&credentials, &req.user));
        let user_ok = checks.check(validate_username(&req.user)).is_some();
        if req.token.is_empty() {
            checks.push(LockerError::InputInvalid(
                "no 'token' parameter specified".to_string(),
            ));
        }
        if user_ok && checks.check(credentials.user_exists(&req.user)) == Some(true) {
            checks.push(LockerError::UserExists(req.user.clone()));
        }
        checks.finish(rate)?;

        credentials
            .register(&req.user, &req.token)
            .map_err(|e| Rejection::new(e, rate))?;

        self.audit(Event::new(EventAction::Register).with_actor(req.user.as_str()));

        let message = format!("OK: User '{}' created.", req.user);
        Ok(accepted(201, &message, (), rate))
    }

    /// Run an administrative action authorized by the `admin` token.
    pub fn admin(&self, req: &AdminRequest) -> Outcome<Option<Entity>> {
        let rate = self.admit(&req.client)?;
        let mut checks = Checks::default();

        let authorized = checks
            .check(authenticate(&self.credentials(), ADMIN, &req.token))
            .is_some();
        let action = checks.check(req.action.parse::<AdminAction>());
        if let Some(action) = action {
            checks.check(validate_admin_target(action, &req.name));
        }
        checks.finish(rate)?;

        let (true, Some(action)) = (authorized, action) else {
            return Err(Rejection::new(LockerError::IllegalCredentials, rate));
        };

        let (message, current) = self
            .run_admin(action, &req.name)
            .map_err(|e| Rejection::new(e, rate))?;

        Ok(accepted(200, message, current, rate))
    }

    fn run_admin(&self, action: AdminAction, name: &str) -> Result<(&'static str, Option<Entity>)> {
        let machine = self.machine();
        let (message, event, transition) = match action {
            AdminAction::UserPurge => {
                self.credentials().purge(name)?;
                self.audit(
                    Event::new(EventAction::UserPurge)
                        .with_actor(ADMIN)
                        .with_details(json!({ "user": name })),
                );
                return Ok((OK_USER_PURGED, None));
            }
            AdminAction::EnvCreate => (
                OK_ENV_CREATED,
                EventAction::EnvCreate,
                machine.create_environment(name)?,
            ),
            AdminAction::EnvUnlock => (
                OK_ENV_UNLOCKED,
                EventAction::EnvUnlock,
                machine.unlock_environment(name, ADMIN)?,
            ),
            AdminAction::EnvMaintenance => (
                OK_ENV_MAINTENANCE,
                EventAction::EnvMaintenance,
                machine.set_environment_maintenance(name)?,
            ),
            AdminAction::EnvTerminate => (
                OK_ENV_TERMINATED,
                EventAction::EnvTerminate,
                machine.terminate_environment(name)?,
            ),
            AdminAction::HostUnlock => (
                OK_HOST_UNLOCKED,
                EventAction::HostUnlock,
                machine.unlock_host(name, ADMIN)?,
            ),
        };

        let kind = match action {
            AdminAction::HostUnlock => EntityKind::Host,
            _ => EntityKind::Environment,
        };
        if transition.changed() {
            self.audit(
                Event::new(event)
                    .with_actor(ADMIN)
                    .with_entity(kind.key(name))
                    .with_details(json!({
                        "previous_state": transition.previous.as_ref().map(|e| e.state.as_str()),
                        "previous_owner": transition.previous.as_ref().and_then(|e| e.owner()),
                    })),
            );
        }

        Ok((message, transition.current))
    }

    /// Count the request against its client's quota.
    fn admit(&self, client: &str) -> std::result::Result<Option<RateDecision>, Rejection> {
        let decision = RateLimiter::new(self.store.as_ref(), self.rate_limit)
            .allow(client)
            .map_err(|e| Rejection::new(e, None))?;

        if !decision.allowed {
            return Err(Rejection::new(decision.error(), Some(decision)));
        }
        Ok(Some(decision))
    }

    /// Bootstrap guard, type and name checks shared by lock and unlock.
    /// Returns whether the guard passed and the parsed type.
    fn check_target(&self, checks: &mut Checks, req: &ActionRequest) -> (bool, Option<EntityKind>) {
        let guard_ok = checks
            .check(require_admin_present(&self.credentials(), &req.user))
            .is_some();

        let kind = checks.check(req.kind.parse::<EntityKind>());
        checks.check(validate_entity_name(
            kind.unwrap_or(EntityKind::Environment),
            &req.name,
        ));

        (guard_ok, kind)
    }

    /// Credential check, skipped while the bootstrap guard refuses.
    fn check_user(&self, checks: &mut Checks, req: &ActionRequest, guard_ok: bool) {
        if guard_ok && checks.check(validate_username(&req.user)).is_some() {
            checks.check(authenticate(&self.credentials(), &req.user, &req.token));
        }
    }

    fn audit(&self, event: Event) {
        if let Some(log) = &self.events {
            log.record(&event);
        }
    }
}

fn validate_admin_target(action: AdminAction, name: &str) -> Result<()> {
    match action {
        AdminAction::UserPurge => {
            validate_username(name)?;
            if name == ADMIN {
                return Err(LockerError::InputInvalid(
                    "the 'admin' user cannot be purged".to_string(),
                ));
            }
            Ok(())
        }
        AdminAction::HostUnlock => validate_entity_name(EntityKind::Host, name),
        _ => validate_entity_name(EntityKind::Environment, name),
    }
}

fn accepted<T>(status: u16, message: &str, value: T, rate_limit: Option<RateDecision>) -> Accepted<T> {
    Accepted {
        status,
        message: message.to_string(),
        value,
        rate_limit,
    }
}
