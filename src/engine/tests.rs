//! Tests for the engine pipeline and the lock state machine.

use super::*;
use crate::entity::{EntityState, LockStatus};
use crate::store::{MemoryStore, Precondition};
use crate::test_support::{
    ADMIN_TOKEN, CLIENT, FAR_DAY, admin_request, bootstrapped_engine, cheap_config,
    create_test_store, empty_engine, lock_request, register, unlock_request,
};
use chrono::Local;

fn status_of(engine: &Engine, name: &str) -> LockStatus {
    engine.machine().environment_lock_status(name).unwrap()
}

fn primary(outcome_err: Rejection) -> LockerError {
    outcome_err.primary().clone()
}

fn day(value: &str) -> LastDay {
    LastDay::parse(value).unwrap()
}

// ============================================================================
// Locking
// ============================================================================

#[test]
fn test_lock_environment_then_status_is_locked_by_requester() {
    let (engine, _store) = bootstrapped_engine();

    let accepted = engine.lock(&lock_request("env", "prod", "alice")).unwrap();

    assert_eq!(accepted.status, 200);
    assert_eq!(accepted.message, "OK: Environment locked successfully.");
    assert_eq!(accepted.value.owner, "alice");

    let stored = engine
        .entities()
        .get(EntityKind::Environment, "prod")
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, EntityState::Locked);
    assert_eq!(stored.owner, "alice");
    assert_eq!(stored.parent, "n/a");
    assert_eq!(stored.last_day, Some(day(FAR_DAY)));
    assert_eq!(status_of(&engine, "prod"), LockStatus::Locked);
}

#[test]
fn test_lock_sets_store_expiry() {
    let (engine, store) = bootstrapped_engine();
    engine.lock(&lock_request("env", "prod", "alice")).unwrap();

    let ttl = store.ttl("env:prod").unwrap().unwrap();
    assert!(ttl > chrono::Duration::days(365));
}

#[test]
fn test_lock_host_under_created_environment() {
    let (engine, _store) = bootstrapped_engine();
    engine.admin(&admin_request("env-create", "prod")).unwrap();

    let accepted = engine
        .lock(&lock_request("host", "prod-db-1", "bob"))
        .unwrap();

    assert_eq!(accepted.message, "OK: Host has been locked successfully.");
    assert_eq!(accepted.value.parent, "prod");
    assert_eq!(accepted.value.owner, "bob");
}

#[test]
fn test_relock_by_owner_extends() {
    let (engine, _store) = bootstrapped_engine();
    engine.lock(&lock_request("env", "qa", "alice")).unwrap();

    let mut req = lock_request("env", "qa", "alice");
    req.last_day = Some("21000101".to_string());
    let accepted = engine.lock(&req).unwrap();

    assert_eq!(accepted.value.last_day, Some(day("21000101")));
}

#[test]
fn test_ownership_conflict_and_admin_override() {
    let (engine, _store) = bootstrapped_engine();
    engine.lock(&lock_request("env", "prod", "alice")).unwrap();

    let rejection = engine.lock(&lock_request("env", "prod", "bob")).unwrap_err();
    assert_eq!(rejection.status(), 403);
    assert_eq!(
        primary(rejection),
        LockerError::OwnershipConflict {
            entity: "env:prod".to_string(),
            owner: "alice".to_string(),
        }
    );

    let accepted = engine.lock(&lock_request("env", "prod", "admin")).unwrap();
    assert_eq!(accepted.value.owner, "admin");
}

#[test]
fn test_host_ownership_conflict() {
    let (engine, _store) = bootstrapped_engine();
    engine.admin(&admin_request("env-create", "qa")).unwrap();
    engine.lock(&lock_request("host", "qa-1", "alice")).unwrap();

    let err = primary(engine.lock(&lock_request("host", "qa-1", "bob")).unwrap_err());
    assert!(matches!(err, LockerError::OwnershipConflict { .. }));

    assert!(engine.lock(&lock_request("host", "qa-1", "admin")).is_ok());
}

#[test]
fn test_host_lock_blocked_by_parent_state() {
    let (engine, _store) = bootstrapped_engine();

    // Absent parent.
    let err = primary(engine.lock(&lock_request("host", "prod-1", "bob")).unwrap_err());
    assert_eq!(
        err,
        LockerError::ParentUnavailable {
            parent: "prod".to_string(),
            status: "absent".to_string(),
        }
    );

    // Locked parent.
    engine.lock(&lock_request("env", "prod", "alice")).unwrap();
    let err = primary(engine.lock(&lock_request("host", "prod-1", "alice")).unwrap_err());
    assert!(matches!(err, LockerError::ParentUnavailable { ref status, .. } if status == "locked"));

    // Maintenance and terminated parents.
    for (action, state) in [("env-maintenance", "maintenance"), ("env-terminate", "terminated")] {
        engine.admin(&admin_request(action, "prod")).unwrap();
        for host in ["prod-1", "prod_2", "prod.3", "prod/4", "prod|5"] {
            let err = primary(engine.lock(&lock_request("host", host, "bob")).unwrap_err());
            assert_eq!(
                err,
                LockerError::ParentUnavailable {
                    parent: "prod".to_string(),
                    status: state.to_string(),
                }
            );
        }
    }

    assert!(engine.entities().scan_by_kind(EntityKind::Host).unwrap().is_empty());
}

#[test]
fn test_host_without_separator_is_its_own_parent() {
    let (engine, _store) = bootstrapped_engine();
    engine.admin(&admin_request("env-create", "solo")).unwrap();

    let accepted = engine.lock(&lock_request("host", "solo", "bob")).unwrap();
    assert_eq!(accepted.value.parent, "solo");
}

#[test]
fn test_environment_lock_blocked_by_locked_hosts() {
    let (engine, _store) = bootstrapped_engine();
    engine.admin(&admin_request("env-create", "uat")).unwrap();
    engine.lock(&lock_request("host", "uat-2", "bob")).unwrap();
    engine.lock(&lock_request("host", "uat-1", "alice")).unwrap();

    let err = primary(engine.lock(&lock_request("env", "uat", "alice")).unwrap_err());
    assert_eq!(
        err,
        LockerError::HostsLocked {
            environment: "uat".to_string(),
            hosts: vec!["uat-1".to_string(), "uat-2".to_string()],
        }
    );
}

#[test]
fn test_user_cannot_lock_unavailable_environment() {
    let (engine, _store) = bootstrapped_engine();
    engine.admin(&admin_request("env-maintenance", "perf")).unwrap();

    let err = primary(engine.lock(&lock_request("env", "perf", "alice")).unwrap_err());
    assert_eq!(
        err,
        LockerError::EntityUnavailable {
            entity: "env:perf".to_string(),
            state: "maintenance".to_string(),
        }
    );
}

#[test]
fn test_past_lastday_is_rejected() {
    let (engine, _store) = bootstrapped_engine();
    let mut req = lock_request("env", "prod", "alice");
    req.last_day = Some("20000101".to_string());

    let rejection = engine.lock(&req).unwrap_err();
    assert_eq!(rejection.status(), 400);
    assert!(rejection.primary().to_string().contains("in the past"));
    assert!(engine.entities().get(EntityKind::Environment, "prod").unwrap().is_none());
}

#[test]
fn test_validation_problems_accumulate() {
    let (engine, _store) = bootstrapped_engine();
    let req = ActionRequest {
        kind: "vm".to_string(),
        name: String::new(),
        user: "alice".to_string(),
        token: "wrong".to_string(),
        last_day: Some("2025-02-10".to_string()),
        client: CLIENT.to_string(),
    };

    let rejection = engine.lock(&req).unwrap_err();
    let errors = rejection.errors();

    assert_eq!(errors.len(), 4);
    assert!(errors[0].to_string().contains("must be 'env' or 'host'"));
    assert!(errors[1].to_string().contains("no 'name'"));
    assert!(errors[2].to_string().contains("lastday"));
    assert_eq!(errors[3], LockerError::IllegalCredentials);
    assert_eq!(rejection.status(), 400);
}

#[test]
fn test_admin_credentials_are_verified_too() {
    let (engine, _store) = bootstrapped_engine();
    let mut req = lock_request("env", "prod", "admin");
    req.token = "guess".to_string();

    let err = primary(engine.lock(&req).unwrap_err());
    assert_eq!(err, LockerError::IllegalCredentials);
}

// ============================================================================
// Unlocking
// ============================================================================

#[test]
fn test_unlock_absent_entity_is_noop_success() {
    let (engine, _store) = bootstrapped_engine();

    let accepted = engine.unlock(&unlock_request("env", "ghost", "alice")).unwrap();
    assert_eq!(accepted.status, 200);
    assert!(accepted.value.is_none());

    let accepted = engine.unlock(&unlock_request("host", "ghost-1", "alice")).unwrap();
    assert_eq!(accepted.message, "OK: Host has been unlocked successfully.");
}

#[test]
fn test_owner_unlock_deletes_record() {
    let (engine, _store) = bootstrapped_engine();
    engine.lock(&lock_request("env", "prod", "alice")).unwrap();

    let accepted = engine.unlock(&unlock_request("env", "prod", "alice")).unwrap();

    assert!(accepted.value.is_none());
    assert_eq!(status_of(&engine, "prod"), LockStatus::Absent);
}

#[test]
fn test_unlock_by_other_user_fails() {
    let (engine, _store) = bootstrapped_engine();
    engine.lock(&lock_request("env", "prod", "alice")).unwrap();

    let err = primary(engine.unlock(&unlock_request("env", "prod", "bob")).unwrap_err());
    assert!(matches!(err, LockerError::OwnershipConflict { .. }));
    assert_eq!(status_of(&engine, "prod"), LockStatus::Locked);

    engine.unlock(&unlock_request("env", "prod", "admin")).unwrap();
    assert_eq!(status_of(&engine, "prod"), LockStatus::Absent);
}

#[test]
fn test_user_unlock_keeps_created_environment() {
    let (engine, _store) = bootstrapped_engine();
    engine.admin(&admin_request("env-create", "dev")).unwrap();

    let accepted = engine.unlock(&unlock_request("env", "dev", "bob")).unwrap();

    assert_eq!(accepted.value.map(|e| e.state), Some(EntityState::Unlocked));
    assert_eq!(status_of(&engine, "dev"), LockStatus::Unlocked);
}

#[test]
fn test_user_cannot_unlock_terminated_environment() {
    let (engine, _store) = bootstrapped_engine();
    engine.admin(&admin_request("env-terminate", "old")).unwrap();

    let err = primary(engine.unlock(&unlock_request("env", "old", "alice")).unwrap_err());
    assert!(matches!(err, LockerError::EntityUnavailable { .. }));
    assert_eq!(status_of(&engine, "old"), LockStatus::Terminated);
}

// ============================================================================
// Registration and the bootstrap guard
// ============================================================================

#[test]
fn test_bootstrap_guard_blocks_without_store_writes() {
    let (engine, store) = empty_engine();

    let req = ActionRequest {
        kind: "env".to_string(),
        name: "prod-1".to_string(),
        user: "alice".to_string(),
        token: "alice-token".to_string(),
        last_day: Some(FAR_DAY.to_string()),
        client: CLIENT.to_string(),
    };
    let rejection = engine.lock(&req).unwrap_err();

    assert_eq!(*rejection.primary(), LockerError::AdministrationNotInitialized);
    assert_eq!(rejection.status(), 423);
    assert!(store.scan_prefix("env:").unwrap().is_empty());
    assert!(store.scan_prefix("host:").unwrap().is_empty());
    assert!(store.hget_all("user").unwrap().is_none());
}

#[test]
fn test_register_requires_admin_first() {
    let (engine, _store) = empty_engine();
    let req = RegisterRequest {
        user: "alice".to_string(),
        token: "alice-token".to_string(),
        client: CLIENT.to_string(),
    };

    let err = primary(engine.register(&req).unwrap_err());
    assert_eq!(err, LockerError::AdministrationNotInitialized);

    let admin = RegisterRequest {
        user: "admin".to_string(),
        token: ADMIN_TOKEN.to_string(),
        client: CLIENT.to_string(),
    };
    let accepted = engine.register(&admin).unwrap();
    assert_eq!(accepted.status, 201);
    assert_eq!(accepted.message, "OK: User 'admin' created.");

    assert!(engine.register(&req).is_ok());
}

#[test]
fn test_register_existing_user_fails() {
    let (engine, _store) = bootstrapped_engine();
    let req = RegisterRequest {
        user: "alice".to_string(),
        token: "new".to_string(),
        client: CLIENT.to_string(),
    };

    let rejection = engine.register(&req).unwrap_err();
    assert_eq!(
        *rejection.primary(),
        LockerError::UserExists("alice".to_string())
    );
    assert_eq!(rejection.status(), 403);
}

#[test]
fn test_register_missing_fields() {
    let (engine, _store) = bootstrapped_engine();
    let req = RegisterRequest {
        user: String::new(),
        token: String::new(),
        client: CLIENT.to_string(),
    };

    let rejection = engine.register(&req).unwrap_err();
    let messages: Vec<String> = rejection.errors().iter().map(|e| e.to_string()).collect();
    assert_eq!(
        messages,
        vec!["no 'user' parameter specified", "no 'token' parameter specified"]
    );
}

#[test]
fn test_legacy_user_can_lock_and_is_upgraded() {
    let (engine, store) = bootstrapped_engine();
    let legacy = format!("sha1${}", crate::credentials::legacy_hash("carol-token"));
    assert!(store.hset_nx("user", "carol", &legacy).unwrap());

    engine.lock(&lock_request("env", "lab", "carol")).unwrap();

    let stored = store.hget("user", "carol").unwrap().unwrap();
    assert!(stored.starts_with("$argon2"));
    engine.unlock(&unlock_request("env", "lab", "carol")).unwrap();
}

// ============================================================================
// Administration
// ============================================================================

#[test]
fn test_admin_requires_admin_token() {
    let (engine, _store) = bootstrapped_engine();
    let mut req = admin_request("env-create", "prod");
    req.token = "alice-token".to_string();

    let err = primary(engine.admin(&req).unwrap_err());
    assert_eq!(err, LockerError::IllegalCredentials);
    assert_eq!(status_of(&engine, "prod"), LockStatus::Absent);
}

#[test]
fn test_admin_unknown_action() {
    let (engine, _store) = bootstrapped_engine();

    let rejection = engine.admin(&admin_request("env-explode", "prod")).unwrap_err();
    assert!(rejection.primary().to_string().contains("illegal 'action'"));
}

#[test]
fn test_admin_lifecycle() {
    let (engine, _store) = bootstrapped_engine();

    let created = engine.admin(&admin_request("env-create", "stage")).unwrap();
    assert_eq!(created.message, "OK: Environment created.");
    assert_eq!(status_of(&engine, "stage"), LockStatus::Unlocked);

    let maint = engine.admin(&admin_request("env-maintenance", "stage")).unwrap();
    assert_eq!(maint.value.as_ref().map(|e| e.state), Some(EntityState::Maintenance));
    assert_eq!(maint.value.as_ref().map(|e| e.owner.as_str()), Some(""));

    let terminated = engine.admin(&admin_request("env-terminate", "stage")).unwrap();
    let entity = terminated.value.unwrap();
    assert_eq!(entity.state, EntityState::Terminated);
    assert_eq!(entity.owner, "admin");
    assert_eq!(entity.parent, "n/a");

    // Recovery from termination.
    engine.admin(&admin_request("env-create", "stage")).unwrap();
    assert_eq!(status_of(&engine, "stage"), LockStatus::Unlocked);

    let unlocked = engine.admin(&admin_request("env-unlock", "stage")).unwrap();
    assert!(unlocked.value.is_none());
    assert_eq!(status_of(&engine, "stage"), LockStatus::Absent);
}

#[test]
fn test_admin_create_does_not_replace_user_lock() {
    let (engine, _store) = bootstrapped_engine();
    engine.lock(&lock_request("env", "prod", "alice")).unwrap();

    let err = primary(engine.admin(&admin_request("env-create", "prod")).unwrap_err());
    assert!(matches!(err, LockerError::OwnershipConflict { .. }));
}

#[test]
fn test_admin_host_unlock_and_user_purge() {
    let (engine, _store) = bootstrapped_engine();
    engine.admin(&admin_request("env-create", "prod")).unwrap();
    engine.lock(&lock_request("host", "prod-9", "bob")).unwrap();

    engine.admin(&admin_request("host-unlock", "prod-9")).unwrap();
    assert!(engine.entities().get(EntityKind::Host, "prod-9").unwrap().is_none());

    let purged = engine.admin(&admin_request("user-purge", "bob")).unwrap();
    assert_eq!(purged.message, "OK: User purged.");
    assert!(!engine.credentials().user_exists("bob").unwrap());

    let err = primary(engine.admin(&admin_request("user-purge", "bob")).unwrap_err());
    assert_eq!(err, LockerError::UserNotFound("bob".to_string()));

    let err = primary(engine.admin(&admin_request("user-purge", "admin")).unwrap_err());
    assert!(matches!(err, LockerError::InputInvalid(_)));
}

// ============================================================================
// Rate limiting
// ============================================================================

#[test]
fn test_rate_limit_short_circuits() {
    let store = std::sync::Arc::new(MemoryStore::new());
    let config = crate::config::Config {
        rate_limit_max_requests: 3,
        ..cheap_config()
    };
    let engine = Engine::new(store.clone(), &config);
    register(&engine, "admin", ADMIN_TOKEN);

    engine.lock(&lock_request("env", "a", "admin")).unwrap();
    let last = engine.lock(&lock_request("env", "b", "admin")).unwrap();
    assert_eq!(last.rate_limit.map(|r| r.remaining), Some(0));

    let rejection = engine.lock(&lock_request("env", "c", "admin")).unwrap_err();
    assert_eq!(rejection.errors(), &[LockerError::RateLimited { limit: 3 }]);
    assert_eq!(rejection.status(), 429);
    assert!(engine.entities().get(EntityKind::Environment, "c").unwrap().is_none());

    let mut other = lock_request("env", "c", "admin");
    other.client = "10.9.9.9".to_string();
    assert!(engine.lock(&other).is_ok());
}

// ============================================================================
// Responses
// ============================================================================

#[test]
fn test_response_from_success() {
    let (engine, _store) = bootstrapped_engine();
    let outcome = engine.lock(&lock_request("env", "prod", "alice"));

    let response = Response::from_outcome(&outcome);
    assert!(response.success);
    assert_eq!(response.status, 200);

    let json: serde_json::Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
    assert_eq!(json["entity"]["user"], "alice");
    assert_eq!(json["entity"]["type"], "env");
    assert!(json["rate_limit"]["remaining"].is_u64());
}

#[test]
fn test_response_from_rejection() {
    let (engine, _store) = empty_engine();
    let outcome = engine.lock(&lock_request("env", "prod", "alice"));

    let response = Response::from_outcome(&outcome);
    assert!(!response.success);
    assert_eq!(response.status, 423);
    assert_eq!(
        response.messages,
        vec!["no 'admin' user present, cannot continue"]
    );
    assert!(response.entity.is_none());
}

// ============================================================================
// State machine
// ============================================================================

#[test]
fn test_machine_transitions_report_previous_record() {
    let kv = MemoryStore::new();
    let machine = LockMachine::new(&kv, Local::now());

    let first = machine.lock_environment("prod", "alice", day(FAR_DAY)).unwrap();
    assert!(first.previous.is_none());
    assert!(first.changed());

    let second = machine.terminate_environment("prod").unwrap();
    assert_eq!(
        second.previous.map(|e| e.state),
        Some(EntityState::Locked)
    );

    let noop = machine.unlock_host("prod-1", "alice").unwrap();
    assert!(!noop.changed());
}

#[test]
fn test_machine_conditional_write_refuses_stale_owner() {
    let kv = MemoryStore::new();
    let machine = LockMachine::new(&kv, Local::now());
    machine.lock_environment("prod", "alice", day(FAR_DAY)).unwrap();

    // A writer that still believes bob holds the lock must not win.
    let stale = Entity::locked(EntityKind::Environment, "prod", "bob", day(FAR_DAY));
    let entities = EntityStore::new(&kv);
    assert!(!entities.put_if_owner(&stale, None, Some("bob")).unwrap());

    // The record was replaced out from under alice.
    let carol = Entity::locked(EntityKind::Environment, "prod", "carol", day(FAR_DAY));
    kv.replace_hash("env:prod", &carol.to_fields(), None, &Precondition::Always)
        .unwrap();

    let err = machine.unlock_environment("prod", "alice").unwrap_err();
    assert_eq!(
        err,
        LockerError::OwnershipConflict {
            entity: "env:prod".to_string(),
            owner: "carol".to_string(),
        }
    );
}

// ============================================================================
// On-disk store
// ============================================================================

#[test]
fn test_file_engine_records_audit_events() {
    let (_temp, ctx) = create_test_store();
    let engine = Engine::open(&ctx).unwrap();
    register(&engine, "admin", ADMIN_TOKEN);
    register(&engine, "alice", "alice-token");

    engine.lock(&lock_request("env", "prod", "alice")).unwrap();
    engine.unlock(&unlock_request("env", "prod", "alice")).unwrap();
    // No-op unlock leaves no event.
    engine.unlock(&unlock_request("env", "prod", "alice")).unwrap();

    let content = std::fs::read_to_string(ctx.events_dir.join("events.ndjson")).unwrap();
    let actions: Vec<String> = content
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["action"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(actions, vec!["register", "register", "lock", "unlock"]);
}

#[test]
fn test_file_engine_shares_state_between_handles() {
    let (_temp, ctx) = create_test_store();
    let first = Engine::open(&ctx).unwrap();
    register(&first, "admin", ADMIN_TOKEN);
    first.lock(&lock_request("env", "prod", "admin")).unwrap();

    let second = Engine::open(&ctx).unwrap();
    assert_eq!(status_of(&second, "prod"), LockStatus::Locked);
}

#[test]
fn test_open_without_store_fails() {
    let temp = tempfile::TempDir::new().unwrap();
    let ctx = StoreContext::at(temp.path()).unwrap();

    let err = Engine::open(&ctx).err().unwrap();
    assert!(matches!(err, LockerError::StoreFailure(_)));
}
