use crate::config::Config;
use crate::context::StoreContext;
use crate::credentials::ADMIN;
use crate::engine::{ActionRequest, AdminRequest, Engine, RegisterRequest};
use crate::store::MemoryStore;
use std::sync::Arc;
use tempfile::TempDir;

pub(crate) const ADMIN_TOKEN: &str = "root-token";
pub(crate) const CLIENT: &str = "10.0.0.1";
pub(crate) const FAR_DAY: &str = "20991231";

/// Config with the cheapest hashing Argon2 accepts.
pub(crate) fn cheap_config() -> Config {
    Config {
        hash_memory_kib: 8,
        hash_iterations: 1,
        hash_parallelism: 1,
        ..Config::default()
    }
}

/// In-memory engine with no users at all.
pub(crate) fn empty_engine() -> (Engine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store.clone(), &cheap_config());
    (engine, store)
}

/// In-memory engine with `admin` plus `alice` and `bob` registered. Each
/// user's token is `<name>-token`.
pub(crate) fn bootstrapped_engine() -> (Engine, Arc<MemoryStore>) {
    let (engine, store) = empty_engine();
    register(&engine, ADMIN, ADMIN_TOKEN);
    register(&engine, "alice", "alice-token");
    register(&engine, "bob", "bob-token");
    (engine, store)
}

/// Initialized on-disk store directory.
pub(crate) fn create_test_store() -> (TempDir, StoreContext) {
    let temp_dir = TempDir::new().unwrap();
    let ctx = StoreContext::at(temp_dir.path()).unwrap();
    std::fs::create_dir_all(&ctx.data_dir).unwrap();
    std::fs::create_dir_all(&ctx.locks_dir).unwrap();
    std::fs::write(ctx.config_path(), cheap_config().to_yaml().unwrap()).unwrap();
    (temp_dir, ctx)
}

pub(crate) fn register(engine: &Engine, user: &str, token: &str) {
    engine
        .register(&RegisterRequest {
            user: user.to_string(),
            token: token.to_string(),
            client: CLIENT.to_string(),
        })
        .unwrap();
}

pub(crate) fn token_of(user: &str) -> String {
    if user == ADMIN {
        ADMIN_TOKEN.to_string()
    } else {
        format!("{}-token", user)
    }
}

/// Lock request with the user's correct token, valid through [`FAR_DAY`].
pub(crate) fn lock_request(kind: &str, name: &str, user: &str) -> ActionRequest {
    ActionRequest {
        kind: kind.to_string(),
        name: name.to_string(),
        user: user.to_string(),
        token: token_of(user),
        last_day: Some(FAR_DAY.to_string()),
        client: CLIENT.to_string(),
    }
}

pub(crate) fn unlock_request(kind: &str, name: &str, user: &str) -> ActionRequest {
    ActionRequest {
        last_day: None,
        ..lock_request(kind, name, user)
    }
}

pub(crate) fn admin_request(action: &str, name: &str) -> AdminRequest {
    AdminRequest {
        action: action.to_string(),
        name: name.to_string(),
        token: ADMIN_TOKEN.to_string(),
        client: CLIENT.to_string(),
    }
}
