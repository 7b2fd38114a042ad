//! Config struct definition and default implementation.

use serde::{Deserialize, Serialize};

/// Configuration for a nodelocker store.
///
/// This struct represents the contents of `<store>/config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Rate limiting
    // =========================================================================
    /// Maximum requests a single client may make within one window.
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,

    /// Length of the fixed rate-limit window in seconds.
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    // =========================================================================
    // Password hashing (Argon2id cost)
    // =========================================================================
    /// Memory cost in KiB.
    #[serde(default = "default_hash_memory_kib")]
    pub hash_memory_kib: u32,

    /// Number of passes.
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,

    /// Degree of parallelism.
    #[serde(default = "default_hash_parallelism")]
    pub hash_parallelism: u32,

    // =========================================================================
    // Store settings
    // =========================================================================
    /// How long a single store command may wait for its key lock.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Seconds after which an abandoned key lock file is broken.
    #[serde(default = "default_store_lock_stale_secs")]
    pub store_lock_stale_secs: u64,

    /// Whether successful mutations are appended to the audit log.
    #[serde(default = "default_true")]
    pub audit_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rate_limit_max_requests: default_rate_limit_max_requests(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            hash_memory_kib: default_hash_memory_kib(),
            hash_iterations: default_hash_iterations(),
            hash_parallelism: default_hash_parallelism(),
            store_timeout_ms: default_store_timeout_ms(),
            store_lock_stale_secs: default_store_lock_stale_secs(),
            audit_log: default_true(),
        }
    }
}

fn default_rate_limit_max_requests() -> u32 {
    60
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_hash_memory_kib() -> u32 {
    19 * 1024
}

fn default_hash_iterations() -> u32 {
    2
}

fn default_hash_parallelism() -> u32 {
    1
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_store_lock_stale_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}
