//! Config loading, validation, and conversion into component settings.

use super::model::Config;
use crate::credentials::HashCost;
use crate::error::{LockerError, Result};
use crate::ratelimit::RateLimitConfig;
use chrono::Duration;
use std::path::Path;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            LockerError::InputInvalid(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).map_err(|e| {
            LockerError::InputInvalid(format!("failed to parse config YAML: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            LockerError::InputInvalid(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values; every numeric setting must be positive.
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, u64); 7] = [
            ("rate_limit_max_requests", self.rate_limit_max_requests as u64),
            ("rate_limit_window_secs", self.rate_limit_window_secs),
            ("hash_memory_kib", self.hash_memory_kib as u64),
            ("hash_iterations", self.hash_iterations as u64),
            ("hash_parallelism", self.hash_parallelism as u64),
            ("store_timeout_ms", self.store_timeout_ms),
            ("store_lock_stale_secs", self.store_lock_stale_secs),
        ];

        for (name, value) in checks {
            if value == 0 {
                return Err(LockerError::InputInvalid(format!(
                    "config validation failed: {} must be greater than 0",
                    name
                )));
            }
        }

        for (name, value) in [
            ("rate_limit_window_secs", self.rate_limit_window_secs),
            ("store_lock_stale_secs", self.store_lock_stale_secs),
        ] {
            if duration_secs(value).is_none() {
                return Err(LockerError::InputInvalid(format!(
                    "config validation failed: {} is too large ({})",
                    name, value
                )));
            }
        }

        // Argon2 refuses less than 8 KiB per lane.
        if self.hash_memory_kib < 8 * self.hash_parallelism {
            return Err(LockerError::InputInvalid(format!(
                "config validation failed: hash_memory_kib must be at least {} for parallelism {}",
                8 * self.hash_parallelism,
                self.hash_parallelism
            )));
        }

        Ok(())
    }

    /// Rate limiter settings.
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.rate_limit_max_requests,
            window: duration_secs(self.rate_limit_window_secs)
                .unwrap_or_else(|| RateLimitConfig::default().window),
        }
    }

    /// Age after which a store key lock is considered abandoned.
    pub fn store_lock_stale(&self) -> Result<Duration> {
        duration_secs(self.store_lock_stale_secs).ok_or_else(|| {
            LockerError::InputInvalid(format!(
                "store_lock_stale_secs is too large ({})",
                self.store_lock_stale_secs
            ))
        })
    }

    /// Password hashing cost.
    pub fn hash_cost(&self) -> HashCost {
        HashCost {
            memory_kib: self.hash_memory_kib,
            iterations: self.hash_iterations,
            parallelism: self.hash_parallelism,
        }
    }
}

/// Whole seconds as a duration, if representable.
fn duration_secs(secs: u64) -> Option<Duration> {
    i64::try_from(secs).ok().and_then(Duration::try_seconds)
}
