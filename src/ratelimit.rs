//! Per-client request rate limiting.
//!
//! Each client identifier gets a counter in the shared store. The first
//! request of a window creates the counter and starts the window; the store
//! drops the counter when the window ends.

use crate::error::{LockerError, Result};
use crate::store::KvStore;
use chrono::Duration;
use serde::Serialize;
use std::net::SocketAddr;

/// Store key prefix of the rate counters.
pub const RATE_LIMIT_PREFIX: &str = "ratelimit:";

/// Quota settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::seconds(60),
        }
    }
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
}

impl RateDecision {
    /// The refusal for a denied request.
    pub fn error(&self) -> LockerError {
        LockerError::RateLimited { limit: self.limit }
    }
}

/// Fixed-window counter per client.
pub struct RateLimiter<'a> {
    kv: &'a dyn KvStore,
    config: RateLimitConfig,
}

impl<'a> RateLimiter<'a> {
    pub fn new(kv: &'a dyn KvStore, config: RateLimitConfig) -> Self {
        Self { kv, config }
    }

    /// Count a request from `client` and decide whether it may proceed.
    pub fn allow(&self, client: &str) -> Result<RateDecision> {
        let key = format!("{}{}", RATE_LIMIT_PREFIX, client);
        let count = self.kv.incr_window(&key, self.config.window)?;

        let limit = self.config.max_requests;
        let used = u32::try_from(count).unwrap_or(u32::MAX);

        Ok(RateDecision {
            allowed: used <= limit,
            limit,
            remaining: limit.saturating_sub(used),
        })
    }
}

/// Identify the client of a request: the `X-Real-IP` value, else the first
/// `X-Forwarded-For` entry, else the transport peer without its port.
pub fn client_ip(real_ip: Option<&str>, forwarded_for: Option<&str>, peer: &str) -> String {
    if let Some(ip) = real_ip.map(str::trim)
        && !ip.is_empty()
    {
        return ip.to_string();
    }

    if let Some(first) = forwarded_for.and_then(|list| list.split(',').next())
        && !first.trim().is_empty()
    {
        return first.trim().to_string();
    }

    match peer.parse::<SocketAddr>() {
        Ok(addr) => addr.ip().to_string(),
        Err(_) => peer.to_string(),
    }
}
