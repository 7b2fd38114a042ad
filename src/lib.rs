//! Nodelocker: lock arbitration for shared environments and hosts.
//!
//! Users take time-boxed locks on environments and on hosts inside them.
//! The engine enforces ownership, expiry and the environment/host hierarchy
//! over a shared key-value store, behind credential checks, an admin
//! bootstrap guard and per-client rate limiting.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod credentials;
pub mod engine;
pub mod entity;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod ratelimit;
pub mod stats;
pub mod store;

#[cfg(test)]
mod test_support;
