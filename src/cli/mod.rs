//! CLI argument parsing for nodelocker.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.
//!
//! Request parameters are optional at this level so that the engine can
//! report every missing or malformed one at once.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Nodelocker: lock arbitration for shared environments and hosts.
///
/// Users lock an environment or a host until a last day, so that nobody
/// else deploys to it in the meantime:
/// - a lock belongs to the user who took it (or to `admin`)
/// - a host can only be locked while its environment is free
/// - locks expire on their own after their last day
#[derive(Parser, Debug)]
#[command(name = "nodelocker")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Store directory (defaults to $NODELOCKER_HOME, then ./.nodelocker).
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for nodelocker.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the store directory and its configuration.
    Init,

    /// Lock an environment or host until the end of a day.
    Lock(LockArgs),

    /// Release an environment or host.
    Unlock(UnlockArgs),

    /// Register a user. `admin` must be registered first.
    Register(RegisterArgs),

    /// Run an administrative action with the admin token.
    Admin(AdminArgs),

    /// Show environments by state and locked hosts.
    Status(StatusArgs),

    /// Print the client identifier a request would be rate limited under.
    ClientIp(ClientIpArgs),
}

/// Arguments for the `lock` command.
#[derive(Parser, Debug)]
pub struct LockArgs {
    /// Entity type: `env` or `host`.
    #[arg(long = "type")]
    pub kind: Option<String>,

    /// Environment or host name.
    #[arg(long)]
    pub name: Option<String>,

    /// Acting user.
    #[arg(long)]
    pub user: Option<String>,

    /// The user's token.
    #[arg(long)]
    pub token: Option<String>,

    /// Last day of the lock (YYYYMMDD).
    #[arg(long)]
    pub lastday: Option<String>,

    /// Client identifier for rate limiting (defaults to the hostname).
    #[arg(long)]
    pub client: Option<String>,
}

/// Arguments for the `unlock` command.
#[derive(Parser, Debug)]
pub struct UnlockArgs {
    /// Entity type: `env` or `host`.
    #[arg(long = "type")]
    pub kind: Option<String>,

    /// Environment or host name.
    #[arg(long)]
    pub name: Option<String>,

    /// Acting user.
    #[arg(long)]
    pub user: Option<String>,

    /// The user's token.
    #[arg(long)]
    pub token: Option<String>,

    /// Client identifier for rate limiting (defaults to the hostname).
    #[arg(long)]
    pub client: Option<String>,
}

/// Arguments for the `register` command.
#[derive(Parser, Debug)]
pub struct RegisterArgs {
    /// Name of the new user.
    #[arg(long)]
    pub user: Option<String>,

    /// Token for the new user.
    #[arg(long)]
    pub token: Option<String>,

    /// Client identifier for rate limiting (defaults to the hostname).
    #[arg(long)]
    pub client: Option<String>,
}

/// Arguments for the `admin` command.
#[derive(Parser, Debug)]
pub struct AdminArgs {
    /// One of: user-purge, env-create, env-unlock, env-maintenance,
    /// env-terminate, host-unlock.
    pub action: String,

    /// Target user, environment or host.
    #[arg(long)]
    pub name: Option<String>,

    /// The admin token.
    #[arg(long)]
    pub token: Option<String>,

    /// Client identifier for rate limiting (defaults to the hostname).
    #[arg(long)]
    pub client: Option<String>,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Only show names matching these globs.
    #[arg(long, value_delimiter = ',')]
    pub filter: Vec<String>,
}

/// Arguments for the `client-ip` command.
#[derive(Parser, Debug)]
pub struct ClientIpArgs {
    /// Value of the X-Real-IP header.
    #[arg(long)]
    pub real_ip: Option<String>,

    /// Value of the X-Forwarded-For header.
    #[arg(long)]
    pub forwarded_for: Option<String>,

    /// Transport peer address, e.g. `10.0.0.5:41234`.
    #[arg(long, default_value = "")]
    pub peer: String,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
