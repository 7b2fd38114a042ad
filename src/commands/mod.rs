//! Command implementations for nodelocker.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Mutating commands print the JSON response and fail with
//! the exit code of the first problem the engine reported.

mod admin;
mod init;
mod lock;
mod register;
mod status;

use crate::cli::{Cli, ClientIpArgs, Command};
use crate::engine::{Outcome, Rejection, Response, Snapshot};
use crate::error::Result;
use crate::ratelimit::client_ip;

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> Result<()> {
    let store = cli.store.as_deref();
    match cli.command {
        Command::Init => init::cmd_init(store),
        Command::Lock(args) => lock::cmd_lock(store, args),
        Command::Unlock(args) => lock::cmd_unlock(store, args),
        Command::Register(args) => register::cmd_register(store, args),
        Command::Admin(args) => admin::cmd_admin(store, args),
        Command::Status(args) => status::cmd_status(store, args),
        Command::ClientIp(args) => cmd_client_ip(args),
    }
}

fn cmd_client_ip(args: ClientIpArgs) -> Result<()> {
    println!(
        "{}",
        client_ip(args.real_ip.as_deref(), args.forwarded_for.as_deref(), &args.peer)
    );
    Ok(())
}

/// Print the response for `outcome` and turn a rejection into its primary
/// error.
fn report<T: Snapshot>(outcome: Outcome<T>) -> Result<()> {
    println!("{}", Response::from_outcome(&outcome).to_json()?);
    outcome.map(|_| ()).map_err(Rejection::into_primary)
}

/// Client identifier of a local invocation: the explicit value, else this
/// machine's hostname.
fn resolve_client(explicit: Option<String>) -> String {
    if let Some(client) = explicit
        && !client.trim().is_empty()
    {
        return client.trim().to_string();
    }
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}
