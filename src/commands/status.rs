//! Implementation of the `nodelocker status` command.
//!
//! Displays environments grouped by state and the hosts currently locked,
//! with their owners and last days.

use crate::cli::StatusArgs;
use crate::context::require_initialized_store;
use crate::engine::Engine;
use crate::error::{LockerError, Result};
use crate::stats::{LockedEntry, NameFilter, Stats};
use std::fmt::Write;
use std::path::Path;

/// Execute the `nodelocker status` command.
pub fn cmd_status(store: Option<&Path>, args: StatusArgs) -> Result<()> {
    let ctx = require_initialized_store(store)?;
    let engine = Engine::open(&ctx)?;

    let filter = if args.filter.is_empty() {
        None
    } else {
        Some(NameFilter::new(&args.filter)?)
    };
    let stats = Stats::collect(&engine.entities(), filter.as_ref())?;

    if args.json {
        let json = serde_json::to_string_pretty(&stats)
            .map_err(|e| LockerError::store("failed to serialize status", e))?;
        println!("{}", json);
    } else {
        print!("{}", render(&stats));
    }

    Ok(())
}

fn render(stats: &Stats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Lock Status");
    let _ = writeln!(out, "===========");
    let _ = writeln!(out);

    let _ = writeln!(out, "Environments:");
    let _ = writeln!(out, "  {:12} {:>3}", "unlocked", stats.valid_envs.len());
    let _ = writeln!(out, "  {:12} {:>3}", "locked", stats.locked_envs.len());
    let _ = writeln!(out, "  {:12} {:>3}", "maintenance", stats.maint_envs.len());
    let _ = writeln!(out, "  {:12} {:>3}", "terminated", stats.termd_envs.len());
    let _ = writeln!(out, "  ------------");
    let _ = writeln!(out, "  {:12} {:>3}", "Total", stats.total_envs());

    render_locked(&mut out, "Locked environments", &stats.locked_envs);
    render_names(&mut out, "In maintenance", &stats.maint_envs);
    render_names(&mut out, "Terminated", &stats.termd_envs);
    render_locked(&mut out, "Locked hosts", &stats.locked_hosts);

    out
}

fn render_locked(out: &mut String, title: &str, entries: &[LockedEntry]) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}:", title);
    for entry in entries {
        let until = entry
            .last_day
            .map(|day| day.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "  - {} (by {}, until {})", entry.name, entry.owner, until);
    }
}

fn render_names(out: &mut String, title: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}:", title);
    for name in names {
        let _ = writeln!(out, "  - {}", name);
    }
}
