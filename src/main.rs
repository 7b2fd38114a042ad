//! Entry point for the `nodelocker` CLI. It parses arguments, dispatches to
//! the appropriate command handler, and handles errors with proper exit
//! codes.

use nodelocker::cli::Cli;
use nodelocker::{commands, exit_codes};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match commands::dispatch(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
