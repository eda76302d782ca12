//! Command dispatch: bridges CLI args -> engine workflows -> output formatting.

pub mod catalog;
pub mod config_cmd;
pub mod inventory;
pub mod locate;
pub mod monitor;
pub mod scan;
pub mod signal;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch an engine-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Inventory(args) => inventory::handle(args, global).await,
        Command::Locate(args) => locate::handle(args, global).await,
        Command::Monitor(args) => monitor::handle(args, global).await,
        Command::Signal(args) => signal::handle(&args, global),
        Command::Products => catalog::products(global).await,
        Command::Tag(args) => catalog::tag(args, global).await,
        Command::Config(args) => config_cmd::handle(args, global),
        // Completions need the clap command tree and are handled in main
        Command::Completions(_) => Ok(()),
    }
}
