//! CLI command handling.
//!
//! Provides subcommands for:
//! - Running the webhook relay (`run`, the default)
//! - Inspecting and editing the pairs file (`pairs list`, `pairs unlink`)

mod pairs;

pub use pairs::{PairsCommand, run_pairs_command, run_pairs_command_with_store};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pairbridge")]
#[command(about = "Telegram webhook bot that relays messages between paired chats")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the webhook (default if no subcommand given)
    Run,

    /// Manage persisted pairings
    #[command(subcommand)]
    Pairs(PairsCommand),
}

impl Cli {
    /// Check if we should start the relay (default behavior or explicit `run` command).
    pub fn should_run_relay(&self) -> bool {
        matches!(self.command, None | Some(Command::Run))
    }
}
