//! `pairs` subcommands: operator access to the pairs file.

use std::path::PathBuf;

use clap::Subcommand;

use crate::pairing::PairingStore;
use crate::telegram::ChatId;

#[derive(Subcommand, Debug, Clone)]
pub enum PairsCommand {
    /// List active pairings
    List {
        /// Pairs file
        #[arg(long, env = "PAIRS_FILE", default_value = "pairs.json")]
        file: PathBuf,
    },

    /// Dissolve the pairing of a chat
    Unlink {
        /// Chat id whose pairing to remove
        #[arg(allow_hyphen_values = true)]
        id: ChatId,

        /// Pairs file
        #[arg(long, env = "PAIRS_FILE", default_value = "pairs.json")]
        file: PathBuf,
    },
}

/// Run a pairs command against the file it names.
pub async fn run_pairs_command(cmd: PairsCommand) -> anyhow::Result<()> {
    let file = match &cmd {
        PairsCommand::List { file } | PairsCommand::Unlink { file, .. } => file.clone(),
    };
    let store = PairingStore::open(&file)?;
    run_pairs_command_with_store(&store, cmd).await
}

/// Run a pairs command against an already opened store.
pub async fn run_pairs_command_with_store(
    store: &PairingStore,
    cmd: PairsCommand,
) -> anyhow::Result<()> {
    match cmd {
        PairsCommand::List { .. } => {
            let pairs = store.snapshot().await;
            if pairs.is_empty() {
                println!("No pairings in {}", store.path().display());
                return Ok(());
            }
            println!("Pairings ({}):", store.pair_count().await);
            for (a, b) in &pairs {
                if a < b || pairs.get(b) != Some(a) {
                    println!("  {a} <-> {b}");
                }
            }
        }
        PairsCommand::Unlink { id, .. } => match store.try_unlink(id).await? {
            Some(partner) => println!("Unlinked {id} from {partner}"),
            None => anyhow::bail!("chat {id} has no pairing"),
        },
    }
    Ok(())
}
