use std::path::PathBuf;
use std::time::Duration;

use clap::Subcommand;
use tarot_api::sync::{dataset, http_client};

use crate::output::{self, OutputConfig};

/// Card dataset commands
#[derive(Subcommand, Debug)]
pub enum DataCommands {
    /// Fetch the upstream dataset, validate it and write it locally
    Update {
        /// Path of the dataset file to write
        #[clap(long, env = "DATA_PATH", default_value = "data/tarot-images.json")]
        data: PathBuf,
        /// Fetch and validate without writing
        #[clap(long)]
        validate_only: bool,
    },
    /// Validate the local dataset file
    Validate {
        /// Path of the dataset file to check
        #[clap(long, env = "DATA_PATH", default_value = "data/tarot-images.json")]
        data: PathBuf,
    },
}

/// Executes a data command
pub async fn execute(cmd: DataCommands, config: &OutputConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        DataCommands::Update { data, validate_only } => {
            let client = http_client(Duration::from_secs(15))?;
            let cards = dataset::fetch_dataset(&client).await?;
            dataset::validate_dataset(&cards)?;

            if validate_only {
                let message = format!("OK: {} cards (validate-only)", cards.len());
                output::print_dataset_summary(&message, cards.len(), config);
                return Ok(());
            }

            dataset::write_dataset(&data, &cards)?;
            let message = format!("Updated {} with {} cards", data.display(), cards.len());
            output::print_dataset_summary(&message, cards.len(), config);
        }
        DataCommands::Validate { data } => {
            let cards = dataset::read_dataset(&data)?;
            dataset::validate_dataset(&cards)?;
            let message = format!("OK: {} cards in {}", cards.len(), data.display());
            output::print_dataset_summary(&message, cards.len(), config);
        }
    }
    Ok(())
}
