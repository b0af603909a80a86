use std::path::PathBuf;
use std::time::Duration;

use clap::Subcommand;
use tarot_api::sync::{CacheReport, archive, commons, dataset, http_client, images};

use crate::output::{self, OutputConfig};

/// Image cache commands
#[derive(Subcommand, Debug)]
pub enum ImageCommands {
    /// Cache the images referenced by the dataset
    Cache {
        #[clap(long, env = "DATA_PATH", default_value = "data/tarot-images.json")]
        data: PathBuf,
        #[clap(long, default_value = "static/cards")]
        out: PathBuf,
        /// Overwrite images that are already cached
        #[clap(long)]
        force: bool,
    },
    /// Download the major arcana from Wikimedia Commons
    Commons {
        #[clap(long, default_value = "static/cards")]
        out: PathBuf,
    },
    /// Search Wikimedia Commons for every card by name and cache the results
    CommonsMap {
        #[clap(long, env = "DATA_PATH", default_value = "data/tarot-images.json")]
        data: PathBuf,
        #[clap(long, default_value = "static/cards")]
        out: PathBuf,
        #[clap(long)]
        force: bool,
    },
    /// Cache all 78 archive.org scans, converted to JPEG
    Archive {
        #[clap(long, default_value = "static/cards")]
        out: PathBuf,
        #[clap(long)]
        force: bool,
        /// JPEG quality (1-100)
        #[clap(long, default_value_t = archive::DEFAULT_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: u8,
    },
}

fn finish(label: &str, report: &CacheReport, config: &OutputConfig) -> Result<(), Box<dyn std::error::Error>> {
    output::print_report(label, report, config);
    if report.is_success() {
        Ok(())
    } else {
        Err(format!("{} image(s) could not be cached", report.failed).into())
    }
}

/// Executes an image command
pub async fn execute(cmd: ImageCommands, config: &OutputConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = http_client(Duration::from_secs(30))?;

    match cmd {
        ImageCommands::Cache { data, out, force } => {
            let cards = dataset::read_dataset(&data)?;
            let report = images::cache_dataset_images(&client, &cards, &out, force).await;
            finish("dataset", &report, config)
        }
        ImageCommands::Commons { out } => {
            let report = commons::fetch_major_arcana(&client, &out).await;
            finish("commons", &report, config)
        }
        ImageCommands::CommonsMap { data, out, force } => {
            let cards = dataset::read_dataset(&data)?;
            let report = commons::map_and_cache(&client, &cards, &out, force).await;
            finish("commons_map", &report, config)
        }
        ImageCommands::Archive { out, force, quality } => {
            let report = archive::cache_archive_images(&client, &out, force, quality).await;
            finish("archive", &report, config)
        }
    }
}
