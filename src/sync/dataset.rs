use std::path::Path;

use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument};

use super::{SyncError, fetch_bytes, write_file};
use crate::deck::{EXPECTED_CARDS, duplicate_ids};
use crate::models::Card;

/// Upstream dataset: `{description, cards: [...]}`
pub const DATASET_URL: &str = "https://raw.githubusercontent.com/metabismuth/tarot-json/master/tarot-images.json";

/// Base URL of the upstream card images
pub const CARDS_BASE_URL: &str = "https://raw.githubusercontent.com/metabismuth/tarot-json/master/cards/";

const ARCANA: [&str; 2] = ["Major Arcana", "Minor Arcana"];

#[derive(Deserialize)]
struct RemoteDataset {
    cards: Vec<RemoteCard>,
}

#[derive(Deserialize)]
struct RemoteCard {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arcana: Option<String>,
    #[serde(default)]
    suit: Option<String>,
    #[serde(default)]
    img: Option<String>,
}

/// Maps the upstream payload to cards, numbering them in upstream order
///
/// ### Errors
///
/// Returns an error if the payload is not an object with a `cards` list
pub fn map_remote_dataset(payload: &[u8]) -> Result<Vec<Card>, SyncError> {
    let dataset: RemoteDataset = serde_json::from_slice(payload)
        .map_err(|e| SyncError::Invalid(format!("expected an object with a 'cards' list: {}", e)))?;

    Ok(dataset
        .cards
        .into_iter()
        .enumerate()
        .map(|(idx, c)| {
            let image_url = c.img.filter(|i| !i.is_empty()).map(|img| format!("{}{}", CARDS_BASE_URL, img));
            Card::new_with_fields(
                idx as i32,
                c.name.unwrap_or_default(),
                c.arcana.unwrap_or_default(),
                c.suit,
                image_url,
                None,
                None,
            )
        })
        .collect())
}

/// Checks a dataset before it replaces the local copy
///
/// ### Errors
///
/// Returns an error if there are fewer than 78 cards, duplicate ids, an
/// empty name or an arcana other than major/minor.
pub fn validate_dataset(cards: &[Card]) -> Result<(), SyncError> {
    if cards.len() < EXPECTED_CARDS {
        return Err(SyncError::Invalid(format!(
            "expected at least {} cards, got {}",
            EXPECTED_CARDS,
            cards.len()
        )));
    }

    let dups = duplicate_ids(cards);
    if !dups.is_empty() {
        return Err(SyncError::Invalid(format!("duplicate card ids: {:?}", dups)));
    }

    for card in cards {
        if card.get_name().trim().is_empty() {
            return Err(SyncError::Invalid(format!("card {} has no name", card.get_id())));
        }
        if !ARCANA.contains(&card.get_arcana()) {
            return Err(SyncError::Invalid(format!(
                "card {} has invalid arcana '{}'",
                card.get_id(),
                card.get_arcana()
            )));
        }
    }
    Ok(())
}

/// Downloads and maps the upstream dataset
#[instrument(skip(client))]
pub async fn fetch_dataset(client: &Client) -> Result<Vec<Card>, SyncError> {
    let payload = fetch_bytes(client, DATASET_URL).await?;
    let cards = map_remote_dataset(&payload)?;
    info!("Fetched {} cards", cards.len());
    Ok(cards)
}

/// Reads a local dataset file
pub fn read_dataset(path: &Path) -> Result<Vec<Card>, SyncError> {
    let content = std::fs::read(path).map_err(|e| SyncError::io(path, e))?;
    Ok(serde_json::from_slice(&content)?)
}

/// Writes the dataset as pretty-printed JSON
pub fn write_dataset(path: &Path, cards: &[Card]) -> Result<(), SyncError> {
    let json = serde_json::to_vec_pretty(cards)?;
    write_file(path, &json)
}
