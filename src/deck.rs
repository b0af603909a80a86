use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::models::{Card, deserialize_meanings};

/// Number of cards in a complete tarot deck
pub const EXPECTED_CARDS: usize = 78;

/// Languages that may ship a `meanings.{lang}.json` file next to the dataset
const MEANING_LANGS: [&str; 3] = ["ko", "en", "ja"];

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("deck json must be a list of cards")]
    NotAList,
    #[error("duplicate card id {0}")]
    DuplicateId(i32),
}

/// Where and how to load the deck from
#[derive(Debug, Clone)]
pub struct DeckOptions {
    pub data_path: PathBuf,
    pub meanings_path: Option<PathBuf>,
    pub static_dir: PathBuf,
    pub prefer_local_images: bool,
}

impl DeckOptions {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            meanings_path: None,
            static_dir: PathBuf::from("static"),
            prefer_local_images: true,
        }
    }
}

/// Upright and reversed keywords for one card
#[derive(Debug, Clone, Default, Deserialize)]
struct MeaningEntry {
    #[serde(default, deserialize_with = "deserialize_meanings")]
    upright: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_meanings")]
    reversed: Option<Vec<String>>,
}

impl MeaningEntry {
    fn get(&self, is_reversed: bool) -> Option<&[String]> {
        let values = if is_reversed { &self.reversed } else { &self.upright };
        values.as_deref().filter(|v| !v.is_empty())
    }
}

/// The loaded card dataset with its per-language meanings
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
    index: HashMap<i32, usize>,
    meanings_by_lang: HashMap<String, HashMap<i32, MeaningEntry>>,
    etag: String,
}

impl Deck {
    /// Loads the dataset and everything layered on top of it
    ///
    /// Steps, in order: parse the card list, reject duplicate ids, point
    /// `image_url` at locally cached images, merge the single meanings file,
    /// preload `meanings.{lang}.json` from the dataset directory and compute
    /// the ETag. Meanings files that fail to load are logged and skipped.
    ///
    /// ### Errors
    ///
    /// Returns an error if the dataset cannot be read, is not a JSON list of
    /// cards or contains the same id twice.
    #[instrument(skip(options), fields(data_path = %options.data_path.display()))]
    pub fn load(options: &DeckOptions) -> Result<Self, DeckError> {
        let mut cards = read_cards(&options.data_path)?;

        if cards.len() != EXPECTED_CARDS {
            warn!("Deck has {} cards (expected {})", cards.len(), EXPECTED_CARDS);
        }

        if options.prefer_local_images {
            apply_local_images(&mut cards, &options.static_dir);
        }

        if let Some(meanings_path) = &options.meanings_path {
            merge_meanings_file(&mut cards, meanings_path);
        }

        let mut deck = Self::from_cards(cards)?;

        let meanings_dir = options
            .data_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        deck.preload_lang_meanings(&meanings_dir);

        info!("Loaded deck with {} cards", deck.cards.len());
        Ok(deck)
    }

    /// Builds a deck from already parsed cards, ordered by id
    pub fn from_cards(mut cards: Vec<Card>) -> Result<Self, DeckError> {
        cards.sort_by_key(Card::get_id);
        let mut index = HashMap::with_capacity(cards.len());
        for (pos, card) in cards.iter().enumerate() {
            if index.insert(card.get_id(), pos).is_some() {
                return Err(DeckError::DuplicateId(card.get_id()));
            }
        }

        let etag = compute_etag(&cards);

        Ok(Self {
            cards,
            index,
            meanings_by_lang: HashMap::new(),
            etag,
        })
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, id: i32) -> Option<&Card> {
        self.index.get(&id).map(|&pos| &self.cards[pos])
    }

    /// Weak validator for the card listing
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Languages with a loaded meanings file
    pub fn meaning_languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = self.meanings_by_lang.keys().map(String::as_str).collect();
        langs.sort_unstable();
        langs
    }

    /// Meanings for a card in the requested language
    ///
    /// Falls back through other languages and finally to the meanings
    /// embedded in the dataset.
    pub fn meanings(&self, id: i32, lang: &str, is_reversed: bool) -> Option<&[String]> {
        let lang = lang.trim().to_lowercase();

        let found = fallback_chain(&lang)
            .iter()
            .filter_map(|code| self.meanings_by_lang.get(code.as_str()))
            .filter_map(|by_id| by_id.get(&id))
            .find_map(|entry| entry.get(is_reversed));

        found.or_else(|| {
            self.get(id)
                .and_then(|card| card.meanings_for(is_reversed))
                .filter(|m| !m.is_empty())
        })
    }

    fn preload_lang_meanings(&mut self, dir: &Path) {
        for lang in MEANING_LANGS {
            let path = dir.join(format!("meanings.{}.json", lang));
            if !path.exists() {
                continue;
            }
            match read_meanings(&path) {
                Ok(entries) => {
                    info!("Loaded meanings for {}: {} cards", lang, entries.len());
                    self.meanings_by_lang.insert(lang.to_string(), entries);
                }
                Err(e) => warn!("Failed to load meanings file for {}: {}", lang, e),
            }
        }
    }
}

fn fallback_chain(lang: &str) -> Vec<String> {
    let chain: Vec<&str> = if lang.starts_with("zh") {
        vec![lang, "en", "ko"]
    } else {
        match lang {
            "ja" => vec!["ja", "en", "ko"],
            "ko" => vec!["ko", "en"],
            "en" => vec!["en", "ko"],
            other => vec![other, "en", "ko"],
        }
    };
    chain.into_iter().map(str::to_string).collect()
}

fn read_json(path: &Path) -> Result<serde_json::Value, DeckError> {
    let content = fs::read_to_string(path).map_err(|source| DeckError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| DeckError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn read_cards(path: &Path) -> Result<Vec<Card>, DeckError> {
    let value = read_json(path)?;
    if !value.is_array() {
        return Err(DeckError::NotAList);
    }
    serde_json::from_value(value).map_err(|source| DeckError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a `{id: {upright, reversed}}` file, skipping keys that are not ids
fn read_meanings(path: &Path) -> Result<HashMap<i32, MeaningEntry>, DeckError> {
    let value = read_json(path)?;
    let raw: HashMap<String, serde_json::Value> =
        serde_json::from_value(value).map_err(|source| DeckError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(raw
        .into_iter()
        .filter_map(|(key, val)| {
            let id = key.trim().parse::<i32>().ok()?;
            let entry = serde_json::from_value::<MeaningEntry>(val).ok()?;
            Some((id, entry))
        })
        .collect())
}

fn apply_local_images(cards: &mut [Card], static_dir: &Path) {
    let mut applied = 0;
    for card in cards.iter_mut() {
        let file_name = format!("{:02}.jpg", card.get_id());
        if static_dir.join("cards").join(&file_name).exists() {
            card.set_image_url(Some(format!("/static/cards/{}", file_name)));
            applied += 1;
        }
    }
    if applied > 0 {
        info!("Using {} locally cached card images", applied);
    }
}

fn merge_meanings_file(cards: &mut [Card], path: &Path) {
    if !path.exists() {
        return;
    }
    let entries = match read_meanings(path) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to load meanings file: {}", e);
            return;
        }
    };

    let mut merged = 0;
    for card in cards.iter_mut() {
        let Some(entry) = entries.get(&card.get_id()) else {
            continue;
        };
        if let Some(upright) = &entry.upright {
            card.set_upright_meaning(Some(upright.clone()));
        }
        if let Some(reversed) = &entry.reversed {
            card.set_reversed_meaning(Some(reversed.clone()));
        }
        merged += 1;
    }
    info!("Merged meanings for {} cards from {}", merged, path.display());
}

/// Weak ETag over the serialized card list
pub fn compute_etag(cards: &[Card]) -> String {
    let mut hasher = Sha256::new();
    match serde_json::to_vec(cards) {
        Ok(bytes) => hasher.update(&bytes),
        Err(_) => {
            let ids: Vec<String> = cards.iter().map(|c| c.get_id().to_string()).collect();
            hasher.update(ids.join(",").as_bytes());
        }
    }
    format!("W/\"{}\"", hex::encode(hasher.finalize()))
}

/// Ids that appear more than once, for dataset validation reports
pub fn duplicate_ids(cards: &[Card]) -> Vec<i32> {
    let mut seen = HashSet::new();
    let mut dups: Vec<i32> = cards
        .iter()
        .map(Card::get_id)
        .filter(|id| !seen.insert(*id))
        .collect();
    dups.sort_unstable();
    dups.dedup();
    dups
}

#[cfg(test)]
mod tests;
