//! Repository module
//!
//! Storage behind the API. Cards come either from the loaded dataset file or
//! from Postgres; readings, cached interpretations and share links live in
//! memory or in Postgres. `USE_DB` selects the backend at startup.

use anyhow::Result;
use chrono::Utc;
use rand::Rng;

use crate::models::{Card, Interpretation, Reading};

mod file_cards;
mod memory;
mod pg;

pub use file_cards::FileCardRepository;
pub use memory::MemoryReadingRepository;
pub use pg::{PgCardRepository, PgReadingRepository};

/// Read access to the card catalogue
pub trait CardRepository: Send + Sync {
    /// Lists all cards ordered by id
    fn list_cards(&self) -> Result<Vec<Card>>;

    fn get_card(&self, id: i32) -> Result<Option<Card>>;

    /// Weak ETag of the list returned by [`CardRepository::list_cards`]
    fn catalogue_etag(&self) -> Result<String>;
}

/// Storage for readings and everything derived from them
pub trait ReadingRepository: Send + Sync {
    /// Stores a reading under a fresh id and returns it with the id set
    fn create(&self, reading: Reading) -> Result<Reading>;

    fn get(&self, id: &str) -> Result<Option<Reading>>;

    fn get_interpretation(&self, id: &str, lang: &str, style: &str, use_llm: bool) -> Result<Option<Interpretation>>;

    fn save_interpretation(&self, interpretation: &Interpretation, lang: &str, style: &str, use_llm: bool) -> Result<()>;

    fn get_details(&self, id: &str, lang: &str, use_llm: bool) -> Result<Option<Vec<String>>>;

    fn save_details(&self, id: &str, lang: &str, use_llm: bool, details: &[String]) -> Result<()>;

    /// Returns the share slug of a reading, creating it on first use
    fn create_share_slug(&self, id: &str) -> Result<String>;

    /// Returns the id of the reading a slug points to
    fn resolve_share_slug(&self, slug: &str) -> Result<Option<String>>;
}

const SLUG_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Generates a `{unix_millis}-{6 url-safe chars}` slug
pub fn new_share_slug() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| SLUG_ALPHABET[rng.random_range(0..SLUG_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}
