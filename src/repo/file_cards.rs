use std::sync::Arc;

use anyhow::Result;
use tracing::instrument;

use super::CardRepository;
use crate::deck::Deck;
use crate::models::Card;

/// Serves cards straight from the loaded dataset
pub struct FileCardRepository {
    deck: Arc<Deck>,
}

impl FileCardRepository {
    pub fn new(deck: Arc<Deck>) -> Self {
        Self { deck }
    }
}

impl CardRepository for FileCardRepository {
    #[instrument(skip(self))]
    fn list_cards(&self) -> Result<Vec<Card>> {
        Ok(self.deck.cards().to_vec())
    }

    #[instrument(skip(self))]
    fn get_card(&self, id: i32) -> Result<Option<Card>> {
        Ok(self.deck.get(id).cloned())
    }

    fn catalogue_etag(&self) -> Result<String> {
        Ok(self.deck.etag().to_string())
    }
}
