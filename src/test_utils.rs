use std::sync::Arc;

use proptest::prelude::*;

use crate::config::{Config, base_config};
use crate::deck::Deck;
use crate::llm::TextGenerator;
use crate::models::Card;
use crate::repo::{FileCardRepository, MemoryReadingRepository};
use crate::AppState;

const SUITS: [&str; 4] = ["Cups", "Swords", "Wands", "Pentacles"];

/// Builds `n` cards with distinct ids, names and meanings
///
/// The first 22 are major arcana, the rest are minor arcana spread over the
/// four suits, like a real deck.
pub fn sample_cards(n: usize) -> Vec<Card> {
    (0..n)
        .map(|i| {
            let id = i as i32;
            let upright = vec![format!("upright {}a", i), format!("upright {}b", i), format!("upright {}c", i), format!("upright {}d", i)];
            let reversed = vec![format!("reversed {}a", i), format!("reversed {}b", i)];
            if i < 22 {
                Card::new(id, format!("Major {}", i), "Major Arcana").with_meanings(upright, reversed)
            } else {
                let suit = SUITS[(i - 22) / 14 % SUITS.len()];
                Card::new(id, format!("{} of {}", (i - 22) % 14 + 1, suit), "Minor Arcana")
                    .with_suit(suit)
                    .with_meanings(upright, reversed)
            }
        })
        .collect()
}

/// A full 78-card deck without localized meaning files
pub fn sample_deck() -> Deck {
    Deck::from_cards(sample_cards(78)).unwrap()
}

/// Local configuration with generous rate limits
pub fn test_config() -> Config {
    let mut config = base_config();
    config.rate_limit_default = "1000/minute".to_string();
    config.rate_limit_health = "1000/second".to_string();
    config.rate_limit_cards = "1000/minute".to_string();
    config.rate_limit_reading_post = "1000/minute".to_string();
    config
}

/// Application state over the sample deck and in-memory readings
pub fn test_state_with(config: Config, llm: Option<Arc<dyn TextGenerator>>) -> AppState {
    let deck = Arc::new(sample_deck());
    AppState::new(
        config,
        deck.clone(),
        Arc::new(FileCardRepository::new(deck)),
        Arc::new(MemoryReadingRepository::new()),
        llm,
    )
    .unwrap()
}

pub fn test_state() -> AppState {
    test_state_with(test_config(), None)
}

/// Generates strings mixing ASCII, whitespace, Hangul and other scripts
pub fn arb_messy_string() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 _./:-]{0,24}",
        "\\PC{0,16}",
        "[ \t]{0,3}[가-힣]{1,8}[ \t]{0,3}",
        Just(String::new()),
    ]
}
