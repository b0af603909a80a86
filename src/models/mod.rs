//! Data models module
//!
//! This module defines the core data structures served by the API:
//! cards, readings and their interpretations.

mod card;
pub use card::{Card, CardsResponse};
pub(crate) use card::deserialize_meanings;

mod reading;
pub use reading::{DrawnCard, GroupOrder, Reading, ShareLink};

mod interpretation;
pub use interpretation::{CardWithContext, DailyFortune, FullReadingResult, Interpretation, Sections};
