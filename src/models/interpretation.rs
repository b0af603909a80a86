use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Card;

/// Per-role analysis produced by the LLM: role -> {card, orientation, analysis}
pub type Sections = BTreeMap<String, BTreeMap<String, String>>;

/// Interpretation of a reading, either computed locally or by the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub id: String,
    pub lang: String,
    pub summary: String,
    pub positions: Vec<String>,
    pub advices: Vec<String>,
    pub llm_used: bool,
    #[serde(default)]
    pub sections: Option<Sections>,
}

/// A drawn card enriched with its role and the meanings used for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardWithContext {
    pub position: i32,
    pub role: String,
    pub is_reversed: bool,
    pub used_meanings: Option<Vec<String>>,
    pub card: Card,
    #[serde(default)]
    pub llm_detail: Option<String>,
}

/// Response body for `GET /reading/{id}/result`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullReadingResult {
    pub id: String,
    pub question: String,
    pub lang: String,
    pub items: Vec<CardWithContext>,
    pub summary: String,
    pub advices: Vec<String>,
    pub llm_used: bool,
    #[serde(default)]
    pub sections: Option<Sections>,
}

/// Response body for `GET /daily`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFortune {
    /// UTC date in ISO format
    pub date: String,
    pub lang: String,
    pub card: CardWithContext,
    pub summary: String,
    pub llm_used: bool,
}
