use serde::{Deserialize, Deserializer, Serialize};

/// Represents a single tarot card
///
/// Cards are identified by a small integer that is stable across the file
/// and database backends, so switching storage never changes what clients see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Unique identifier for the card (0..=77 for a full deck)
    id: i32,

    /// Display name, e.g. "The Fool"
    name: String,

    /// "Major Arcana" or "Minor Arcana"
    arcana: String,

    /// Suit for minor arcana cards
    #[serde(default)]
    suit: Option<String>,

    /// Remote URL or local `/static/cards/..` path of the card image
    #[serde(default)]
    image_url: Option<String>,

    /// Keywords for the upright orientation
    #[serde(default, deserialize_with = "deserialize_meanings")]
    upright_meaning: Option<Vec<String>>,

    /// Keywords for the reversed orientation
    #[serde(default, deserialize_with = "deserialize_meanings")]
    reversed_meaning: Option<Vec<String>>,
}

/// Wire shape of a meaning field: either a list of keywords or a single string
#[derive(Deserialize)]
#[serde(untagged)]
enum MeaningsRepr {
    List(Vec<String>),
    Single(String),
}

impl From<MeaningsRepr> for Vec<String> {
    fn from(repr: MeaningsRepr) -> Self {
        match repr {
            MeaningsRepr::List(list) => list,
            MeaningsRepr::Single(s) => vec![s],
        }
    }
}

/// Deserializes a meaning field that may be a list, a single string or null
pub(crate) fn deserialize_meanings<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = Option::<MeaningsRepr>::deserialize(deserializer)?;
    Ok(repr.map(Vec::from))
}

impl Card {
    /// Creates a new card without suit, image or meanings
    pub fn new(id: i32, name: impl Into<String>, arcana: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            arcana: arcana.into(),
            suit: None,
            image_url: None,
            upright_meaning: None,
            reversed_meaning: None,
        }
    }

    /// Creates a card with all fields specified
    pub fn new_with_fields(
        id: i32,
        name: String,
        arcana: String,
        suit: Option<String>,
        image_url: Option<String>,
        upright_meaning: Option<Vec<String>>,
        reversed_meaning: Option<Vec<String>>,
    ) -> Self {
        Self {
            id,
            name,
            arcana,
            suit,
            image_url,
            upright_meaning,
            reversed_meaning,
        }
    }

    /// Builder-style setter for the suit
    pub fn with_suit(mut self, suit: impl Into<String>) -> Self {
        self.suit = Some(suit.into());
        self
    }

    /// Builder-style setter for the image URL
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Builder-style setter for both meaning lists
    pub fn with_meanings(mut self, upright: Vec<String>, reversed: Vec<String>) -> Self {
        self.upright_meaning = Some(upright);
        self.reversed_meaning = Some(reversed);
        self
    }

    pub fn get_id(&self) -> i32 {
        self.id
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_arcana(&self) -> &str {
        &self.arcana
    }

    pub fn get_suit(&self) -> Option<&str> {
        self.suit.as_deref()
    }

    pub fn get_image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn set_image_url(&mut self, image_url: Option<String>) {
        self.image_url = image_url;
    }

    pub fn get_upright_meaning(&self) -> Option<&[String]> {
        self.upright_meaning.as_deref()
    }

    pub fn set_upright_meaning(&mut self, meanings: Option<Vec<String>>) {
        self.upright_meaning = meanings;
    }

    pub fn get_reversed_meaning(&self) -> Option<&[String]> {
        self.reversed_meaning.as_deref()
    }

    pub fn set_reversed_meaning(&mut self, meanings: Option<Vec<String>>) {
        self.reversed_meaning = meanings;
    }

    /// Returns the meanings for the given orientation, if any are recorded
    pub fn meanings_for(&self, is_reversed: bool) -> Option<&[String]> {
        if is_reversed {
            self.get_reversed_meaning()
        } else {
            self.get_upright_meaning()
        }
    }
}

/// Response body for `GET /cards`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardsResponse {
    pub total: usize,
    pub items: Vec<Card>,
}
