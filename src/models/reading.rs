use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Card;

/// One of the three piles the deck is split into before shuffling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupOrder {
    A,
    B,
    C,
}

impl GroupOrder {
    /// All groups in their natural order
    pub const ALL: [GroupOrder; 3] = [GroupOrder::A, GroupOrder::B, GroupOrder::C];

    /// Index of the group within the split deck
    pub fn index(self) -> usize {
        match self {
            GroupOrder::A => 0,
            GroupOrder::B => 1,
            GroupOrder::C => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GroupOrder::A => "A",
            GroupOrder::B => "B",
            GroupOrder::C => "C",
        }
    }
}

impl fmt::Display for GroupOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(GroupOrder::A),
            "B" | "b" => Ok(GroupOrder::B),
            "C" | "c" => Ok(GroupOrder::C),
            other => Err(format!("unknown group: {}", other)),
        }
    }
}

/// A card placed at a position of the spread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawnCard {
    /// Position in the spread, 1-based
    pub position: i32,
    pub is_reversed: bool,
    pub card: Card,
}

/// A completed reading as returned by the API
///
/// `id` is assigned by the reading repository when the reading is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: Option<String>,
    pub question: String,
    pub order: Vec<GroupOrder>,
    pub count: usize,
    pub items: Vec<DrawnCard>,
}

impl Reading {
    /// Creates an unsaved reading from drawn cards
    pub fn new(question: String, order: Vec<GroupOrder>, items: Vec<DrawnCard>) -> Self {
        Self {
            id: None,
            question,
            order,
            count: items.len(),
            items,
        }
    }

    /// Returns the reading ID, or an empty string for unsaved readings
    pub fn get_id(&self) -> String {
        self.id.clone().unwrap_or_default()
    }
}

/// Response body for share link creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLink {
    pub id: String,
    pub slug: String,
    pub path: String,
}

impl ShareLink {
    pub fn new(id: String, slug: String) -> Self {
        let path = format!("/share/{}", slug);
        Self { id, slug, path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_order_serde() {
        let order = vec![GroupOrder::C, GroupOrder::A, GroupOrder::B];
        let json = serde_json::to_string(&order).unwrap();
        assert_eq!(json, r#"["C","A","B"]"#);

        let parsed: Vec<GroupOrder> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, order);
    }

    #[test]
    fn test_group_order_from_str() {
        assert_eq!("b".parse::<GroupOrder>().unwrap(), GroupOrder::B);
        assert!("D".parse::<GroupOrder>().is_err());
    }

    #[test]
    fn test_reading_count_matches_items() {
        let items = vec![DrawnCard {
            position: 1,
            is_reversed: false,
            card: Card::new(0, "The Fool", "Major Arcana"),
        }];
        let reading = Reading::new("q".to_string(), GroupOrder::ALL.to_vec(), items);
        assert_eq!(reading.count, 1);
        assert_eq!(reading.get_id(), "");
    }

    #[test]
    fn test_share_link_path() {
        let link = ShareLink::new("abc".to_string(), "1700000000000-xYz123".to_string());
        assert_eq!(link.path, "/share/1700000000000-xYz123");
    }
}
