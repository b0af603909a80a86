use super::*;
use serde_json::json;
use std::fs::File;
use std::io::Write;
use tempfile::{TempDir, tempdir};

fn write_json(dir: &Path, name: &str, value: serde_json::Value) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    file.write_all(value.to_string().as_bytes()).unwrap();
    path
}

fn three_cards() -> serde_json::Value {
    json!([
        {"id": 0, "name": "The Fool", "arcana": "Major Arcana",
         "image_url": "https://example.com/m00.jpg",
         "upright_meaning": ["beginnings"], "reversed_meaning": ["recklessness"]},
        {"id": 1, "name": "The Magician", "arcana": "Major Arcana"},
        {"id": 22, "name": "Ace of Cups", "arcana": "Minor Arcana", "suit": "Cups"}
    ])
}

/// Creates `data/tarot-images.json` and an empty `static` dir in a temp root
fn dataset(value: serde_json::Value) -> (TempDir, DeckOptions) {
    let root = tempdir().unwrap();
    let data_dir = root.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::create_dir_all(root.path().join("static/cards")).unwrap();
    let data_path = write_json(&data_dir, "tarot-images.json", value);

    let options = DeckOptions {
        data_path,
        meanings_path: None,
        static_dir: root.path().join("static"),
        prefer_local_images: true,
    };
    (root, options)
}

#[test]
fn test_load_basic_dataset() {
    let (_root, options) = dataset(three_cards());
    let deck = Deck::load(&options).unwrap();

    assert_eq!(deck.len(), 3);
    assert_eq!(deck.get(22).unwrap().get_suit(), Some("Cups"));
    assert!(deck.get(5).is_none());
    assert!(deck.etag().starts_with("W/\""));
}

#[test]
fn test_load_rejects_non_list() {
    let (_root, options) = dataset(json!({"cards": []}));
    assert!(matches!(Deck::load(&options), Err(DeckError::NotAList)));
}

#[test]
fn test_load_rejects_duplicate_ids() {
    let (_root, options) = dataset(json!([
        {"id": 3, "name": "The Empress", "arcana": "Major Arcana"},
        {"id": 3, "name": "The Empress again", "arcana": "Major Arcana"}
    ]));
    assert!(matches!(Deck::load(&options), Err(DeckError::DuplicateId(3))));
}

#[test]
fn test_load_missing_file() {
    let options = DeckOptions::new("/nonexistent/tarot.json");
    assert!(matches!(Deck::load(&options), Err(DeckError::Io { .. })));
}

#[test]
fn test_local_images_override_remote_urls() {
    let (root, options) = dataset(three_cards());
    File::create(root.path().join("static/cards/00.jpg")).unwrap();

    let deck = Deck::load(&options).unwrap();
    assert_eq!(deck.get(0).unwrap().get_image_url(), Some("/static/cards/00.jpg"));
    assert_eq!(deck.get(1).unwrap().get_image_url(), None);

    let deck = Deck::load(&DeckOptions {
        prefer_local_images: false,
        ..options
    })
    .unwrap();
    assert_eq!(deck.get(0).unwrap().get_image_url(), Some("https://example.com/m00.jpg"));
}

#[test]
fn test_single_meanings_file_is_merged() {
    let (root, mut options) = dataset(three_cards());
    let path = write_json(
        root.path(),
        "meanings.json",
        json!({
            "1": {"upright": ["skill", "focus"], "reversed": "trickery"},
            "99": {"upright": ["ignored"]},
            "not-an-id": {"upright": ["ignored"]}
        }),
    );
    options.meanings_path = Some(path);

    let deck = Deck::load(&options).unwrap();
    let magician = deck.get(1).unwrap();
    assert_eq!(magician.get_upright_meaning().unwrap(), ["skill", "focus"]);
    assert_eq!(magician.get_reversed_meaning().unwrap(), ["trickery"]);
}

#[test]
fn test_broken_meanings_file_is_not_fatal() {
    let (root, mut options) = dataset(three_cards());
    let path = root.path().join("meanings.json");
    fs::write(&path, "{ not json").unwrap();
    options.meanings_path = Some(path);

    assert!(Deck::load(&options).is_ok());
}

#[test]
fn test_meanings_language_fallbacks() {
    let (root, options) = dataset(three_cards());
    let data_dir = root.path().join("data");
    write_json(
        &data_dir,
        "meanings.en.json",
        json!({"1": {"upright": ["skill"], "reversed": ["trickery"]}}),
    );
    write_json(
        &data_dir,
        "meanings.ko.json",
        json!({"1": {"upright": ["능력"], "reversed": []}, "22": {"upright": ["사랑"]}}),
    );

    let deck = Deck::load(&options).unwrap();
    assert_eq!(deck.meaning_languages(), vec!["en", "ko"]);

    // Direct hits
    assert_eq!(deck.meanings(1, "ko", false).unwrap(), ["능력"]);
    assert_eq!(deck.meanings(1, "en", false).unwrap(), ["skill"]);
    // Empty list in ko falls through to en
    assert_eq!(deck.meanings(1, "ko", true).unwrap(), ["trickery"]);
    // No ja or zh file: en first
    assert_eq!(deck.meanings(1, "ja", false).unwrap(), ["skill"]);
    assert_eq!(deck.meanings(1, "zh-TW", false).unwrap(), ["skill"]);
    // en misses card 22, falls back to ko
    assert_eq!(deck.meanings(22, "en", false).unwrap(), ["사랑"]);
    // Nothing in files: embedded meanings
    assert_eq!(deck.meanings(0, "en", true).unwrap(), ["recklessness"]);
    // Nothing anywhere
    assert!(deck.meanings(22, "en", true).is_none());
    assert!(deck.meanings(404, "en", false).is_none());
}

#[test]
fn test_etag_changes_with_content() {
    let a = Deck::from_cards(vec![Card::new(0, "The Fool", "Major Arcana")]).unwrap();
    let b = Deck::from_cards(vec![Card::new(0, "The Fool", "Major Arcana")]).unwrap();
    let c = Deck::from_cards(vec![Card::new(1, "The Magician", "Major Arcana")]).unwrap();

    assert_eq!(a.etag(), b.etag());
    assert_ne!(a.etag(), c.etag());
}

#[test]
fn test_etag_covers_cards_in_id_order() {
    let deck = Deck::from_cards(vec![
        Card::new(22, "Ace of Cups", "Minor Arcana"),
        Card::new(0, "The Fool", "Major Arcana"),
        Card::new(1, "The Magician", "Major Arcana"),
    ])
    .unwrap();

    let ids: Vec<i32> = deck.cards().iter().map(Card::get_id).collect();
    assert_eq!(ids, vec![0, 1, 22]);
    assert_eq!(deck.get(22).unwrap().get_name(), "Ace of Cups");
    assert_eq!(deck.etag(), compute_etag(deck.cards()));
}

#[test]
fn test_duplicate_ids_report() {
    let cards = vec![
        Card::new(1, "a", "Major Arcana"),
        Card::new(2, "b", "Major Arcana"),
        Card::new(1, "c", "Major Arcana"),
        Card::new(1, "d", "Major Arcana"),
    ];
    assert_eq!(duplicate_ids(&cards), vec![1]);
}
