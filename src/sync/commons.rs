use std::path::Path;

use reqwest::Client;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::{CacheReport, SyncError, card_image_path, download};
use crate::models::Card;

const COMMONS_API: &str = "https://commons.wikimedia.org/w/api.php";

/// Redirects to the original upload of a Commons file
const FILE_PATH_URL: &str = "https://commons.wikimedia.org/wiki/Special:FilePath/";

/// Rider-Waite-Smith major arcana files on Wikimedia Commons
pub const MAJOR_FILES: [(i32, &str); 22] = [
    (0, "RWS_Tarot_00_Fool.jpg"),
    (1, "RWS_Tarot_01_Magician.jpg"),
    (2, "RWS_Tarot_02_High_Priestess.jpg"),
    (3, "RWS_Tarot_03_Empress.jpg"),
    (4, "RWS_Tarot_04_Emperor.jpg"),
    (5, "RWS_Tarot_05_Hierophant.jpg"),
    (6, "RWS_Tarot_06_Lovers.jpg"),
    (7, "RWS_Tarot_07_Chariot.jpg"),
    (8, "RWS_Tarot_08_Strength.jpg"),
    (9, "RWS_Tarot_09_Hermit.jpg"),
    (10, "RWS_Tarot_10_Wheel_of_Fortune.jpg"),
    (11, "RWS_Tarot_11_Justice.jpg"),
    (12, "RWS_Tarot_12_Hanged_Man.jpg"),
    (13, "RWS_Tarot_13_Death.jpg"),
    (14, "RWS_Tarot_14_Temperance.jpg"),
    (15, "RWS_Tarot_15_Devil.jpg"),
    (16, "RWS_Tarot_16_Tower.jpg"),
    (17, "RWS_Tarot_17_Star.jpg"),
    (18, "RWS_Tarot_18_Moon.jpg"),
    (19, "RWS_Tarot_19_Sun.jpg"),
    (20, "RWS_Tarot_20_Judgement.jpg"),
    (21, "RWS_Tarot_21_World.jpg"),
];

/// Downloads the 22 major arcana from their well-known Commons file names
///
/// Existing files are replaced. Minor arcana are left to `map_and_cache`.
#[instrument(skip(client))]
pub async fn fetch_major_arcana(client: &Client, out_dir: &Path) -> CacheReport {
    let mut report = CacheReport::new(out_dir);

    for (id, file) in MAJOR_FILES {
        let url = format!("{}{}", FILE_PATH_URL, file);
        match download(client, &url, &card_image_path(out_dir, id), true).await {
            Ok(_) => report.downloaded += 1,
            Err(e) => {
                warn!(card_id = id, "Failed to fetch {}: {}", file, e);
                report.failed += 1;
            }
        }
    }

    info!("Commons major arcana: {}", report);
    report
}

fn meta_value(extmetadata: &Value, key: &str) -> String {
    match &extmetadata[key] {
        Value::Object(obj) => obj.get("value").and_then(Value::as_str).unwrap_or_default().to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

/// Whether Commons metadata marks a file as public domain
pub fn is_public_domain(extmetadata: &Value) -> bool {
    let licensed_pd = ["LicenseShortName", "License", "UsageTerms"].iter().any(|key| {
        let value = meta_value(extmetadata, key).to_lowercase();
        value.contains("public domain") || value.starts_with("pd-")
    });
    licensed_pd || meta_value(extmetadata, "LicenseUrl").contains("/publicdomain/")
}

/// First public-domain image URL among Commons search results
pub fn first_public_domain_url(response: &Value) -> Option<String> {
    let pages = response["query"]["pages"].as_object()?;
    pages.values().find_map(|page| {
        let info = page["imageinfo"].get(0)?;
        let url = info["url"].as_str()?;
        is_public_domain(&info["extmetadata"]).then(|| url.to_string())
    })
}

/// Searches Commons for a public-domain Rider-Waite image of a card
#[instrument(skip(client))]
pub async fn search_image_url(client: &Client, card_name: &str) -> Result<Option<String>, SyncError> {
    for query in [format!("RWS Tarot {}", card_name), format!("Rider-Waite {}", card_name)] {
        let response: Value = client
            .get(COMMONS_API)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("generator", "search"),
                ("gsrsearch", query.as_str()),
                ("gsrnamespace", "6"),
                ("gsrlimit", "5"),
                ("prop", "imageinfo"),
                ("iiprop", "url|extmetadata"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(url) = first_public_domain_url(&response) {
            return Ok(Some(url));
        }
    }
    Ok(None)
}

/// Looks up every card on Commons by name and caches the image found
#[instrument(skip(client, cards), fields(cards = cards.len()))]
pub async fn map_and_cache(client: &Client, cards: &[Card], out_dir: &Path, force: bool) -> CacheReport {
    let mut report = CacheReport::new(out_dir);

    for card in cards {
        let dest = card_image_path(out_dir, card.get_id());
        if dest.exists() && !force {
            report.skipped += 1;
            continue;
        }

        let result = match search_image_url(client, card.get_name()).await {
            Ok(Some(url)) => download(client, &url, &dest, true).await.map(|_| true),
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        };
        match result {
            Ok(true) => report.downloaded += 1,
            Ok(false) => {
                warn!(card_id = card.get_id(), "No public domain image found for {}", card.get_name());
                report.failed += 1;
            }
            Err(e) => {
                warn!(card_id = card.get_id(), "Commons lookup failed: {}", e);
                report.failed += 1;
            }
        }
    }

    info!("Commons mapping: {}", report);
    report
}
