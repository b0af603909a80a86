use std::path::Path;

use reqwest::Client;
use tracing::{info, instrument, warn};

use super::{CacheReport, card_image_path, download};
use crate::models::Card;

/// Caches the images referenced by the dataset's `image_url`s
///
/// Cards without a remote URL are skipped, as are cards already cached
/// unless `force` is set. Local `/static/..` URLs are skipped too.
#[instrument(skip(client, cards), fields(cards = cards.len()))]
pub async fn cache_dataset_images(client: &Client, cards: &[Card], out_dir: &Path, force: bool) -> CacheReport {
    let mut report = CacheReport::new(out_dir);

    for card in cards {
        let Some(url) = card.get_image_url().filter(|u| u.starts_with("http")) else {
            report.skipped += 1;
            continue;
        };

        let dest = card_image_path(out_dir, card.get_id());
        match download(client, url, &dest, force).await {
            Ok(true) => report.downloaded += 1,
            Ok(false) => report.skipped += 1,
            Err(e) => {
                warn!(card_id = card.get_id(), "Failed to cache image: {}", e);
                report.failed += 1;
            }
        }
    }

    info!("Image cache: {}", report);
    report
}
