use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use reqwest::Client;
use tracing::{info, instrument, warn};

use super::{CacheReport, SyncError, card_image_path, fetch_bytes, write_file};
use crate::deck::EXPECTED_CARDS;

const FILE_BASE_URL: &str = "https://archive.org/download/rider-waite-tarot/";

/// Default JPEG quality for converted images
pub const DEFAULT_QUALITY: u8 = 85;

const MAJOR_NAMES: [&str; 22] = [
    "fool", "magician", "priestess", "empress", "emperor", "hierophant", "lovers", "chariot", "strength", "hermit",
    "fortune", "justice", "hanged", "death", "temperance", "devil", "tower", "star", "moon", "sun", "judgement",
    "world",
];

/// Suit name and the id of its ace in the dataset
const SUITS: [(&str, i32); 4] = [("wands", 50), ("cups", 22), ("swords", 36), ("pentacles", 64)];

const RANKS: [&str; 14] = [
    "ace", "2", "3", "4", "5", "6", "7", "8", "9", "10", "page", "knight", "queen", "king",
];

/// Archive.org file name of a card, `None` for ids outside the deck
pub fn archive_filename(id: i32) -> Option<String> {
    if let Some(name) = usize::try_from(id).ok().and_then(|i| MAJOR_NAMES.get(i)) {
        return Some(format!("major_arcana_{}.png", name));
    }
    SUITS.iter().find_map(|(suit, start)| {
        let rank = RANKS.get(usize::try_from(id - start).ok()?)?;
        Some(format!("minor_arcana_{}_{}.png", suit, rank))
    })
}

/// Re-encodes any supported image as an RGB JPEG
pub fn to_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>, SyncError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&rgb)?;
    Ok(out.into_inner())
}

async fn cache_one(client: &Client, file: &str, dest: &Path, quality: u8) -> Result<(), SyncError> {
    let png = fetch_bytes(client, &format!("{}{}", FILE_BASE_URL, file)).await?;
    let jpeg = to_jpeg(&png, quality)?;
    write_file(dest, &jpeg)
}

/// Caches all 78 public-domain scans from archive.org as JPEG
#[instrument(skip(client))]
pub async fn cache_archive_images(client: &Client, out_dir: &Path, force: bool, quality: u8) -> CacheReport {
    let mut report = CacheReport::new(out_dir);

    for id in 0..EXPECTED_CARDS as i32 {
        let dest = card_image_path(out_dir, id);
        if dest.exists() && !force {
            report.skipped += 1;
            continue;
        }
        let Some(file) = archive_filename(id) else {
            report.failed += 1;
            continue;
        };

        match cache_one(client, &file, &dest, quality).await {
            Ok(()) => report.downloaded += 1,
            Err(e) => {
                warn!(card_id = id, "Failed to cache {}: {}", file, e);
                report.failed += 1;
            }
        }
    }

    info!("Archive cache: {}", report);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    #[test]
    fn test_archive_filename() {
        assert_eq!(archive_filename(0).as_deref(), Some("major_arcana_fool.png"));
        assert_eq!(archive_filename(21).as_deref(), Some("major_arcana_world.png"));
        assert_eq!(archive_filename(22).as_deref(), Some("minor_arcana_cups_ace.png"));
        assert_eq!(archive_filename(49).as_deref(), Some("minor_arcana_swords_king.png"));
        assert_eq!(archive_filename(50).as_deref(), Some("minor_arcana_wands_ace.png"));
        assert_eq!(archive_filename(77).as_deref(), Some("minor_arcana_pentacles_king.png"));
        assert!(archive_filename(78).is_none());
        assert!(archive_filename(-1).is_none());
    }

    #[test]
    fn test_every_card_has_an_archive_file() {
        for id in 0..78 {
            assert!(archive_filename(id).is_some(), "missing file for {}", id);
        }
    }

    #[test]
    fn test_to_jpeg_converts_png() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([200, 10, 10, 128]));
        let mut png = Cursor::new(Vec::new());
        img.write_to(&mut png, ImageFormat::Png).unwrap();

        let jpeg = to_jpeg(png.get_ref(), DEFAULT_QUALITY).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_to_jpeg_rejects_garbage() {
        assert!(matches!(to_jpeg(b"not an image", DEFAULT_QUALITY), Err(SyncError::Image(_))));
    }
}
