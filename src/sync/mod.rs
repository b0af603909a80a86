//! Offline dataset and image tooling
//!
//! Used by `tarot-cli data` and `tarot-cli images`; nothing here runs on the
//! request path. Images are written as `{id:02}.jpg` under the output
//! directory, which is where the deck loader looks for them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::debug;

pub mod archive;
pub mod commons;
pub mod dataset;
pub mod images;

const USER_AGENT: &str = concat!("tarot-api/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image conversion failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid dataset: {0}")]
    Invalid(String),
}

impl SyncError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Outcome counts of an image caching run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub out_dir: PathBuf,
}

impl CacheReport {
    pub fn new(out_dir: &Path) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for CacheReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "downloaded={} skipped={} failed={} -> {}",
            self.downloaded,
            self.skipped,
            self.failed,
            self.out_dir.display()
        )
    }
}

/// HTTP client shared by the sync commands
pub fn http_client(timeout: Duration) -> Result<Client, SyncError> {
    Ok(Client::builder().user_agent(USER_AGENT).timeout(timeout).build()?)
}

/// Local cache path of a card image
pub fn card_image_path(out_dir: &Path, id: i32) -> PathBuf {
    out_dir.join(format!("{:02}.jpg", id))
}

/// Fetches a URL and returns the body, failing on non-success statuses
pub async fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>, SyncError> {
    debug!(url, "Downloading");
    let bytes = client.get(url).send().await?.error_for_status()?.bytes().await?;
    Ok(bytes.to_vec())
}

/// Writes bytes to `dest`, creating parent directories
pub fn write_file(dest: &Path, bytes: &[u8]) -> Result<(), SyncError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
    }
    std::fs::write(dest, bytes).map_err(|e| SyncError::io(dest, e))
}

/// Downloads `url` into `dest`
///
/// Returns `false` without downloading when `dest` exists and `overwrite` is
/// not set.
pub async fn download(client: &Client, url: &str, dest: &Path, overwrite: bool) -> Result<bool, SyncError> {
    if dest.exists() && !overwrite {
        return Ok(false);
    }
    let bytes = fetch_bytes(client, url).await?;
    write_file(dest, &bytes)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_image_path_is_zero_padded() {
        assert_eq!(card_image_path(Path::new("static/cards"), 7), PathBuf::from("static/cards/07.jpg"));
        assert_eq!(card_image_path(Path::new("out"), 77), PathBuf::from("out/77.jpg"));
    }

    #[test]
    fn test_report_display() {
        let mut report = CacheReport::new(Path::new("static/cards"));
        report.downloaded = 3;
        report.skipped = 1;
        assert_eq!(report.to_string(), "downloaded=3 skipped=1 failed=0 -> static/cards");
        assert!(report.is_success());

        report.failed = 1;
        assert!(!report.is_success());
    }

    #[test]
    fn test_write_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a/b/00.jpg");
        write_file(&dest, b"jpg").unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"jpg");
    }

    #[tokio::test]
    async fn test_download_skips_existing_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("00.jpg");
        std::fs::write(&dest, b"cached").unwrap();

        let client = http_client(Duration::from_secs(1)).unwrap();
        // The URL is never requested because the file already exists
        let changed = download(&client, "http://127.0.0.1:9/never", &dest, false).await.unwrap();
        assert!(!changed);
        assert_eq!(std::fs::read(&dest).unwrap(), b"cached");
    }
}
