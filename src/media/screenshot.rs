use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;

/// URL path prefix screenshots are served under.
pub const SCREENSHOTS_ROUTE: &str = "/screenshots";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SavedScreenshot {
    pub filename: String,
    pub url: String,
}

/// `screenshot_<YYYYmmdd_HHMMSS>_<8 hex>.jpg`. Unique enough for realistic
/// request rates, not a cryptographic guarantee.
pub fn screenshot_filename(now: DateTime<Local>) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("screenshot_{}_{}.jpg", now.format("%Y%m%d_%H%M%S"), &id[..8])
}

pub fn screenshot_url(base_url: &str, filename: &str) -> String {
    format!("{}{}/{}", base_url.trim_end_matches('/'), SCREENSHOTS_ROUTE, filename)
}

/// Write `bytes` as a new screenshot under `dir`, creating it if needed.
pub async fn save_screenshot(dir: &Path, base_url: &str, bytes: &[u8]) -> Result<SavedScreenshot> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create screenshots directory {}", dir.display()))?;
    let filename = screenshot_filename(Local::now());
    let path = dir.join(&filename);
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("Failed to write screenshot {}", path.display()))?;
    let url = screenshot_url(base_url, &filename);
    Ok(SavedScreenshot { filename, url })
}
