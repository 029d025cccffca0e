use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// A face image parked on disk for the analyzer.
///
/// Each upload gets its own file; it is removed on `close` or when dropped.
pub struct TempImage {
    file: NamedTempFile,
}

impl TempImage {
    pub async fn write(dir: &Path, bytes: Vec<u8>, original_name: Option<&str>) -> Result<Self> {
        let dir = dir.to_path_buf();
        let suffix = format!(".{}", image_extension(original_name));
        tokio::task::spawn_blocking(move || -> Result<Self> {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create temp directory {}", dir.display()))?;
            let mut file = tempfile::Builder::new()
                .prefix("face_")
                .suffix(&suffix)
                .tempfile_in(&dir)
                .context("Failed to create temporary image")?;
            file.write_all(&bytes).context("Failed to write temporary image")?;
            file.flush()?;
            Ok(Self { file })
        })
        .await
        .context("Temporary image task failed")?
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn close(self) -> std::io::Result<()> {
        self.file.close()
    }
}

/// Extension for the temporary copy; the analyzer sniffs content, this only
/// keeps the name recognisable. Anything odd falls back to `jpg`.
fn image_extension(original_name: Option<&str>) -> String {
    original_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "jpg".to_string())
}
