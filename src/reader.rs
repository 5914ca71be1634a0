use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Read a whole UTF-8 transcript. Spans carry offsets into the full text, so
/// a transcript is never processed in pieces.
pub async fn read_transcript<P: AsRef<Path>>(file_path: P) -> Result<String> {
    let path = file_path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read file {}", path.display()))?;
    let bytes_read = bytes.len();

    let text = String::from_utf8(bytes).map_err(|e| {
        anyhow::anyhow!("Invalid UTF-8 in {} at byte {}", path.display(), e.utf8_error().valid_up_to())
    })?;
    debug!(path = %path.display(), bytes = bytes_read, "transcript read");
    Ok(text)
}

/// Read a single transcript from stdin.
pub async fn read_stdin() -> Result<String> {
    let mut text = String::new();
    tokio::io::stdin().read_to_string(&mut text).await?;
    Ok(text)
}
