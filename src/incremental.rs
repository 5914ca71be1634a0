// Ledger files written next to each transcript, and the helpers to name and load them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::audit::RedactionResult;

/// Ledger path for a transcript: `call-17.txt` -> `call-17_redaction.json`.
pub fn generate_ledger_path(source_path: &Path) -> PathBuf {
    let mut ledger_path = source_path.to_path_buf();
    let file_stem = ledger_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    ledger_path.set_file_name(format!("{file_stem}_redaction.json"));
    ledger_path
}

/// Load a previously written ledger.
///
/// # Example
/// ```no_run
/// # async fn run() -> anyhow::Result<()> {
/// let result = pii_ledger::incremental::read_ledger("calls/call-17.txt").await?;
/// println!("{} entities redacted", result.redacted().count());
/// # Ok(())
/// # }
/// ```
pub async fn read_ledger<P: AsRef<Path>>(source_path: P) -> Result<RedactionResult> {
    let ledger_path = generate_ledger_path(source_path.as_ref());
    let content = tokio::fs::read_to_string(&ledger_path)
        .await
        .with_context(|| format!("Failed to read ledger {}", ledger_path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Malformed ledger {}", ledger_path.display()))
}

/// Write the ledger for `source_path`, replacing any previous one.
///
/// The file is written under a temporary name and renamed into place, so an
/// interrupted run never leaves a truncated ledger that looks complete.
pub async fn write_ledger<P: AsRef<Path>>(source_path: P, result: &RedactionResult) -> Result<PathBuf> {
    let ledger_path = generate_ledger_path(source_path.as_ref());
    let tmp_path = ledger_path.with_extension("json.tmp");

    let content = serde_json::to_string_pretty(result)?;
    tokio::fs::write(&tmp_path, content)
        .await
        .with_context(|| format!("Failed to write ledger {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, &ledger_path)
        .await
        .with_context(|| format!("Failed to move ledger into place at {}", ledger_path.display()))?;
    Ok(ledger_path)
}
