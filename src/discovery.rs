// Transcript discovery under a root directory by glob pattern.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default transcript glob, relative to the root directory.
pub const DEFAULT_TRANSCRIPT_PATTERN: &str = "**/*.txt";

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Glob relative to the root, e.g. `**/*.txt` or `calls/*/transcript.txt`
    pub pattern: String,
    /// Abort on the first unreadable directory entry instead of recording it
    pub fail_fast: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_TRANSCRIPT_PATTERN.to_string(),
            fail_fast: false,
        }
    }
}

/// A matched path, with the reason it cannot be processed if any
#[derive(Debug, Clone)]
pub struct TranscriptCandidate {
    pub path: PathBuf,
    pub error: Option<String>,
}

impl TranscriptCandidate {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Find transcripts under `root_dir` matching `config.pattern`, sorted by path.
///
/// Ledger outputs (`*_redaction.json`) never match a `.txt` pattern, so
/// re-running over the same tree does not pick up its own output.
pub async fn discover_transcripts(root_dir: impl AsRef<Path>, config: &DiscoveryConfig) -> Result<Vec<TranscriptCandidate>> {
    let root = root_dir.as_ref().to_path_buf();
    let config = config.clone();

    // glob walks the filesystem synchronously
    let candidates = tokio::task::spawn_blocking(move || scan(&root, &config))
        .await
        .context("Transcript discovery task failed")??;

    let invalid = candidates.iter().filter(|c| !c.is_valid()).count();
    if invalid > 0 {
        warn!("Found {} matched paths that cannot be processed", invalid);
    }
    info!(valid = candidates.len() - invalid, invalid, "transcript discovery complete");
    Ok(candidates)
}

fn scan(root: &Path, config: &DiscoveryConfig) -> Result<Vec<TranscriptCandidate>> {
    // the root may contain glob metacharacters; only the pattern is interpreted
    let escaped_root = glob::Pattern::escape(&root.display().to_string());
    let full_pattern = format!("{}/{}", escaped_root.trim_end_matches('/'), config.pattern);
    debug!(pattern = %full_pattern, "scanning for transcripts");

    let entries = glob::glob(&full_pattern)
        .with_context(|| format!("Invalid transcript pattern {}", config.pattern))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let candidate = match entry {
            Ok(path) if path.is_file() => TranscriptCandidate { path, error: None },
            Ok(path) => {
                let error = format!("Path is not a file: {}", path.display());
                TranscriptCandidate { path, error: Some(error) }
            }
            Err(e) if config.fail_fast => {
                return Err(anyhow::anyhow!("Cannot access {}: {}", e.path().display(), e.error()));
            }
            Err(e) => TranscriptCandidate {
                path: e.path().to_path_buf(),
                error: Some(format!("Cannot access {}: {}", e.path().display(), e.error())),
            },
        };
        candidates.push(candidate);
    }

    candidates.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(candidates)
}
