use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::{info, warn};

use crate::incremental::generate_ledger_path;

/// Tracks transcripts whose ledger was written successfully, so an
/// interrupted batch can resume without redoing finished work.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct RestartLog {
    completed_files: HashSet<String>,
    /// Redaction set in force when the ledgers were written
    #[serde(default)]
    redact_entities: BTreeSet<String>,
    /// Seconds since the Unix epoch
    last_updated: u64,
}

impl RestartLog {
    /// Load the log under `root_dir`; a missing or unreadable log is empty.
    pub async fn load(root_dir: &Path) -> Self {
        let log_path = Self::get_log_path(root_dir);

        match fs::read_to_string(&log_path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring unreadable restart log {}: {}", log_path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub async fn save(&self, root_dir: &Path) -> Result<()> {
        let log_path = Self::get_log_path(root_dir);
        let content = serde_json::to_string_pretty(self)?;

        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&log_path, content).await?;
        Ok(())
    }

    pub fn is_completed(&self, file_path: &Path) -> bool {
        self.completed_files.contains(file_path.to_string_lossy().as_ref())
    }

    pub fn mark_completed(&mut self, file_path: &Path) {
        self.completed_files.insert(file_path.to_string_lossy().to_string());
        self.touch();
    }

    pub fn completed_count(&self) -> usize {
        self.completed_files.len()
    }

    /// Forget a file so the next run processes it again.
    pub fn mark_incomplete(&mut self, file_path: &Path) {
        if self.completed_files.remove(file_path.to_string_lossy().as_ref()) {
            self.touch();
        }
    }

    /// Forget completed files if they were redacted under a different
    /// redaction set. Returns true when the log was reset.
    pub fn reset_if_policy_changed<'a>(&mut self, redact_entities: impl IntoIterator<Item = &'a str>) -> bool {
        let current: BTreeSet<String> = redact_entities.into_iter().map(str::to_string).collect();
        if current == self.redact_entities {
            return false;
        }

        let reset = !self.completed_files.is_empty();
        if reset {
            info!(
                previous = ?self.redact_entities,
                current = ?current,
                "Redaction set changed, reprocessing all transcripts"
            );
            self.completed_files.clear();
        }
        self.redact_entities = current;
        self.touch();
        reset
    }

    /// Drop entries whose transcript or ledger no longer exists. Returns the dropped paths.
    pub fn verify_completed_files(&mut self) -> Vec<PathBuf> {
        let mut invalid_files = Vec::new();

        self.completed_files.retain(|file_path_str| {
            let file_path = PathBuf::from(file_path_str);
            let valid = file_path.exists() && generate_ledger_path(&file_path).exists();
            if !valid {
                invalid_files.push(file_path);
            }
            valid
        });

        invalid_files
    }

    fn get_log_path(root_dir: &Path) -> PathBuf {
        root_dir.join(".pii_ledger_restart.json")
    }

    fn touch(&mut self) {
        // a clock before the epoch leaves the previous timestamp in place
        if let Ok(elapsed) = SystemTime::now().duration_since(UNIX_EPOCH) {
            self.last_updated = elapsed.as_secs();
        }
    }
}

/// Whether a transcript needs (re)processing given the restart log and overwrite flag.
pub fn should_process_file(file_path: &Path, restart_log: &RestartLog, overwrite_all: bool) -> bool {
    if overwrite_all {
        return true;
    }

    // completed but with its ledger since removed: redo it
    !(restart_log.is_completed(file_path) && generate_ledger_path(file_path).exists())
}
