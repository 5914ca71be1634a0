// Batch redaction of discovered transcripts with bounded concurrency,
// per-file stats, restart tracking and an optional progress bar.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

use crate::engine::RedactionEngine;
use crate::incremental::write_ledger;
use crate::reader::read_transcript;
use crate::restart_log::{should_process_file, RestartLog};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Success,
    /// Ledger written, but at least one recognizer failed on this transcript
    Degraded,
    Skipped,
    Failed,
}

/// Per-file processing statistics
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FileStats {
    pub path: String,
    pub chars_processed: u64,
    pub entities_detected: u64,
    pub entities_redacted: u64,
    pub warnings: u64,
    pub processing_time_ms: u64,
    pub chars_per_sec: f64,
    pub status: FileStatus,
    pub error: Option<String>,
}

impl FileStats {
    fn empty(path: &Path, status: FileStatus, error: Option<String>) -> Self {
        Self {
            path: path.display().to_string(),
            chars_processed: 0,
            entities_detected: 0,
            entities_redacted: 0,
            warnings: 0,
            processing_time_ms: 0,
            chars_per_sec: 0.0,
            status,
            error,
        }
    }
}

/// Aggregate statistics for one batch run, written to `--stats-out`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunStats {
    /// Seconds since the Unix epoch
    pub run_start: u64,
    pub total_processing_time_ms: u64,
    pub total_chars_processed: u64,
    pub total_entities_detected: u64,
    pub total_entities_redacted: u64,
    pub overall_chars_per_sec: f64,
    pub files_processed: u64,
    pub files_degraded: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub file_stats: Vec<FileStats>,
}

impl RunStats {
    fn from_files(run_start: u64, elapsed_ms: u64, file_stats: Vec<FileStats>) -> Self {
        let count = |status| file_stats.iter().filter(|f| f.status == status).count() as u64;
        let total_chars_processed: u64 = file_stats.iter().map(|f| f.chars_processed).sum();

        Self {
            run_start,
            total_processing_time_ms: elapsed_ms,
            total_chars_processed,
            total_entities_detected: file_stats.iter().map(|f| f.entities_detected).sum(),
            total_entities_redacted: file_stats.iter().map(|f| f.entities_redacted).sum(),
            overall_chars_per_sec: chars_per_sec(total_chars_processed, elapsed_ms),
            files_processed: count(FileStatus::Success) + count(FileStatus::Degraded),
            files_degraded: count(FileStatus::Degraded),
            files_skipped: count(FileStatus::Skipped),
            files_failed: count(FileStatus::Failed),
            file_stats,
        }
    }

    pub async fn write_json(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, serde_json::to_string_pretty(self)?).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Abort the run on the first failed transcript
    pub fail_fast: bool,
    /// Reprocess transcripts the restart log marks complete
    pub overwrite_all: bool,
    /// Maximum transcripts in flight
    pub concurrency: usize,
    pub show_progress: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            overwrite_all: false,
            concurrency: num_cpus::get(),
            show_progress: false,
        }
    }
}

fn chars_per_sec(chars: u64, elapsed_ms: u64) -> f64 {
    if elapsed_ms == 0 {
        chars as f64 * 1000.0
    } else {
        chars as f64 / (elapsed_ms as f64 / 1000.0)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Redact one transcript and write its ledger. Failures are reported in the stats.
pub async fn process_file(engine: &RedactionEngine, path: &Path) -> FileStats {
    let started = Instant::now();

    let text = match read_transcript(path).await {
        Ok(text) => text,
        Err(e) => {
            warn!("{:#}", e);
            return FileStats::empty(path, FileStatus::Failed, Some(format!("{e:#}")));
        }
    };

    let result = engine.redact(&text).await;

    if let Err(e) = write_ledger(path, &result).await {
        warn!("Failed to write ledger for {}: {:#}", path.display(), e);
        return FileStats::empty(path, FileStatus::Failed, Some(format!("{e:#}")));
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let chars = text.chars().count() as u64;
    FileStats {
        path: path.display().to_string(),
        chars_processed: chars,
        entities_detected: result.detected.len() as u64,
        entities_redacted: result.redacted().count() as u64,
        warnings: result.warnings.len() as u64,
        processing_time_ms: elapsed_ms,
        chars_per_sec: chars_per_sec(chars, elapsed_ms),
        status: if result.is_degraded() {
            FileStatus::Degraded
        } else {
            FileStatus::Success
        },
        error: None,
    }
}

/// Redact every file not already complete, at most `config.concurrency` at a time.
///
/// Files with a clean ledger are marked complete in `restart_log`. Degraded
/// and failed files are removed from it so the next run retries them, even
/// when an earlier run had completed them. With `fail_fast` the
/// first failure aborts the run; files finished before it stay marked.
pub async fn process_files_parallel(
    engine: &RedactionEngine,
    files: Vec<PathBuf>,
    restart_log: &mut RestartLog,
    config: &BatchConfig,
) -> Result<RunStats> {
    let run_start = unix_now();
    let started = Instant::now();

    let (to_process, skipped): (Vec<PathBuf>, Vec<PathBuf>) = files
        .into_iter()
        .partition(|path| should_process_file(path, restart_log, config.overwrite_all));

    let mut file_stats: Vec<FileStats> = skipped
        .iter()
        .map(|path| FileStats::empty(path, FileStatus::Skipped, None))
        .collect();
    info!(
        to_process = to_process.len(),
        skipped = skipped.len(),
        concurrency = config.concurrency,
        "starting batch redaction"
    );

    let progress = if config.show_progress {
        let bar = ProgressBar::new(to_process.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} transcripts {msg}") {
            bar.set_style(style);
        }
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut in_flight = stream::iter(to_process)
        .map(|path| async move {
            let stats = process_file(engine, &path).await;
            (path, stats)
        })
        .buffer_unordered(config.concurrency.max(1));

    while let Some((path, stats)) = in_flight.next().await {
        progress.inc(1);
        match stats.status {
            FileStatus::Success => restart_log.mark_completed(&path),
            FileStatus::Degraded => restart_log.mark_incomplete(&path),
            FileStatus::Failed if config.fail_fast => {
                restart_log.mark_incomplete(&path);
                progress.abandon_with_message("aborted");
                let error = stats.error.unwrap_or_default();
                return Err(anyhow::anyhow!("Processing failed for {}: {}", path.display(), error));
            }
            FileStatus::Failed => {
                restart_log.mark_incomplete(&path);
                warn!("Processing failed for {} (continuing)", path.display());
            }
            FileStatus::Skipped => {}
        }
        file_stats.push(stats);
    }
    progress.finish_with_message("done");

    let run_stats = RunStats::from_files(run_start, started.elapsed().as_millis() as u64, file_stats);
    info!(
        processed = run_stats.files_processed,
        degraded = run_stats.files_degraded,
        skipped = run_stats.files_skipped,
        failed = run_stats.files_failed,
        redacted = run_stats.total_entities_redacted,
        "batch redaction complete"
    );
    Ok(run_stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::incremental::{generate_ledger_path, read_ledger};
    use tempfile::TempDir;

    fn engine() -> RedactionEngine {
        RedactionEngine::from_config(&EngineConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_process_file_writes_ledger() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("call.txt");
        std::fs::write(&path, "Caller: my SSN is 123-45-6789").unwrap();

        let stats = process_file(&engine(), &path).await;

        assert_eq!(stats.status, FileStatus::Success);
        assert_eq!(stats.entities_redacted, 1);
        let ledger = read_ledger(&path).await.unwrap();
        assert_eq!(ledger.redacted_text, "Caller: my SSN is <REDACTED:US_SSN>");
    }

    #[tokio::test]
    async fn test_unreadable_file_is_failed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.txt");
        std::fs::write(&path, [0xFF, 0xFE]).unwrap();

        let stats = process_file(&engine(), &path).await;
        assert_eq!(stats.status, FileStatus::Failed);
        assert!(stats.error.is_some());
        assert!(!generate_ledger_path(&path).exists());
    }

    #[tokio::test]
    async fn test_batch_skips_completed_and_counts() {
        let temp_dir = TempDir::new().unwrap();
        let mut files = Vec::new();
        for i in 0..4 {
            let path = temp_dir.path().join(format!("call-{i}.txt"));
            std::fs::write(&path, format!("ssn 123-45-678{i}")).unwrap();
            files.push(path);
        }

        let engine = engine();
        let mut log = RestartLog::default();
        let config = BatchConfig {
            concurrency: 2,
            ..BatchConfig::default()
        };

        let first = process_files_parallel(&engine, files.clone(), &mut log, &config).await.unwrap();
        assert_eq!(first.files_processed, 4);
        assert_eq!(first.total_entities_redacted, 4);
        assert_eq!(log.completed_count(), 4);

        let second = process_files_parallel(&engine, files, &mut log, &config).await.unwrap();
        assert_eq!(second.files_processed, 0);
        assert_eq!(second.files_skipped, 4);
    }

    #[tokio::test]
    async fn test_fail_fast_aborts() {
        let temp_dir = TempDir::new().unwrap();
        let bad = temp_dir.path().join("bad.txt");
        std::fs::write(&bad, [0xC3]).unwrap();

        let config = BatchConfig {
            fail_fast: true,
            concurrency: 1,
            ..BatchConfig::default()
        };
        let mut log = RestartLog::default();
        let result = process_files_parallel(&engine(), vec![bad], &mut log, &config).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_degraded_rerun_clears_completed_entry() {
        use crate::recognizer::{DetectFuture, Recognizer};

        struct Unavailable;

        impl Recognizer for Unavailable {
            fn name(&self) -> &str {
                "unavailable"
            }

            fn supported_entities(&self) -> Vec<String> {
                vec!["PERSON".to_string()]
            }

            fn detect<'a>(&'a self, _text: &'a str) -> DetectFuture<'a> {
                Box::pin(async { Err(anyhow::anyhow!("connection refused")) })
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("call.txt");
        std::fs::write(&path, "ssn 123-45-6789").unwrap();
        let mut log = RestartLog::default();

        let config = BatchConfig {
            concurrency: 1,
            ..BatchConfig::default()
        };
        process_files_parallel(&engine(), vec![path.clone()], &mut log, &config)
            .await
            .unwrap();
        assert!(log.is_completed(&path));

        let degraded_engine = RedactionEngine::builder()
            .recognizer(crate::RegexRecognizer::builtin().unwrap())
            .recognizer(Unavailable)
            .build()
            .unwrap();
        let overwrite = BatchConfig {
            overwrite_all: true,
            ..config.clone()
        };
        let rerun = process_files_parallel(&degraded_engine, vec![path.clone()], &mut log, &overwrite)
            .await
            .unwrap();
        assert_eq!(rerun.files_degraded, 1);
        assert!(!log.is_completed(&path));
        assert!(should_process_file(&path, &log, false));
    }

    #[tokio::test]
    async fn test_failed_rerun_clears_completed_entry() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("call.txt");
        std::fs::write(&path, "ssn 123-45-6789").unwrap();
        let mut log = RestartLog::default();
        log.mark_completed(&path);

        std::fs::write(&path, [0xFF]).unwrap();
        let config = BatchConfig {
            overwrite_all: true,
            concurrency: 1,
            ..BatchConfig::default()
        };
        let rerun = process_files_parallel(&engine(), vec![path.clone()], &mut log, &config)
            .await
            .unwrap();
        assert_eq!(rerun.files_failed, 1);
        assert!(!log.is_completed(&path));
    }

    #[test]
    fn test_run_stats_aggregation() {
        let mut ok = FileStats::empty(Path::new("a.txt"), FileStatus::Success, None);
        ok.chars_processed = 100;
        ok.entities_redacted = 2;
        let mut degraded = FileStats::empty(Path::new("b.txt"), FileStatus::Degraded, None);
        degraded.chars_processed = 50;
        let failed = FileStats::empty(Path::new("c.txt"), FileStatus::Failed, Some("boom".into()));

        let stats = RunStats::from_files(0, 1000, vec![ok, degraded, failed]);
        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.files_degraded, 1);
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.total_chars_processed, 150);
        assert_eq!(stats.overall_chars_per_sec, 150.0);
    }
}
