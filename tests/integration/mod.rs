// Shared fixtures for integration tests: a temporary transcript tree and
// scripted recognizers with fixed, failing or slow behavior.
#![allow(dead_code)]

pub mod fixtures;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pii_ledger::recognizer::DetectFuture;
use pii_ledger::{Recognizer, Span};
use tempfile::TempDir;

/// Temporary root directory holding transcripts
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().to_path_buf();
        Self { temp_dir, root_path }
    }

    /// Write a transcript, creating parent directories as needed
    pub fn create_transcript<P: AsRef<Path>>(&self, relative_path: P, content: &str) -> PathBuf {
        let file_path = self.root_path.join(relative_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&file_path, content).expect("Failed to write transcript");
        file_path
    }

    pub fn ledger_json<P: AsRef<Path>>(&self, source_path: P) -> serde_json::Value {
        let ledger_path = pii_ledger::incremental::generate_ledger_path(source_path.as_ref());
        let content = fs::read_to_string(&ledger_path).expect("Failed to read ledger");
        serde_json::from_str(&content).expect("Ledger is not valid JSON")
    }

    pub fn restart_log_path(&self) -> PathBuf {
        self.root_path.join(".pii_ledger_restart.json")
    }
}

/// Returns the same spans for every text
pub struct FixedRecognizer {
    pub name: String,
    pub spans: Vec<Span>,
}

impl FixedRecognizer {
    pub fn new(name: &str, spans: Vec<Span>) -> Self {
        Self {
            name: name.to_string(),
            spans,
        }
    }
}

impl Recognizer for FixedRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_entities(&self) -> Vec<String> {
        let mut entities: Vec<String> = self.spans.iter().map(|s| s.entity_type.clone()).collect();
        entities.sort();
        entities.dedup();
        entities
    }

    fn detect<'a>(&'a self, _text: &'a str) -> DetectFuture<'a> {
        let spans = self.spans.clone();
        Box::pin(async move { Ok(spans) })
    }
}

/// Always errors
pub struct FailingRecognizer {
    pub entities: Vec<String>,
}

impl Recognizer for FailingRecognizer {
    fn name(&self) -> &str {
        "failing-model"
    }

    fn supported_entities(&self) -> Vec<String> {
        self.entities.clone()
    }

    fn detect<'a>(&'a self, _text: &'a str) -> DetectFuture<'a> {
        Box::pin(async { Err(anyhow::anyhow!("model service returned 503")) })
    }
}

/// Sleeps before answering
pub struct SlowRecognizer {
    pub delay: Duration,
}

impl Recognizer for SlowRecognizer {
    fn name(&self) -> &str {
        "slow-model"
    }

    fn supported_entities(&self) -> Vec<String> {
        vec!["PERSON".to_string()]
    }

    fn detect<'a>(&'a self, _text: &'a str) -> DetectFuture<'a> {
        let delay = self.delay;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok(vec![Span::new("PERSON", 0, 4, 0.9, "slow-model")?])
        })
    }
}

pub fn span(entity_type: &str, start: usize, end: usize, score: f64, source: &str) -> Span {
    Span::new(entity_type, start, end, score, source).expect("valid test span")
}
