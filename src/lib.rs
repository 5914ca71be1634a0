//! Transcript PII redaction with an audit ledger.
//!
//! A [`RedactionEngine`] runs every registered [`Recognizer`] concurrently
//! over a transcript, merges their overlapping spans into one
//! non-overlapping set, classifies each span as redact or flag-only, and
//! returns the redacted text with a ledger of everything detected.
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use pii_ledger::{EngineConfig, RedactionEngine};
//!
//! let engine = RedactionEngine::from_config(&EngineConfig::default())?;
//! let result = engine.redact("My SSN is 123-45-6789").await;
//! assert_eq!(result.redacted_text, "My SSN is <REDACTED:US_SSN>");
//! # Ok(())
//! # }
//! ```

pub mod anonymizer;
pub mod audit;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod incremental;
pub mod merger;
pub mod parallel_processing;
pub mod policy;
pub mod reader;
pub mod recognizer;
pub mod restart_log;
pub mod span;

pub use anonymizer::Anonymizer;
pub use audit::{FailureReason, LedgerEntry, RedactionResult, Warning};
pub use config::EngineConfig;
pub use engine::{EngineBuilder, RedactionEngine};
pub use error::{ConfigError, SpanError};
pub use merger::{MergedSpan, SpanMerger};
pub use policy::{Action, PolicyDecision, RedactionPolicy};
pub use recognizer::{PresidioRecognizer, Recognizer, RegexRecognizer};
pub use span::{CharIndex, Span};

// Re-export batch processing types for the CLI and benchmarks
pub use parallel_processing::{process_files_parallel, BatchConfig, FileStats, FileStatus, RunStats};
