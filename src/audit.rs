// Audit Compiler: assembles the redacted text and the complete span ledger.

use serde::{Deserialize, Serialize};

use crate::policy::{Action, PolicyDecision};
use crate::span::CharIndex;

/// One ledger row. Offsets always refer to `original_text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
    pub score: f64,
    pub source: String,
    pub action: Action,
    /// Original substring `original_text[start..end]` in chars.
    pub text: String,
}

/// Why an adapter contributed no spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Error,
    Timeout,
    Panic,
}

/// Non-fatal problems recorded alongside a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A recognizer errored, timed out or panicked and contributed zero spans.
    AdapterFailure {
        recognizer: String,
        reason: FailureReason,
        message: String,
    },
    /// A span with unusable offsets or score was dropped before merging.
    MalformedSpan {
        source: String,
        entity_type: String,
        start: usize,
        end: usize,
        message: String,
    },
}

/// Engine output for one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactionResult {
    pub redacted_text: String,
    pub original_text: String,
    /// Every merged span, REDACT and FLAG_ONLY alike, ordered by `start`.
    pub detected: Vec<LedgerEntry>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

impl RedactionResult {
    pub fn redacted(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.detected.iter().filter(|e| e.action == Action::Redact)
    }

    pub fn flagged(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.detected.iter().filter(|e| e.action == Action::FlagOnly)
    }

    /// True when at least one recognizer failed, so "nothing found" may mean
    /// "nothing looked".
    pub fn is_degraded(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, Warning::AdapterFailure { .. }))
    }

    pub fn adapter_failures(&self) -> impl Iterator<Item = &Warning> {
        self.warnings
            .iter()
            .filter(|w| matches!(w, Warning::AdapterFailure { .. }))
    }
}

/// Build the final result. `decisions` must already be sorted by `start`.
pub fn compile(
    original_text: &str,
    index: &CharIndex,
    decisions: Vec<PolicyDecision>,
    redacted_text: String,
    warnings: Vec<Warning>,
) -> RedactionResult {
    let detected = decisions
        .into_iter()
        .map(|decision| {
            let span = decision.span;
            let text = index
                .slice(original_text, span.start, span.end)
                .unwrap_or_default()
                .to_string();
            LedgerEntry {
                entity_type: span.entity_type,
                start: span.start,
                end: span.end,
                score: span.score,
                source: span.source,
                action: decision.action,
                text,
            }
        })
        .collect();

    RedactionResult {
        redacted_text,
        original_text: original_text.to_string(),
        detected,
        warnings,
    }
}
