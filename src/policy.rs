// Redaction Policy: static entity-type -> disclosure action table.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::merger::MergedSpan;

/// Entity types redacted by default. Everything else is flagged only.
pub const DEFAULT_REDACT_ENTITIES: &[&str] = &["US_SSN"];

/// What happens to a detected entity in the output text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Replace the entity text with a placeholder.
    Redact,
    /// Keep the entity text, record it in the ledger.
    FlagOnly,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Redact => f.write_str("REDACT"),
            Action::FlagOnly => f.write_str("FLAG_ONLY"),
        }
    }
}

/// A merged span tagged with its disclosure action.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDecision {
    pub span: MergedSpan,
    pub action: Action,
}

impl PolicyDecision {
    pub fn is_redacted(&self) -> bool {
        self.action == Action::Redact
    }
}

/// The set of entity types to redact. Unknown types fall through to `FLAG_ONLY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionPolicy {
    redact: BTreeSet<String>,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_REDACT_ENTITIES.iter().copied())
    }
}

impl RedactionPolicy {
    pub fn new<I, S>(redact_entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            redact: redact_entities.into_iter().map(Into::into).collect(),
        }
    }

    /// Pure lookup, no side effects.
    pub fn classify(&self, entity_type: &str) -> Action {
        if self.redact.contains(entity_type) {
            Action::Redact
        } else {
            Action::FlagOnly
        }
    }

    pub fn redact_entities(&self) -> impl Iterator<Item = &str> {
        self.redact.iter().map(String::as_str)
    }

    /// Tag every merged span; order and count are preserved.
    pub fn decide(&self, spans: Vec<MergedSpan>) -> Vec<PolicyDecision> {
        spans
            .into_iter()
            .map(|span| PolicyDecision {
                action: self.classify(&span.entity_type),
                span,
            })
            .collect()
    }
}
