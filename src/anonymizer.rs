// Anonymizer: rewrites the text, replacing only REDACT spans with placeholders.

use crate::error::ConfigError;
use crate::policy::PolicyDecision;
use crate::span::CharIndex;

/// Default placeholder; `{entity_type}` is substituted per span.
pub const DEFAULT_PLACEHOLDER: &str = "<REDACTED:{entity_type}>";

const ENTITY_TOKEN: &str = "{entity_type}";

#[derive(Debug, Clone)]
pub struct Anonymizer {
    template: String,
}

impl Default for Anonymizer {
    fn default() -> Self {
        Self {
            template: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

impl Anonymizer {
    /// Anonymizer with a custom placeholder template. The template may omit
    /// `{entity_type}` but must not be empty.
    pub fn with_template(template: impl Into<String>) -> Result<Self, ConfigError> {
        let template = template.into();
        if template.is_empty() {
            return Err(ConfigError::EmptyPlaceholder);
        }
        Ok(Self { template })
    }

    pub fn placeholder(&self, entity_type: &str) -> String {
        self.template.replace(ENTITY_TOKEN, entity_type)
    }

    /// Produce the redacted text.
    ///
    /// `decisions` must be non-overlapping and in original-text char offsets.
    /// Replacements run from the highest offset down so every remaining
    /// offset still addresses the untouched prefix of the text.
    pub fn anonymize(&self, text: &str, index: &CharIndex, decisions: &[PolicyDecision]) -> String {
        let mut targets: Vec<&PolicyDecision> = decisions.iter().filter(|d| d.is_redacted()).collect();
        targets.sort_by(|a, b| b.span.start.cmp(&a.span.start));

        let mut redacted = text.to_string();
        for decision in targets {
            let span = &decision.span;
            // Offsets were validated upstream; a miss here means the index and
            // text disagree, and the span is left alone rather than guessed at.
            let Some(range) = index.byte_range(span.start, span.end) else {
                continue;
            };
            redacted.replace_range(range, &self.placeholder(&span.entity_type));
        }
        redacted
    }
}
