// Baseline pattern adapter. Regex matches are exact, so every span scores 1.0.

use regex_automata::meta::Regex;
use tracing::debug;

use super::{DetectFuture, Recognizer};
use crate::error::ConfigError;
use crate::span::{CharIndex, Span};

/// Long digit runs treated as customer account identifiers.
pub const ACCOUNT_ID_PATTERN: &str = r"\b[0-9]{10,12}\b";

/// (pattern name, entity type, regex) shipped with [`RegexRecognizer::builtin`].
const BUILTIN_PATTERNS: &[(&str, &str, &str)] = &[
    ("us_ssn", "US_SSN", r"\b[0-9]{3}-[0-9]{2}-[0-9]{4}\b"),
    (
        "phone_number",
        "PHONE_NUMBER",
        r"(?:\+?1[-. ]?)?(?:\([0-9]{3}\) ?|\b[0-9]{3}[-. ])?\b[0-9]{3}[-. ][0-9]{4}\b",
    ),
    (
        "email_address",
        "EMAIL_ADDRESS",
        r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b",
    ),
];

struct PatternRule {
    name: String,
    entity_type: String,
    regex: Regex,
}

/// A named set of compiled patterns, each tagged with the entity it detects.
pub struct RegexRecognizer {
    name: String,
    rules: Vec<PatternRule>,
}

impl RegexRecognizer {
    /// Empty recognizer; add patterns with [`RegexRecognizer::with_pattern`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Built-in SSN, phone number and email patterns.
    pub fn builtin() -> Result<Self, ConfigError> {
        BUILTIN_PATTERNS
            .iter()
            .try_fold(Self::new("builtin-patterns"), |recognizer, (name, entity, pattern)| {
                recognizer.with_pattern(*name, *entity, pattern)
            })
    }

    /// Add a pattern. Spans it produces carry `source = "regex:<name>"`.
    pub fn with_pattern(
        mut self,
        name: impl Into<String>,
        entity_type: impl Into<String>,
        pattern: &str,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        self.rules.push(PatternRule {
            name,
            entity_type: entity_type.into(),
            regex,
        });
        Ok(self)
    }

    pub fn pattern_count(&self) -> usize {
        self.rules.len()
    }

    /// Synchronous scan, usable outside an async context.
    pub fn find_spans(&self, text: &str) -> Vec<Span> {
        let index = CharIndex::new(text);
        let mut spans = Vec::new();

        for rule in &self.rules {
            let source = format!("regex:{}", rule.name);
            for m in rule.regex.find_iter(text) {
                // Empty matches and matches that split a char are never reported.
                let (Some(start), Some(end)) = (index.char_offset(m.start()), index.char_offset(m.end()))
                else {
                    continue;
                };
                if let Ok(span) = Span::new(rule.entity_type.as_str(), start, end, 1.0, source.as_str()) {
                    spans.push(span);
                }
            }
        }

        debug!(recognizer = %self.name, spans = spans.len(), "pattern scan complete");
        spans
    }
}

impl Recognizer for RegexRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_entities(&self) -> Vec<String> {
        let mut entities: Vec<String> = self.rules.iter().map(|r| r.entity_type.clone()).collect();
        entities.sort();
        entities.dedup();
        entities
    }

    fn detect<'a>(&'a self, text: &'a str) -> DetectFuture<'a> {
        Box::pin(async move { Ok(self.find_spans(text)) })
    }
}
