use thiserror::Error;

/// Reasons a recognizer-reported span is rejected before merging.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpanError {
    #[error("empty or inverted range [{start}, {end})")]
    EmptyRange { start: usize, end: usize },

    #[error("range [{start}, {end}) exceeds text length {len}")]
    OutOfBounds { start: usize, end: usize, len: usize },

    #[error("score {score} is outside [0.0, 1.0]")]
    ScoreOutOfRange { score: f64 },

    #[error("entity type is empty")]
    MissingEntityType,
}

/// Operator mistakes caught while building an engine. Never raised per call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no recognizers registered")]
    NoRecognizers,

    #[error("entity type {entity_type} is configured for redaction but no registered recognizer can emit it")]
    UnreachableRedactEntity { entity_type: String },

    #[error("pattern {name} failed to compile: {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("placeholder template is empty")]
    EmptyPlaceholder,

    #[error("recognizer {name} has a zero timeout and could never answer")]
    ZeroTimeout { name: String },

    #[error("recognizer {name} is registered twice")]
    DuplicateRecognizer { name: String },

    #[error("failed to build recognizer {name}: {reason}")]
    RecognizerSetup { name: String, reason: String },
}
