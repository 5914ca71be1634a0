// Engine configuration: redaction set, recognizers and timeouts, loaded from TOML.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::anonymizer::DEFAULT_PLACEHOLDER;
use crate::merger::DEFAULT_ENTITY_PRIORITY;
use crate::policy::DEFAULT_REDACT_ENTITIES;
use crate::recognizer::ACCOUNT_ID_PATTERN;

/// Environment variable that enables (or re-points) the Presidio adapter.
pub const PRESIDIO_URL_ENV: &str = "PII_LEDGER_PRESIDIO_URL";

/// A custom regex pattern registered with the `custom-patterns` recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub name: String,
    pub entity_type: String,
    pub pattern: String,
}

/// Presidio analyzer adapter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresidioConfig {
    pub url: String,
    pub language: String,
    pub entities: Vec<String>,
    pub score_threshold: Option<f64>,
    /// Overrides `adapter_timeout_ms` for this adapter.
    pub timeout_ms: Option<u64>,
}

impl Default for PresidioConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5002".to_string(),
            language: "en".to_string(),
            entities: Vec::new(),
            score_threshold: None,
            timeout_ms: None,
        }
    }
}

/// Everything an engine needs, fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Entity types replaced in the output text; all others are flagged only.
    pub redact_entities: Vec<String>,
    /// Per-adapter timeout in milliseconds.
    pub adapter_timeout_ms: u64,
    /// Placeholder template; `{entity_type}` is substituted.
    pub placeholder: String,
    /// Tie-break order between entity types, highest first.
    pub entity_priority: Vec<String>,
    /// Register the built-in SSN/phone/email patterns.
    pub builtin_patterns: bool,
    pub patterns: Vec<PatternConfig>,
    pub presidio: Option<PresidioConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            redact_entities: DEFAULT_REDACT_ENTITIES.iter().map(|s| s.to_string()).collect(),
            adapter_timeout_ms: 10_000,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            entity_priority: DEFAULT_ENTITY_PRIORITY.iter().map(|s| s.to_string()).collect(),
            builtin_patterns: true,
            // account ids are flagged for supervisor review, never redacted by default
            patterns: vec![PatternConfig {
                name: "account_id".to_string(),
                entity_type: "ACCOUNT_ID".to_string(),
                pattern: ACCOUNT_ID_PATTERN.to_string(),
            }],
            presidio: None,
        }
    }
}

impl EngineConfig {
    /// Load a TOML config file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides. A `PII_LEDGER_PRESIDIO_URL` value enables
    /// the Presidio adapter if the file did not.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(PRESIDIO_URL_ENV) {
            if url.trim().is_empty() {
                return;
            }
            self.presidio.get_or_insert_with(PresidioConfig::default).url = url;
        }
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }
}
