// RedactionEngine: recognizers -> merger -> policy -> anonymizer -> audit.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::anonymizer::Anonymizer;
use crate::audit::{self, RedactionResult, Warning};
use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::merger::SpanMerger;
use crate::policy::RedactionPolicy;
use crate::recognizer::{
    collect_spans, PresidioRecognizer, Recognizer, RegexRecognizer, RegisteredRecognizer,
    DEFAULT_ADAPTER_TIMEOUT,
};
use crate::span::{CharIndex, Span};

/// Stateless redaction pipeline over a fixed set of recognizers and an
/// immutable policy. Share it behind an `Arc`; calls are independent.
#[derive(Debug)]
pub struct RedactionEngine {
    recognizers: Vec<RegisteredRecognizer>,
    merger: SpanMerger,
    policy: RedactionPolicy,
    anonymizer: Anonymizer,
}

impl RedactionEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Build an engine from configuration, constructing every adapter it names.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        let mut builder = Self::builder()
            .adapter_timeout(config.adapter_timeout())
            .policy(RedactionPolicy::new(config.redact_entities.iter().cloned()))
            .merger(SpanMerger::with_priority(config.entity_priority.iter().cloned()))
            .anonymizer(Anonymizer::with_template(config.placeholder.as_str())?);

        if config.builtin_patterns {
            builder = builder.recognizer(RegexRecognizer::builtin()?);
        }

        if !config.patterns.is_empty() {
            let custom = config
                .patterns
                .iter()
                .try_fold(RegexRecognizer::new("custom-patterns"), |recognizer, p| {
                    recognizer.with_pattern(p.name.as_str(), p.entity_type.as_str(), &p.pattern)
                })?;
            builder = builder.recognizer(custom);
        }

        if let Some(presidio) = &config.presidio {
            let recognizer = PresidioRecognizer::new(
                &presidio.url,
                presidio.language.as_str(),
                presidio.entities.clone(),
                presidio.score_threshold,
            )?;
            builder = match presidio.timeout_ms {
                Some(ms) => builder.recognizer_with_timeout(recognizer, Duration::from_millis(ms)),
                None => builder.recognizer(recognizer),
            };
        }

        builder.build()
    }

    pub fn policy(&self) -> &RedactionPolicy {
        &self.policy
    }

    pub fn recognizer_names(&self) -> Vec<&str> {
        self.recognizers.iter().map(RegisteredRecognizer::name).collect()
    }

    /// Detect, merge, classify and redact `text`.
    ///
    /// Never fails: adapter failures and malformed spans are returned as
    /// warnings on the result.
    pub async fn redact(&self, text: &str) -> RedactionResult {
        let started = Instant::now();
        let collected = collect_spans(&self.recognizers, text).await;
        let result = self.redact_spans(text, collected.spans, collected.failures);

        info!(
            chars = result.original_text.chars().count(),
            detected = result.detected.len(),
            redacted = result.redacted().count(),
            warnings = result.warnings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "redaction complete"
        );
        result
    }

    /// The synchronous stages, over spans that were already collected.
    pub fn redact_spans(&self, text: &str, spans: Vec<Span>, mut warnings: Vec<Warning>) -> RedactionResult {
        let index = CharIndex::new(text);
        let char_len = index.char_len();

        let mut valid = Vec::with_capacity(spans.len());
        for span in spans {
            match span.validate(char_len) {
                Ok(()) => valid.push(span),
                Err(e) => {
                    warn!(
                        source = %span.source,
                        entity_type = %span.entity_type,
                        start = span.start,
                        end = span.end,
                        error = %e,
                        "dropping malformed span"
                    );
                    warnings.push(Warning::MalformedSpan {
                        source: span.source,
                        entity_type: span.entity_type,
                        start: span.start,
                        end: span.end,
                        message: e.to_string(),
                    });
                }
            }
        }

        let merged = self.merger.merge(&valid);
        let decisions = self.policy.decide(merged);
        let redacted_text = self.anonymizer.anonymize(text, &index, &decisions);
        debug!(spans = valid.len(), decisions = decisions.len(), "pipeline stages complete");

        audit::compile(text, &index, decisions, redacted_text, warnings)
    }
}

/// Collects recognizers and policy, then validates them together in [`EngineBuilder::build`].
pub struct EngineBuilder {
    recognizers: Vec<(Arc<dyn Recognizer>, Option<Duration>)>,
    adapter_timeout: Duration,
    policy: RedactionPolicy,
    merger: SpanMerger,
    anonymizer: Anonymizer,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            recognizers: Vec::new(),
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
            policy: RedactionPolicy::default(),
            merger: SpanMerger::default(),
            anonymizer: Anonymizer::default(),
        }
    }
}

impl EngineBuilder {
    /// Register a recognizer under the default adapter timeout.
    pub fn recognizer(self, recognizer: impl Recognizer + 'static) -> Self {
        self.shared_recognizer(Arc::new(recognizer))
    }

    pub fn shared_recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizers.push((recognizer, None));
        self
    }

    pub fn recognizer_with_timeout(mut self, recognizer: impl Recognizer + 'static, timeout: Duration) -> Self {
        self.recognizers.push((Arc::new(recognizer), Some(timeout)));
        self
    }

    /// Timeout for recognizers registered without their own.
    pub fn adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    pub fn policy(mut self, policy: RedactionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn merger(mut self, merger: SpanMerger) -> Self {
        self.merger = merger;
        self
    }

    pub fn anonymizer(mut self, anonymizer: Anonymizer) -> Self {
        self.anonymizer = anonymizer;
        self
    }

    pub fn build(self) -> Result<RedactionEngine, ConfigError> {
        if self.recognizers.is_empty() {
            return Err(ConfigError::NoRecognizers);
        }

        let mut names = BTreeSet::new();
        let mut emittable = BTreeSet::new();
        for (recognizer, timeout) in &self.recognizers {
            if !names.insert(recognizer.name().to_string()) {
                return Err(ConfigError::DuplicateRecognizer {
                    name: recognizer.name().to_string(),
                });
            }
            if timeout.unwrap_or(self.adapter_timeout).is_zero() {
                return Err(ConfigError::ZeroTimeout {
                    name: recognizer.name().to_string(),
                });
            }
            emittable.extend(recognizer.supported_entities());
        }

        if let Some(entity_type) = self.policy.redact_entities().find(|e| !emittable.contains(*e)) {
            return Err(ConfigError::UnreachableRedactEntity {
                entity_type: entity_type.to_string(),
            });
        }

        let default_timeout = self.adapter_timeout;
        let recognizers: Vec<RegisteredRecognizer> = self
            .recognizers
            .into_iter()
            .map(|(recognizer, timeout)| RegisteredRecognizer::new(recognizer, timeout.unwrap_or(default_timeout)))
            .collect();

        info!(
            recognizers = ?recognizers.iter().map(RegisteredRecognizer::name).collect::<Vec<_>>(),
            redact = ?self.policy.redact_entities().collect::<Vec<_>>(),
            "redaction engine ready"
        );

        Ok(RedactionEngine {
            recognizers,
            merger: self.merger,
            policy: self.policy,
            anonymizer: self.anonymizer,
        })
    }
}
