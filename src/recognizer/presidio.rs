//! Model-based adapter backed by a Presidio analyzer service.
//!
//! Sends the transcript to `POST {base_url}/analyze` and maps each analyzer
//! result to a [`Span`]. The HTTP client is created once and shared by all
//! calls. Presidio reports code-point offsets, which are the char offsets
//! spans use, so results are passed through unchanged and validated by the
//! engine like any other adapter output.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DetectFuture, Recognizer};
use crate::error::ConfigError;
use crate::span::Span;

/// Entities requested from the analyzer when none are configured.
pub const DEFAULT_PRESIDIO_ENTITIES: &[&str] = &[
    "PHONE_NUMBER",
    "EMAIL_ADDRESS",
    "PERSON",
    "LOCATION",
    "DATE_TIME",
    "US_SSN",
];

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
    language: &'a str,
    entities: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    score_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AnalyzerResult {
    entity_type: String,
    start: usize,
    end: usize,
    score: f64,
    #[serde(default)]
    recognition_metadata: Option<RecognitionMetadata>,
}

#[derive(Debug, Deserialize)]
struct RecognitionMetadata {
    #[serde(default)]
    recognizer_name: Option<String>,
}

pub struct PresidioRecognizer {
    name: String,
    client: reqwest::Client,
    analyze_url: String,
    language: String,
    entities: Vec<String>,
    score_threshold: Option<f64>,
}

impl PresidioRecognizer {
    /// Create an adapter for the analyzer at `base_url`, e.g. `http://localhost:5002`.
    pub fn new(
        base_url: &str,
        language: impl Into<String>,
        entities: Vec<String>,
        score_threshold: Option<f64>,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ConfigError::RecognizerSetup {
                name: "presidio".to_string(),
                reason: e.to_string(),
            })?;

        let entities = if entities.is_empty() {
            DEFAULT_PRESIDIO_ENTITIES.iter().map(|e| e.to_string()).collect()
        } else {
            entities
        };

        Ok(Self {
            name: "presidio".to_string(),
            client,
            analyze_url: format!("{}/analyze", base_url.trim_end_matches('/')),
            language: language.into(),
            entities,
            score_threshold,
        })
    }

    pub fn analyze_url(&self) -> &str {
        &self.analyze_url
    }

    async fn analyze(&self, text: &str) -> anyhow::Result<Vec<Span>> {
        let request = AnalyzeRequest {
            text,
            language: &self.language,
            entities: &self.entities,
            score_threshold: self.score_threshold,
        };

        let response = self
            .client
            .post(&self.analyze_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("presidio analyzer unreachable at {}", self.analyze_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("presidio analyzer returned {status}: {body}");
        }

        let results: Vec<AnalyzerResult> = response
            .json()
            .await
            .context("presidio analyzer returned malformed JSON")?;

        debug!(results = results.len(), "presidio analysis complete");
        Ok(results_to_spans(results))
    }
}

impl Recognizer for PresidioRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_entities(&self) -> Vec<String> {
        self.entities.clone()
    }

    fn detect<'a>(&'a self, text: &'a str) -> DetectFuture<'a> {
        Box::pin(self.analyze(text))
    }
}

fn results_to_spans(results: Vec<AnalyzerResult>) -> Vec<Span> {
    results
        .into_iter()
        .map(|r| {
            let recognizer = r
                .recognition_metadata
                .and_then(|m| m.recognizer_name)
                .unwrap_or_else(|| "analyzer".to_string());
            Span {
                entity_type: r.entity_type,
                start: r.start,
                end: r.end,
                score: r.score,
                source: format!("presidio:{recognizer}"),
            }
        })
        .collect()
}
