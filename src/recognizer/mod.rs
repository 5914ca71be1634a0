// Recognizer Adapter contract and concurrent invocation of registered adapters.
//
// Each adapter wraps one external detection capability behind `detect`.
// A failing, hanging or panicking adapter never aborts a call: it contributes
// zero spans and an `AdapterFailure` warning instead.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tracing::{debug, warn};

use crate::audit::{FailureReason, Warning};
use crate::span::Span;

pub mod presidio;
pub mod regex;

pub use self::presidio::{PresidioRecognizer, DEFAULT_PRESIDIO_ENTITIES};
pub use self::regex::{RegexRecognizer, ACCOUNT_ID_PATTERN};

/// Future returned by [`Recognizer::detect`].
pub type DetectFuture<'a> = BoxFuture<'a, anyhow::Result<Vec<Span>>>;

/// Default per-adapter timeout.
pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(10);

/// An entity-detection capability.
///
/// Offsets in returned spans are char offsets into `text`. Adapters that do
/// heavy synchronous work should move it off the async executor themselves
/// (e.g. `tokio::task::spawn_blocking`), otherwise timeouts cannot preempt it.
pub trait Recognizer: Send + Sync {
    /// Stable identity used in logs and warnings.
    fn name(&self) -> &str;

    /// Entity types this adapter can ever emit.
    fn supported_entities(&self) -> Vec<String>;

    fn detect<'a>(&'a self, text: &'a str) -> DetectFuture<'a>;
}

/// A recognizer together with the timeout applied to each of its calls.
#[derive(Clone)]
pub struct RegisteredRecognizer {
    pub recognizer: Arc<dyn Recognizer>,
    pub timeout: Duration,
}

impl RegisteredRecognizer {
    pub fn new(recognizer: Arc<dyn Recognizer>, timeout: Duration) -> Self {
        Self { recognizer, timeout }
    }

    pub fn name(&self) -> &str {
        self.recognizer.name()
    }
}

impl std::fmt::Debug for RegisteredRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredRecognizer")
            .field("name", &self.recognizer.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Raw output of one round of adapter calls.
#[derive(Debug, Default)]
pub struct CollectedSpans {
    /// Spans as reported, unvalidated and unordered.
    pub spans: Vec<Span>,
    /// One `AdapterFailure` per adapter that contributed nothing.
    pub failures: Vec<Warning>,
}

/// Run every recognizer concurrently over `text`, each under its own timeout.
pub async fn collect_spans(recognizers: &[RegisteredRecognizer], text: &str) -> CollectedSpans {
    let calls = recognizers.iter().map(|registered| async move {
        let started = Instant::now();
        let recognizer = Arc::clone(&registered.recognizer);
        // detect() itself may panic before returning a future, so it is called inside the guarded block
        let guarded = AssertUnwindSafe(async move { recognizer.detect(text).await }).catch_unwind();

        let outcome = match tokio::time::timeout(registered.timeout, guarded).await {
            Ok(Ok(Ok(spans))) => Ok(spans),
            Ok(Ok(Err(e))) => Err((FailureReason::Error, format!("{e:#}"))),
            Ok(Err(payload)) => Err((FailureReason::Panic, panic_message(payload.as_ref()))),
            Err(_) => Err((
                FailureReason::Timeout,
                format!("timed out after {}ms", registered.timeout.as_millis()),
            )),
        };
        (registered.name(), outcome, started.elapsed())
    });

    let mut collected = CollectedSpans::default();
    for (name, outcome, elapsed) in join_all(calls).await {
        match outcome {
            Ok(spans) => {
                debug!(
                    recognizer = name,
                    spans = spans.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "recognizer finished"
                );
                collected.spans.extend(spans);
            }
            Err((reason, message)) => {
                warn!(
                    recognizer = name,
                    ?reason,
                    error = %message,
                    "recognizer failed, continuing without its spans"
                );
                collected.failures.push(Warning::AdapterFailure {
                    recognizer: name.to_string(),
                    reason,
                    message,
                });
            }
        }
    }
    collected
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "recognizer panicked".to_string()
    }
}
