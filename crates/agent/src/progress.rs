//! Progress notifications streamed while a session runs.
//!
//! The engine renders a [`ProgressEvent`] to text and hands it to a
//! [`ProgressSink`]. Delivery is bounded by a timeout, and a sink that errors
//! or stalls is logged and skipped; it never changes the outcome of a session.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// Hypotheses longer than this are cut in progress lines.
const HYPOTHESIS_PREVIEW_CHARS: usize = 100;

/// Why a sink could not take a notification.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("progress sink closed")]
    Closed,

    #[error("progress delivery failed: {0}")]
    Delivery(String),
}

/// Receives human-readable progress lines.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), SinkError>;
}

/// Milestones of a reasoning session.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Analyzing,
    ProblemIdentified {
        statement: String,
        area: String,
    },
    RoundStarted {
        round: u32,
        max_rounds: u32,
    },
    HypothesisProposed {
        round: u32,
        hypothesis: String,
    },
    SolutionBuilt {
        round: u32,
        steps: usize,
    },
    Accepted {
        round: u32,
        confidence: f64,
    },
    NeedsRefinement {
        round: u32,
        confidence: f64,
        threshold: f64,
        final_round: bool,
    },
    BudgetExhausted {
        rounds: u32,
    },
}

impl ProgressEvent {
    /// Stable snake_case name, used as the `event` field in logs.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Analyzing => "analyzing",
            Self::ProblemIdentified { .. } => "problem_identified",
            Self::RoundStarted { .. } => "round_started",
            Self::HypothesisProposed { .. } => "hypothesis_proposed",
            Self::SolutionBuilt { .. } => "solution_built",
            Self::Accepted { .. } => "accepted",
            Self::NeedsRefinement { .. } => "needs_refinement",
            Self::BudgetExhausted { .. } => "budget_exhausted",
        }
    }
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analyzing => write!(f, "🔍 Analyzing the problem..."),
            Self::ProblemIdentified { statement, area } => {
                write!(f, "📊 Problem identified: {statement} (area: {area})")
            }
            Self::RoundStarted { round, max_rounds } => {
                write!(f, "🔄 Reasoning round {round}/{max_rounds}")
            }
            Self::HypothesisProposed { round, hypothesis } => {
                write!(f, "💡 Hypothesis {round}: {}", preview(hypothesis))
            }
            Self::SolutionBuilt { steps, .. } => {
                let noun = if *steps == 1 { "step" } else { "steps" };
                write!(f, "🛠 Solution built with {steps} {noun}")
            }
            Self::Accepted { round, confidence } => {
                let noun = if *round == 1 { "round" } else { "rounds" };
                write!(
                    f,
                    "✅ Solution accepted after {round} {noun} (confidence {confidence:.2})"
                )
            }
            Self::NeedsRefinement {
                confidence,
                threshold,
                final_round,
                ..
            } => {
                write!(
                    f,
                    "🔄 Solution needs refinement (confidence {confidence:.2} < {threshold:.2})"
                )?;
                if !final_round {
                    write!(f, ". Moving to the next round...")?;
                }
                Ok(())
            }
            Self::BudgetExhausted { rounds } => write!(
                f,
                "⚠️ Round limit ({rounds}) reached without acceptance. Using the last solution."
            ),
        }
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(HYPOTHESIS_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Render `event` and deliver it, giving up after `timeout`.
pub(crate) async fn deliver(sink: &dyn ProgressSink, timeout: Duration, event: &ProgressEvent) {
    let text = event.to_string();
    match tokio::time::timeout(timeout, sink.notify(&text)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(event = event.event_type(), error = %e, "Progress sink failed, continuing");
        }
        Err(_) => {
            warn!(
                event = event.event_type(),
                timeout_ms = timeout.as_millis() as u64,
                "Progress sink timed out, continuing"
            );
        }
    }
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl ProgressSink for NoopSink {
    async fn notify(&self, _text: &str) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Forwards notifications to a synchronous closure.
pub struct FnSink<F> {
    f: F,
}

impl<F> FnSink<F>
where
    F: Fn(&str) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> ProgressSink for FnSink<F>
where
    F: Fn(&str) + Send + Sync,
{
    async fn notify(&self, text: &str) -> Result<(), SinkError> {
        (self.f)(text);
        Ok(())
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines received so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn notify(&self, text: &str) -> Result<(), SinkError> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|e| SinkError::Delivery(e.to_string()))?;
        lines.push(text.to_string());
        Ok(())
    }
}
