//! The refinement loop: analyze once, then hypothesize, solve and validate
//! until a solution clears the acceptance threshold or the round budget runs
//! out.

use crate::dialogue::numbered_steps;
use crate::progress::{ProgressEvent, ProgressSink, deliver};
use crate::records::{
    AttemptRecord, DialogueEntry, Hypothesis, ProblemAnalysis, Solution, ValidationResult,
};
use crate::roles::{
    ANALYST, Analyzer, HYPOTHESIS_GENERATOR, HypothesisBuilder, SOLVER, SolutionBuilder,
    VALIDATOR, Validator,
};
use reasonloop_config::ReasoningConfig;
use reasonloop_core::{Error, Result};
use reasonloop_providers::CapabilityClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Loop parameters, fixed for the lifetime of an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Minimum validator confidence for acceptance.
    pub validity_threshold: f64,
    /// Round budget. At least 1.
    pub max_iterations: u32,
    /// Pause between a rejected round and the next one.
    pub round_delay: Duration,
    /// Upper bound on one progress notification.
    pub sink_timeout: Duration,
    /// Attempts rendered into the hypothesis prompt; `None` renders all.
    pub max_history_in_prompt: Option<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&ReasoningConfig::default())
    }
}

impl From<&ReasoningConfig> for EngineSettings {
    fn from(config: &ReasoningConfig) -> Self {
        Self {
            validity_threshold: config.validity_threshold,
            max_iterations: config.max_iterations,
            round_delay: Duration::from_millis(config.round_delay_ms),
            sink_timeout: Duration::from_secs(config.sink_timeout_secs),
            max_history_in_prompt: config.max_history_in_prompt,
        }
    }
}

impl EngineSettings {
    fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::Config {
                message: "max_iterations must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.validity_threshold) {
            return Err(Error::Config {
                message: format!(
                    "validity_threshold {} is outside [0, 1]",
                    self.validity_threshold
                ),
            });
        }
        Ok(())
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// A round's confidence met the threshold.
    Accepted { iteration: u32 },
    /// No round met the threshold; the last round's solution is returned.
    BudgetExhausted,
}

/// Everything a completed session produced.
#[derive(Debug, Clone)]
pub struct ReasoningOutcome {
    pub session_id: Uuid,
    pub analysis: ProblemAnalysis,
    pub solution: Solution,
    pub status: SessionStatus,
    pub attempts: Vec<AttemptRecord>,
    pub iterations: u32,
    pub dialogue: Vec<DialogueEntry>,
}

impl ReasoningOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self.status, SessionStatus::Accepted { .. })
    }
}

/// An aborted session, with the dialogue recorded up to the failure.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ReasoningFailure {
    #[source]
    pub error: Error,
    pub dialogue: Vec<DialogueEntry>,
}

/// Runs reasoning sessions. One engine serves any number of concurrent
/// sessions; each call to [`reason`](Self::reason) owns its own state.
pub struct ReasoningEngine {
    analyzer: Analyzer,
    hypotheses: HypothesisBuilder,
    solutions: SolutionBuilder,
    validator: Validator,
    settings: EngineSettings,
}

/// Loop state that ends up in the outcome.
struct Finished {
    analysis: ProblemAnalysis,
    solution: Solution,
    status: SessionStatus,
    attempts: Vec<AttemptRecord>,
    iterations: u32,
}

impl ReasoningEngine {
    /// Create an engine. Fails on a zero round budget or a threshold outside
    /// `[0, 1]`.
    pub fn new(client: Arc<CapabilityClient>, settings: EngineSettings) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            analyzer: Analyzer::new(client.clone()),
            hypotheses: HypothesisBuilder::new(client.clone())
                .with_max_history(settings.max_history_in_prompt),
            solutions: SolutionBuilder::new(client.clone()),
            validator: Validator::new(client),
            settings,
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run one session for `question`, streaming progress to `sink`.
    pub async fn reason(
        &self,
        question: &str,
        sink: &dyn ProgressSink,
    ) -> std::result::Result<ReasoningOutcome, ReasoningFailure> {
        self.run(question, sink, None).await
    }

    /// Like [`reason`](Self::reason), but stops before the next round once
    /// `cancel` reads `true`. A role call already in flight is never
    /// interrupted.
    pub async fn reason_cancellable(
        &self,
        question: &str,
        sink: &dyn ProgressSink,
        cancel: watch::Receiver<bool>,
    ) -> std::result::Result<ReasoningOutcome, ReasoningFailure> {
        self.run(question, sink, Some(cancel)).await
    }

    async fn run(
        &self,
        question: &str,
        sink: &dyn ProgressSink,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> std::result::Result<ReasoningOutcome, ReasoningFailure> {
        let session_id = Uuid::new_v4();
        let span = info_span!("reasoning", session_id = %session_id);
        let mut dialogue = Vec::new();

        let result = self
            .run_session(question, sink, &mut cancel, &mut dialogue)
            .instrument(span.clone())
            .await;

        match result {
            Ok(done) => Ok(ReasoningOutcome {
                session_id,
                analysis: done.analysis,
                solution: done.solution,
                status: done.status,
                attempts: done.attempts,
                iterations: done.iterations,
                dialogue,
            }),
            Err(error) => {
                span.in_scope(|| warn!(error = %error, "Reasoning session aborted"));
                Err(ReasoningFailure { error, dialogue })
            }
        }
    }

    async fn run_session(
        &self,
        question: &str,
        sink: &dyn ProgressSink,
        cancel: &mut Option<watch::Receiver<bool>>,
        dialogue: &mut Vec<DialogueEntry>,
    ) -> Result<Finished> {
        let max_rounds = self.settings.max_iterations;
        info!(max_rounds, threshold = self.settings.validity_threshold, "Reasoning session started");

        self.emit(sink, ProgressEvent::Analyzing).await;
        let analysis = self.analyzer.analyze(question).await?;
        dialogue.push(DialogueEntry::new(
            ANALYST,
            format!(
                "Problem: {}\nArea: {}",
                analysis.problem_statement, analysis.problem_area
            ),
        ));
        self.emit(
            sink,
            ProgressEvent::ProblemIdentified {
                statement: analysis.problem_statement.clone(),
                area: analysis.problem_area.clone(),
            },
        )
        .await;

        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut last_solution: Option<Solution> = None;

        for round in 1..=max_rounds {
            if is_cancelled(cancel) {
                info!(round, "Cancellation requested");
                return Err(Error::Cancelled { round });
            }

            debug!(round, max_rounds, "Round started");
            self.emit(sink, ProgressEvent::RoundStarted { round, max_rounds })
                .await;

            let hypothesis = self.hypotheses.build(&analysis, &attempts).await?;
            dialogue.push(hypothesis_entry(&hypothesis));
            self.emit(
                sink,
                ProgressEvent::HypothesisProposed {
                    round,
                    hypothesis: hypothesis.hypothesis.clone(),
                },
            )
            .await;

            let solution = self.solutions.build(&analysis, &hypothesis).await?;
            dialogue.push(solution_entry(&solution));
            self.emit(
                sink,
                ProgressEvent::SolutionBuilt {
                    round,
                    steps: solution.steps.len(),
                },
            )
            .await;

            let validation = self.validator.validate(&analysis, &solution).await?;
            let accepted = validation.confidence >= self.settings.validity_threshold;
            dialogue.push(validation_entry(
                &validation,
                accepted,
                self.settings.validity_threshold,
            ));

            if accepted {
                info!(round, confidence = validation.confidence, "Solution accepted");
                self.emit(
                    sink,
                    ProgressEvent::Accepted {
                        round,
                        confidence: validation.confidence,
                    },
                )
                .await;
                return Ok(Finished {
                    analysis,
                    solution,
                    status: SessionStatus::Accepted { iteration: round },
                    attempts,
                    iterations: round,
                });
            }

            info!(
                round,
                confidence = validation.confidence,
                threshold = self.settings.validity_threshold,
                "Solution rejected"
            );
            attempts.push(AttemptRecord::from_round(&hypothesis, &validation));
            last_solution = Some(solution);

            let final_round = round == max_rounds;
            self.emit(
                sink,
                ProgressEvent::NeedsRefinement {
                    round,
                    confidence: validation.confidence,
                    threshold: self.settings.validity_threshold,
                    final_round,
                },
            )
            .await;

            if !final_round {
                self.pause(cancel).await;
            }
        }

        let solution = last_solution.ok_or_else(|| {
            Error::Internal("round budget exhausted without producing a solution".into())
        })?;

        warn!(rounds = max_rounds, "Round budget exhausted, returning last solution");
        self.emit(sink, ProgressEvent::BudgetExhausted { rounds: max_rounds })
            .await;

        Ok(Finished {
            analysis,
            solution,
            status: SessionStatus::BudgetExhausted,
            attempts,
            iterations: max_rounds,
        })
    }

    async fn emit(&self, sink: &dyn ProgressSink, event: ProgressEvent) {
        deliver(sink, self.settings.sink_timeout, &event).await;
    }

    /// Inter-round delay. Ends early if cancellation is requested.
    async fn pause(&self, cancel: &mut Option<watch::Receiver<bool>>) {
        let delay = tokio::time::sleep(self.settings.round_delay);
        match cancel {
            Some(rx) => {
                tokio::select! {
                    _ = delay => {}
                    _ = wait_for_cancel(rx) => {}
                }
            }
            None => delay.await,
        }
    }
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Resolves once `rx` reads `true`; never resolves if the sender is gone.
async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn hypothesis_entry(hypothesis: &Hypothesis) -> DialogueEntry {
    DialogueEntry::new(
        HYPOTHESIS_GENERATOR,
        format!(
            "Hypothesis: {}\nConfidence: {:.2}",
            hypothesis.hypothesis, hypothesis.confidence
        ),
    )
}

fn solution_entry(solution: &Solution) -> DialogueEntry {
    DialogueEntry::new(
        SOLVER,
        format!(
            "Solution: {}\nSteps:\n{}",
            solution.solution,
            numbered_steps(&solution.steps)
        ),
    )
}

fn validation_entry(validation: &ValidationResult, accepted: bool, threshold: f64) -> DialogueEntry {
    let verdict = if accepted {
        "✅ Solution accepted"
    } else {
        "❌ Solution needs refinement"
    };
    let mut message = format!(
        "Verdict: {verdict} (confidence {:.2}, threshold {threshold:.2})\nFeedback: {}",
        validation.confidence, validation.feedback
    );
    if let Some(missing) = validation.missing_aspects.as_ref().filter(|m| !m.is_empty()) {
        message.push_str(&format!("\nMissing aspects: {}", missing.join(", ")));
    }
    if let Some(is_valid) = validation.is_valid {
        let own = if is_valid { "valid" } else { "not valid" };
        message.push_str(&format!("\nValidator's own verdict: {own}"));
    }
    DialogueEntry::new(VALIDATOR, message)
}
