use super::problem_context;
use crate::records::{AttemptRecord, Hypothesis, ProblemAnalysis};
use reasonloop_core::{Message, Result};
use reasonloop_providers::CapabilityClient;
use std::sync::Arc;
use tracing::debug;

/// Proposes an approach, learning from every rejected attempt so far.
pub struct HypothesisBuilder {
    client: Arc<CapabilityClient>,
    max_history: Option<usize>,
}

impl HypothesisBuilder {
    pub fn new(client: Arc<CapabilityClient>) -> Self {
        Self {
            client,
            max_history: None,
        }
    }

    /// Render only the most recent `n` attempts into the prompt.
    pub fn with_max_history(mut self, n: Option<usize>) -> Self {
        self.max_history = n;
        self
    }

    pub async fn build(
        &self,
        analysis: &ProblemAnalysis,
        attempts: &[AttemptRecord],
    ) -> Result<Hypothesis> {
        debug!(prior_attempts = attempts.len(), "Building hypothesis");
        self.client
            .invoke(Self::messages(analysis, attempts, self.max_history))
            .await
    }

    pub fn messages(
        analysis: &ProblemAnalysis,
        attempts: &[AttemptRecord],
        max_history: Option<usize>,
    ) -> Vec<Message> {
        let mut context = problem_context(analysis);

        let shown = match max_history {
            Some(n) => &attempts[attempts.len().saturating_sub(n)..],
            None => attempts,
        };

        if !shown.is_empty() {
            context.push_str("\n\nPrevious attempts:\n");
            for attempt in shown {
                context.push_str(&format!("- Hypothesis: {}\n", attempt.hypothesis));
                context.push_str(&format!("  Feedback: {}\n", attempt.feedback));
                if let Some(missing) = attempt.missing_aspects.as_ref().filter(|m| !m.is_empty()) {
                    context.push_str(&format!("  Missing aspects: {}\n", missing.join(", ")));
                }
            }
        }

        let mut preamble = format!(
            "You are an expert at forming hypotheses in the area of {}.\n\
             Propose a hypothesis for how the problem can be solved.",
            analysis.problem_area
        );
        if !attempts.is_empty() {
            preamble.push_str(
                "\nEarlier hypotheses were rejected. Propose a new, simpler hypothesis \
                 that addresses the feedback and missing aspects listed for them.",
            );
        }
        preamble.push_str(
            "\n\nReply with a JSON object:\n\
             {\"hypothesis\": \"detailed description of the hypothesis\", \
             \"confidence\": 0.8}\n\
             where confidence is a number between 0 and 1.",
        );

        vec![Message::system(preamble), Message::user(context)]
    }
}
