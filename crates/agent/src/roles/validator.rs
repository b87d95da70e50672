use super::problem_context;
use crate::records::{ProblemAnalysis, Solution, ValidationResult};
use reasonloop_core::{Message, Result};
use reasonloop_providers::CapabilityClient;
use std::sync::Arc;

/// Critiques a solution and scores how well it solves the problem.
///
/// The score is reported, not judged: the engine compares it with its own
/// threshold.
pub struct Validator {
    client: Arc<CapabilityClient>,
}

impl Validator {
    pub fn new(client: Arc<CapabilityClient>) -> Self {
        Self { client }
    }

    pub async fn validate(
        &self,
        analysis: &ProblemAnalysis,
        solution: &Solution,
    ) -> Result<ValidationResult> {
        self.client.invoke(Self::messages(analysis, solution)).await
    }

    pub fn messages(analysis: &ProblemAnalysis, solution: &Solution) -> Vec<Message> {
        let context = format!(
            "{}\nProposed solution: {}\nSteps: {}",
            problem_context(analysis),
            solution.solution,
            solution.steps.join(", ")
        );
        let preamble = format!(
            "You are a critical expert in the area of {}.\n\
             Check whether the proposed solution really solves the problem. \
             Be critical but fair.\n\n\
             Reply with a JSON object:\n\
             {{\"confidence\": 0.0, \"feedback\": \"detailed feedback\", \
             \"missing_aspects\": [\"aspect 1\", \"aspect 2\"]}}\n\
             where confidence is a number between 0 and 1 saying how sure you are \
             that the solution works, and missing_aspects may be null.",
            analysis.problem_area
        );
        vec![Message::system(preamble), Message::user(context)]
    }
}
