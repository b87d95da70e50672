use super::problem_context;
use crate::records::{Hypothesis, ProblemAnalysis, Solution};
use reasonloop_core::{Message, Result};
use reasonloop_providers::CapabilityClient;
use std::sync::Arc;

/// Turns a hypothesis into an ordered plan.
pub struct SolutionBuilder {
    client: Arc<CapabilityClient>,
}

impl SolutionBuilder {
    pub fn new(client: Arc<CapabilityClient>) -> Self {
        Self { client }
    }

    pub async fn build(
        &self,
        analysis: &ProblemAnalysis,
        hypothesis: &Hypothesis,
    ) -> Result<Solution> {
        self.client.invoke(Self::messages(analysis, hypothesis)).await
    }

    pub fn messages(analysis: &ProblemAnalysis, hypothesis: &Hypothesis) -> Vec<Message> {
        let context = format!(
            "{}\nHypothesis: {}",
            problem_context(analysis),
            hypothesis.hypothesis
        );
        let preamble = format!(
            "You are an expert problem solver in the area of {}.\n\
             Build a concrete solution based on the proposed hypothesis.\n\n\
             Reply with a JSON object:\n\
             {{\"solution\": \"description of the solution\", \
             \"steps\": [\"step 1\", \"step 2\", \"step 3\"]}}\n\
             The steps list must not be empty.",
            analysis.problem_area
        );
        vec![Message::system(preamble), Message::user(context)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_carries_hypothesis() {
        let analysis = ProblemAnalysis {
            problem_statement: "Team misses deadlines".into(),
            problem_area: "business".into(),
        };
        let hypothesis = Hypothesis {
            hypothesis: "Scope is estimated too optimistically".into(),
            confidence: 0.7,
        };
        let messages = SolutionBuilder::messages(&analysis, &hypothesis);
        assert!(messages[0].content.contains("business"));
        assert!(messages[1]
            .content
            .ends_with("Hypothesis: Scope is estimated too optimistically"));
    }
}
