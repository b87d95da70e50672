use crate::records::ProblemAnalysis;
use reasonloop_core::{Message, Result};
use reasonloop_providers::CapabilityClient;
use std::sync::Arc;
use tracing::debug;

/// Areas the analyst may classify a problem into.
pub const PROBLEM_AREAS: &[&str] = &[
    "healthcare",
    "information technology",
    "business",
    "education",
    "finance",
    "personal",
    "other",
];

/// Restates the user's question as a problem and classifies its area.
pub struct Analyzer {
    client: Arc<CapabilityClient>,
}

impl Analyzer {
    pub fn new(client: Arc<CapabilityClient>) -> Self {
        Self { client }
    }

    pub async fn analyze(&self, question: &str) -> Result<ProblemAnalysis> {
        debug!(chars = question.len(), "Analyzing question");
        self.client.invoke(Self::messages(question)).await
    }

    pub fn messages(question: &str) -> Vec<Message> {
        let preamble = format!(
            "You are an expert problem analyst. Read the user's question and:\n\
             1. State the underlying problem clearly in one or two sentences.\n\
             2. Pick the problem area from this list: {}.\n\n\
             Reply with a JSON object:\n\
             {{\"problem_statement\": \"clear statement of the problem\", \
             \"problem_area\": \"one of the areas\"}}",
            PROBLEM_AREAS.join(", ")
        );
        vec![Message::system(preamble), Message::user(question)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reasonloop_core::Role;

    #[test]
    fn preamble_lists_every_area() {
        let messages = Analyzer::messages("How do I stop procrastinating?");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        for area in PROBLEM_AREAS {
            assert!(messages[0].content.contains(area), "missing {area}");
        }
        assert_eq!(messages[1].content, "How do I stop procrastinating?");
    }
}
