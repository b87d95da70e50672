//! Scripted backends shared by the engine and role tests.

use crate::engine::{EngineSettings, ReasoningEngine};
use crate::records::Solution;
use reasonloop_core::error::ProviderError;
use reasonloop_core::message::{Message, Role};
use reasonloop_core::provider::{Provider, ProviderRequest, ProviderResponse};
use reasonloop_providers::CapabilityClient;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub type Reply = std::result::Result<String, ProviderError>;

/// Returns scripted replies in order and records every request.
///
/// Panics if more calls are made than replies provided.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        let reply = self.replies.lock().unwrap().pop_front();
        let Some(reply) = reply else {
            panic!("ScriptedProvider: no reply for call #{call}");
        };
        reply.map(|content| text_response(&request.model, content))
    }
}

/// Answers each role from its prompt, so concurrent sessions need no script.
pub struct RoleAwareProvider {
    confidence: f64,
}

impl RoleAwareProvider {
    pub fn new(confidence: f64) -> Self {
        Self { confidence }
    }
}

#[async_trait::async_trait]
impl Provider for RoleAwareProvider {
    fn name(&self) -> &str {
        "role_aware"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let system = request
            .messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        // Yield so that joined sessions interleave.
        tokio::task::yield_now().await;

        let body = if system.contains("problem analyst") {
            serde_json::json!({
                "problem_statement": format!("Restated: {user}"),
                "problem_area": "other",
            })
        } else if system.contains("forming hypotheses") {
            serde_json::json!({ "hypothesis": "a plan", "confidence": 0.7 })
        } else if system.contains("problem solver") {
            serde_json::json!({ "solution": "do it", "steps": ["start", "finish"] })
        } else {
            serde_json::json!({
                "confidence": self.confidence,
                "feedback": "fine",
                "missing_aspects": null,
            })
        };

        Ok(text_response(&request.model, body.to_string()))
    }
}

fn text_response(model: &str, content: String) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(content),
        usage: None,
        model: model.to_string(),
    }
}

pub fn engine(provider: Arc<dyn Provider>, settings: EngineSettings) -> ReasoningEngine {
    let client = Arc::new(CapabilityClient::new(provider, "large", "small"));
    ReasoningEngine::new(client, settings).unwrap()
}

pub fn analysis_reply() -> Reply {
    Ok(serde_json::json!({
        "problem_statement": "Hard to stay focused while working from home",
        "problem_area": "personal",
    })
    .to_string())
}

pub fn hypothesis_text(round: u32) -> String {
    format!("hypothesis for round {round}")
}

pub fn feedback_text(round: u32) -> String {
    format!("feedback for round {round}")
}

pub fn expected_solution(round: u32) -> Solution {
    Solution {
        solution: format!("solution for round {round}"),
        steps: vec![format!("step A{round}"), format!("step B{round}")],
    }
}

/// Hypothesis, solution and validation replies for one round.
pub fn round_replies(round: u32, confidence: f64) -> Vec<Reply> {
    let solution = expected_solution(round);
    vec![
        Ok(serde_json::json!({
            "hypothesis": hypothesis_text(round),
            "confidence": 0.8,
        })
        .to_string()),
        Ok(serde_json::json!({
            "solution": solution.solution,
            "steps": solution.steps,
        })
        .to_string()),
        Ok(serde_json::json!({
            "is_valid": confidence >= 0.97,
            "confidence": confidence,
            "feedback": feedback_text(round),
            "missing_aspects": [format!("aspect {round}")],
        })
        .to_string()),
    ]
}
