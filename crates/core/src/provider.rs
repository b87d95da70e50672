//! Provider trait: the abstraction over text-generation backends.
//!
//! A Provider knows how to send an ordered list of messages to a backend
//! model and get one reply back. Retry and model substitution are layered
//! on top (see `reasonloop-providers::capability`), never inside a Provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// Shape the backend is asked to produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free-form text
    #[default]
    Text,
    /// A single JSON object in the reply content
    JsonObject,
}

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The backend model identifier (e.g., "mistral-large-latest")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Expected reply shape
    #[serde(default)]
    pub response_format: ResponseFormat,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    /// Build a request for `model` with default sampling settings.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            response_format: ResponseFormat::Text,
        }
    }

    /// Same request, addressed to a different backend model.
    pub fn for_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// Every backend (Mistral, OpenAI, OpenRouter, any OpenAI-compatible
/// endpoint) implements this trait. The role agents reach it only through
/// the capability client.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "mistral", "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// List available models for this provider.
    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_request_defaults() {
        let req = ProviderRequest::new("mistral-large-latest", vec![]);
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(req.response_format, ResponseFormat::Text);
        assert!(req.max_tokens.is_none());
    }

    #[test]
    fn for_model_keeps_everything_but_model() {
        let mut req = ProviderRequest::new("primary", vec![Message::user("hi")]);
        req.response_format = ResponseFormat::JsonObject;
        req.max_tokens = Some(512);

        let swapped = req.for_model("fallback");
        assert_eq!(swapped.model, "fallback");
        assert_eq!(swapped.messages.len(), 1);
        assert_eq!(swapped.response_format, ResponseFormat::JsonObject);
        assert_eq!(swapped.max_tokens, Some(512));
        assert_eq!(req.model, "primary");
    }

    #[test]
    fn response_format_serialization() {
        let json = serde_json::to_string(&ResponseFormat::JsonObject).unwrap();
        assert_eq!(json, r#""json_object""#);
    }
}
