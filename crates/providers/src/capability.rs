//! Capability client: one structured call with model fallback on rate limits.
//!
//! Every role agent talks to the backend through `CapabilityClient::invoke`.
//! A call starts on the primary model. When the backend signals capacity
//! pressure (HTTP 429 or a "capacity exceeded" reply) the next attempt goes to
//! the fallback model after an exponential backoff. Anything else fails fast.

use reasonloop_core::error::{DecodeError, Error, ProviderError};
use reasonloop_core::message::Message;
use reasonloop_core::provider::{Provider, ProviderRequest, ResponseFormat};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt budget and backoff schedule for a single `invoke`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles after every further one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Which configured model an attempt is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Primary,
    Fallback,
}

impl Backend {
    /// Backend for the attempt that follows a failure with `error`.
    fn after(self, error: &ProviderError) -> Self {
        if error.is_capacity_signal() {
            Backend::Fallback
        } else {
            self
        }
    }
}

/// Sends role prompts to a provider and decodes JSON-object replies.
pub struct CapabilityClient {
    provider: Arc<dyn Provider>,
    primary_model: String,
    fallback_model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    retry: RetryPolicy,
    tokens_used: AtomicU64,
}

impl CapabilityClient {
    pub fn new(
        provider: Arc<dyn Provider>,
        primary_model: impl Into<String>,
        fallback_model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            primary_model: primary_model.into(),
            fallback_model: fallback_model.into(),
            temperature: 0.7,
            max_tokens: None,
            retry: RetryPolicy::default(),
            tokens_used: AtomicU64::new(0),
        }
    }

    /// Build a client from the loaded application configuration.
    pub fn from_config(provider: Arc<dyn Provider>, config: &reasonloop_config::AppConfig) -> Self {
        Self::new(provider, &config.primary_model, &config.fallback_model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_retry(RetryPolicy {
                max_attempts: config.retry.max_retries,
                base_delay: Duration::from_millis(config.retry.base_delay_ms),
            })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Total tokens the backend reported across every successful call.
    pub fn tokens_used(&self) -> u64 {
        self.tokens_used.load(Ordering::Relaxed)
    }

    /// Model identifier a backend selection resolves to.
    pub fn model_for(&self, backend: Backend) -> &str {
        match backend {
            Backend::Primary => &self.primary_model,
            Backend::Fallback => &self.fallback_model,
        }
    }

    /// Send `messages` and decode the reply into `T`.
    ///
    /// Decode failures are returned as [`Error::Decode`] and never retried.
    pub async fn invoke<T: DeserializeOwned>(&self, messages: Vec<Message>) -> Result<T, Error> {
        let content = self.invoke_raw(messages).await?;
        decode_reply(&content)
    }

    /// Send `messages` and return the raw reply content.
    pub async fn invoke_raw(&self, messages: Vec<Message>) -> Result<String, Error> {
        let mut request = ProviderRequest::new(&self.primary_model, messages);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request.response_format = ResponseFormat::JsonObject;

        let max_attempts = self.retry.max_attempts.max(1);
        let mut backend = Backend::Primary;
        let mut attempt = 1;

        loop {
            let model = self.model_for(backend);
            debug!(provider = %self.provider.name(), model, attempt, "Invoking backend");

            let error = match self.provider.complete(request.for_model(model)).await {
                Ok(response) => {
                    if let Some(usage) = &response.usage {
                        self.tokens_used
                            .fetch_add(u64::from(usage.total_tokens), Ordering::Relaxed);
                        debug!(
                            model = %response.model,
                            prompt_tokens = usage.prompt_tokens,
                            completion_tokens = usage.completion_tokens,
                            total_tokens = usage.total_tokens,
                            "Backend replied"
                        );
                    }
                    return Ok(response.message.content);
                }
                Err(e) => e,
            };

            if !error.is_capacity_signal() {
                return Err(error.into());
            }

            if attempt >= max_attempts {
                warn!(attempts = attempt, error = %error, "Retry budget exhausted");
                return Err(ProviderError::MaxRetriesExceeded {
                    attempts: attempt,
                    last_error: error.to_string(),
                }
                .into());
            }

            let delay = self.retry.delay_for(attempt);
            backend = backend.after(&error);
            warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                next_model = %self.model_for(backend),
                error = %error,
                "Backend under capacity pressure, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Decode one JSON object reply into `T`.
pub fn decode_reply<T: DeserializeOwned>(content: &str) -> Result<T, Error> {
    serde_json::from_str(content).map_err(|source| {
        DecodeError::Json {
            record: record_name::<T>(),
            source,
        }
        .into()
    })
}

fn record_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reasonloop_core::provider::{ProviderResponse, Usage};
    use serde::Deserialize;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed list of outcomes and records the model of every call.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        models: Mutex<Vec<String>>,
        formats: Mutex<Vec<ResponseFormat>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                models: Mutex::new(Vec::new()),
                formats: Mutex::new(Vec::new()),
            })
        }

        fn models(&self) -> Vec<String> {
            self.models.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.models.lock().unwrap().push(request.model.clone());
            self.formats.lock().unwrap().push(request.response_format);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("ScriptedProvider ran out of replies");
            reply.map(|content| ProviderResponse {
                message: Message::assistant(content),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: request.model,
            })
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Answer {
        answer: String,
    }

    fn rate_limited() -> Result<String, ProviderError> {
        Err(ProviderError::RateLimited { retry_after_secs: 5 })
    }

    fn assert_elapsed(started: tokio::time::Instant, expected: Duration) {
        let elapsed = started.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(50),
            "elapsed {elapsed:?}, expected {expected:?}"
        );
    }

    fn client(provider: Arc<ScriptedProvider>) -> CapabilityClient {
        CapabilityClient::new(provider, "large", "small")
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn capacity_failures_switch_to_fallback() {
        let limited = ProviderError::RateLimited { retry_after_secs: 1 };
        assert_eq!(Backend::Primary.after(&limited), Backend::Fallback);
        assert_eq!(Backend::Fallback.after(&limited), Backend::Fallback);
        let network = ProviderError::Network("reset".into());
        assert_eq!(Backend::Primary.after(&network), Backend::Primary);
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success_uses_primary_in_json_mode() {
        let provider = ScriptedProvider::new(vec![Ok(r#"{"answer":"42"}"#.into())]);
        let reply: Answer = client(provider.clone()).invoke(vec![Message::user("q")]).await.unwrap();

        assert_eq!(reply.answer, "42");
        assert_eq!(provider.models(), vec!["large"]);
        assert_eq!(
            provider.formats.lock().unwrap().as_slice(),
            &[ResponseFormat::JsonObject]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn two_rate_limits_then_fallback_success() {
        let provider = ScriptedProvider::new(vec![
            rate_limited(),
            Err(ProviderError::CapacityExceeded("service_tier_capacity_exceeded".into())),
            Ok(r#"{"answer":"ok"}"#.into()),
        ]);
        let started = tokio::time::Instant::now();

        let reply: Answer = client(provider.clone()).invoke(vec![Message::user("q")]).await.unwrap();

        assert_eq!(reply.answer, "ok");
        assert_eq!(provider.models(), vec!["large", "small", "small"]);
        // Two backoffs: 1s then 2s.
        assert_elapsed(started, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_are_terminal() {
        let provider = ScriptedProvider::new(vec![rate_limited(), rate_limited(), rate_limited()]);
        let started = tokio::time::Instant::now();

        let err = client(provider.clone())
            .invoke::<Answer>(vec![Message::user("q")])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Provider(ProviderError::MaxRetriesExceeded { attempts: 3, .. })
        ));
        assert_eq!(provider.models().len(), 3);
        // No sleep after the last attempt.
        assert_elapsed(started, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn non_capacity_failure_is_not_retried() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::AuthenticationFailed(
            "bad key".into(),
        ))]);
        let started = tokio::time::Instant::now();

        let err = client(provider.clone())
            .invoke::<Answer>(vec![Message::user("q")])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Provider(ProviderError::AuthenticationFailed(_))
        ));
        assert_eq!(provider.models().len(), 1);
        assert!(started.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_reply_is_decode_error_without_retry() {
        let provider = ScriptedProvider::new(vec![Ok(r#"{"answer":"x","extra":1}"#.into())]);

        let err = client(provider.clone())
            .invoke::<Answer>(vec![Message::user("q")])
            .await
            .unwrap_err();

        match err {
            Error::Decode(DecodeError::Json { record, .. }) => assert_eq!(record, "Answer"),
            other => panic!("expected decode error, got {other:?}"),
        }
        assert_eq!(provider.models().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_comes_from_config() {
        let mut config = reasonloop_config::AppConfig::default();
        config.retry.max_retries = 2;
        config.retry.base_delay_ms = 10;
        config.primary_model = "gpt-4o".into();
        config.fallback_model = "gpt-4o-mini".into();

        let provider = ScriptedProvider::new(vec![rate_limited(), rate_limited()]);
        let client = CapabilityClient::from_config(provider.clone(), &config);
        assert_eq!(client.retry_policy().max_attempts, 2);

        let err = client.invoke::<Answer>(vec![Message::user("q")]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::MaxRetriesExceeded { attempts: 2, .. })
        ));
        assert_eq!(provider.models(), vec!["gpt-4o", "gpt-4o-mini"]);
    }

    #[tokio::test(start_paused = true)]
    async fn token_usage_accumulates_over_successful_calls() {
        let provider = ScriptedProvider::new(vec![
            Ok(r#"{"answer":"a"}"#.into()),
            rate_limited(),
            Ok(r#"{"answer":"b"}"#.into()),
        ]);
        let client = client(provider);
        assert_eq!(client.tokens_used(), 0);

        client.invoke::<Answer>(vec![Message::user("q")]).await.unwrap();
        assert_eq!(client.tokens_used(), 15);

        // The rate-limited attempt reports nothing.
        client.invoke::<Answer>(vec![Message::user("q")]).await.unwrap();
        assert_eq!(client.tokens_used(), 30);
    }
}
