//! Configuration loading, validation, and management for Reasonloop.
//!
//! Loads configuration from `~/.reasonloop/config.toml` with environment
//! variable overrides. Validates all settings at startup; everything here is
//! read-only once the engine is built.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.reasonloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Backend provider used by every role agent
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used on the first attempt of every call
    #[serde(default = "default_primary_model")]
    pub primary_model: String,

    /// Cheaper model used once the primary is rate-limited
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    /// Sampling temperature for every role call
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Refinement loop settings
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Rate-limit retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "mistral".into()
}
fn default_primary_model() -> String {
    "mistral-large-latest".into()
}
fn default_fallback_model() -> String {
    "mistral-small-latest".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("primary_model", &self.primary_model)
            .field("fallback_model", &self.fallback_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("reasoning", &self.reasoning)
            .field("retry", &self.retry)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Refinement loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Minimum validator confidence that ends the loop early.
    #[serde(default = "default_validity_threshold")]
    pub validity_threshold: f64,

    /// Hypothesize/solve/validate rounds per session. Must be at least 1.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Pause after a rejected round, in milliseconds.
    #[serde(default = "default_round_delay_ms")]
    pub round_delay_ms: u64,

    /// Upper bound on a single progress notification, in seconds.
    #[serde(default = "default_sink_timeout_secs")]
    pub sink_timeout_secs: u64,

    /// Render only the most recent N attempts into the hypothesis prompt.
    /// Unset means every attempt is rendered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_history_in_prompt: Option<usize>,
}

fn default_validity_threshold() -> f64 {
    0.97
}
fn default_max_iterations() -> u32 {
    5
}
fn default_round_delay_ms() -> u64 {
    1000
}
fn default_sink_timeout_secs() -> u64 {
    10
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            validity_threshold: default_validity_threshold(),
            max_iterations: default_max_iterations(),
            round_delay_ms: default_round_delay_ms(),
            sink_timeout_secs: default_sink_timeout_secs(),
            max_history_in_prompt: None,
        }
    }
}

/// Rate-limit retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubles on every further retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.reasonloop/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `REASONLOOP_API_KEY` (highest priority)
    /// - `MISTRAL_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("REASONLOOP_API_KEY")
                .ok()
                .or_else(|| std::env::var("MISTRAL_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("REASONLOOP_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("REASONLOOP_MODEL") {
            self.primary_model = model;
        }

        if let Ok(model) = std::env::var("REASONLOOP_FALLBACK_MODEL") {
            self.fallback_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".reasonloop")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.reasoning.validity_threshold) {
            return Err(ConfigError::ValidationError(
                "reasoning.validity_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        // A zero budget would leave the session without any solution to return.
        if self.reasoning.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "reasoning.max_iterations must be at least 1".into(),
            ));
        }

        if self.retry.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_retries must be at least 1".into(),
            ));
        }

        if self.primary_model.trim().is_empty() || self.fallback_model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "primary_model and fallback_model must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment), either
    /// globally or on the default provider's table.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            primary_model: default_primary_model(),
            fallback_model: default_fallback_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            reasoning: ReasoningConfig::default(),
            retry: RetryConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
