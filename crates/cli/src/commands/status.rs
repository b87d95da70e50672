//! `reasonloop status`: show the active configuration and check the backend.

use reasonloop_config::AppConfig;
use reasonloop_core::provider::Provider;
use std::time::Duration;

/// Upper bound on the backend check, so `status` never hangs.
const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of contacting the default provider.
#[derive(Debug, PartialEq)]
enum ProviderCheck {
    /// The request never got an answer.
    Unreachable(String),
    /// The endpoint answered but refused the request (usually a bad key).
    Rejected,
    /// The endpoint accepted the key. Configured models it does not list are
    /// reported; an endpoint that lists nothing is taken at its word.
    Reachable { missing_models: Vec<String> },
}

async fn check_provider(provider: &dyn Provider, models: &[&str]) -> ProviderCheck {
    match provider.health_check().await {
        Err(e) => ProviderCheck::Unreachable(e.to_string()),
        Ok(false) => ProviderCheck::Rejected,
        Ok(true) => {
            let listed = provider.list_models().await.unwrap_or_default();
            let missing_models = if listed.is_empty() {
                Vec::new()
            } else {
                models
                    .iter()
                    .filter(|m| !listed.iter().any(|l| l == *m))
                    .map(|m| m.to_string())
                    .collect()
            };
            ProviderCheck::Reachable { missing_models }
        }
    }
}

fn describe(check: &ProviderCheck) -> Vec<String> {
    match check {
        ProviderCheck::Unreachable(reason) => vec![format!("❌ Unreachable: {reason}")],
        ProviderCheck::Rejected => vec!["❌ Reachable, but the API key was rejected".to_string()],
        ProviderCheck::Reachable { missing_models } => {
            let mut lines = vec!["✅ Reachable".to_string()];
            for model in missing_models {
                lines.push(format!("⚠️  Model not offered by this provider: {model}"));
            }
            lines
        }
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let reasoning = &config.reasoning;

    println!("🧠 Reasonloop Status");
    println!("====================");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    println!("  Provider:       {}", config.default_provider);
    println!("  Primary model:  {}", config.primary_model);
    println!("  Fallback model: {}", config.fallback_model);
    println!("  Temperature:    {}", config.temperature);
    println!("  API key:        {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Threshold:      {:.2}", reasoning.validity_threshold);
    println!("  Max rounds:     {}", reasoning.max_iterations);
    println!("  Round delay:    {} ms", reasoning.round_delay_ms);
    println!(
        "  Retries:        {} attempts, {} ms base backoff",
        config.retry.max_retries, config.retry.base_delay_ms
    );
    match reasoning.max_history_in_prompt {
        Some(n) => println!("  Prompt history: last {n} attempts"),
        None => println!("  Prompt history: all attempts"),
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file, run `reasonloop onboard` first");
    }

    if !config.has_api_key() {
        println!("  ⚠️  Skipping backend check: no API key");
        return Ok(());
    }

    let router = reasonloop_providers::build_from_config(&config)?;
    let provider = router.default().ok_or("No default provider configured")?;
    println!("\n  Checking {}...", provider.name());

    let models = [config.primary_model.as_str(), config.fallback_model.as_str()];
    let check =
        match tokio::time::timeout(CHECK_TIMEOUT, check_provider(provider.as_ref(), &models)).await
        {
            Ok(check) => check,
            Err(_) => ProviderCheck::Unreachable(format!(
                "no answer within {}s",
                CHECK_TIMEOUT.as_secs()
            )),
        };
    for line in describe(&check) {
        println!("  {line}");
    }

    Ok(())
}
