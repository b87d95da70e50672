//! `reasonloop config`: configuration management commands.

use reasonloop_config::AppConfig;

/// Non-fatal findings about a config that loaded successfully.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.has_api_key() {
        warnings.push("No API key set (set MISTRAL_API_KEY or REASONLOOP_API_KEY)".to_string());
    }

    if config.primary_model == config.fallback_model {
        warnings.push(format!(
            "fallback_model equals primary_model ({}); rate limits will retry the same model",
            config.primary_model
        ));
    }

    if config.reasoning.validity_threshold < 0.5 {
        warnings.push(format!(
            "validity_threshold {:.2} accepts weak solutions",
            config.reasoning.validity_threshold
        ));
    }

    if config.reasoning.sink_timeout_secs == 0 {
        warnings.push("sink_timeout_secs = 0 drops every progress notification".to_string());
    }

    warnings
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:   {}", config.default_provider);
            println!("   Models:     {} / {}", config.primary_model, config.fallback_model);
            println!("   Threshold:  {:.2}", config.reasoning.validity_threshold);
            println!("   Max rounds: {}", config.reasoning.max_iterations);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.api_key.is_some() {
        config.api_key = Some("[REDACTED]".into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some("[REDACTED]".into());
        }
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn default_config_only_warns_about_missing_key() {
        let warnings = warnings(&AppConfig::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("API key"));
    }

    #[test]
    fn same_fallback_model_is_flagged() {
        let config = AppConfig {
            api_key: Some("k".into()),
            fallback_model: "mistral-large-latest".into(),
            ..AppConfig::default()
        };
        let warnings = warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("fallback_model")));
    }
}
