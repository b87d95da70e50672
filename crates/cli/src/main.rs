//! Reasonloop CLI: the main entry point.
//!
//! Commands:
//! - `onboard` - Write a default config file
//! - `ask`     - Reason about one question, or enter interactive mode
//! - `status`  - Show the active configuration
//! - `config`  - Validate, show or locate the config file

use clap::{Parser, Subcommand};
use std::process::ExitCode;

mod commands;

#[derive(Parser)]
#[command(
    name = "reasonloop",
    about = "Reasonloop: iterative hypothesize/solve/validate reasoning over an LLM",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Ask a question and reason until a solution is accepted
    Ask {
        /// Ask a single question instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Print the full agent dialogue after the solution
        #[arg(long)]
        dialogue: bool,

        /// Override the acceptance threshold (0.0 - 1.0)
        #[arg(long)]
        threshold: Option<f64>,

        /// Override the round budget
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// Show system status
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Load and validate the config file
    Validate,
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Ask {
            message,
            dialogue,
            threshold,
            max_iterations,
        } => {
            let options = commands::ask::AskOptions {
                show_dialogue: dialogue,
                threshold,
                max_iterations,
            };
            return commands::ask::run(message, options).await;
        }
        Commands::Status => commands::status::run().await?,
        Commands::Config { action } => match action {
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_flags_parse() {
        let cli = Cli::try_parse_from([
            "reasonloop",
            "ask",
            "-m",
            "How do I focus?",
            "--dialogue",
            "--threshold",
            "0.9",
            "--max-iterations",
            "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Ask {
                message,
                dialogue,
                threshold,
                max_iterations,
            } => {
                assert_eq!(message.as_deref(), Some("How do I focus?"));
                assert!(dialogue);
                assert_eq!(threshold, Some(0.9));
                assert_eq!(max_iterations, Some(2));
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn config_subcommands_parse() {
        let cli = Cli::try_parse_from(["reasonloop", "-v", "config", "path"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Path
            }
        ));
    }
}
