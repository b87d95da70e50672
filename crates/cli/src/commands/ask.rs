//! `reasonloop ask`: single-question or interactive reasoning.

use reasonloop_agent::{
    EngineSettings, FnSink, ReasoningEngine, ReasoningFailure, ReasoningOutcome, SessionStatus,
    format_dialogue, format_solution,
};
use reasonloop_channels::CliChannel;
use reasonloop_config::AppConfig;
use reasonloop_core::channel::{Channel, ChannelMessage};
use reasonloop_core::error::ChannelError;
use reasonloop_providers::CapabilityClient;
use std::future::Future;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Conventional exit status after SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Per-invocation overrides from the command line.
#[derive(Debug, Default, Clone)]
pub struct AskOptions {
    pub show_dialogue: bool,
    pub threshold: Option<f64>,
    pub max_iterations: Option<u32>,
}

/// Apply command-line overrides and re-validate.
fn apply_overrides(config: &mut AppConfig, options: &AskOptions) -> Result<(), String> {
    if let Some(threshold) = options.threshold {
        config.reasoning.validity_threshold = threshold;
    }
    if let Some(max_iterations) = options.max_iterations {
        config.reasoning.max_iterations = max_iterations;
    }
    config.validate().map_err(|e| e.to_string())
}

type EngineParts = (ReasoningEngine, Arc<CapabilityClient>);

fn build_engine(config: &AppConfig) -> Result<EngineParts, Box<dyn std::error::Error>> {
    let router = reasonloop_providers::build_from_config(config)?;
    let provider = router.default().ok_or("No default provider configured")?;
    let client = Arc::new(CapabilityClient::from_config(provider, config));
    let engine = ReasoningEngine::new(client.clone(), EngineSettings::from(&config.reasoning))?;
    Ok((engine, client))
}

/// Text printed after a finished session.
fn render_outcome(outcome: &ReasoningOutcome, show_dialogue: bool) -> String {
    let mut out = String::new();

    match outcome.status {
        SessionStatus::Accepted { iteration } => {
            out.push_str(&format!("✅ Solution accepted in round {iteration}\n\n"));
        }
        SessionStatus::BudgetExhausted => {
            out.push_str(&format!(
                "⚠️  No solution reached the threshold in {} rounds; showing the last one\n\n",
                outcome.iterations
            ));
        }
    }

    out.push_str(&format_solution(&outcome.solution));
    out.push('\n');

    if show_dialogue {
        out.push('\n');
        out.push_str(&format_dialogue(&outcome.dialogue));
    }

    out
}

/// Forward interrupts to a running session. The first one asks the session
/// to stop before its next round; returns `true` if a second one arrives.
async fn relay_interrupts<F, Fut>(mut interrupted: F, cancel: watch::Sender<bool>) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if !interrupted().await {
        return false;
    }
    let _ = cancel.send(true);
    eprintln!("\n  Stopping after the current step (Ctrl+C again to quit now)...");
    interrupted().await
}

/// Print the result of a session. Returns whether it produced a solution.
fn report_session(
    result: &Result<ReasoningOutcome, ReasoningFailure>,
    show_dialogue: bool,
) -> bool {
    match result {
        Ok(outcome) => {
            println!();
            print!("{}", render_outcome(outcome, show_dialogue));
            true
        }
        Err(failure) => {
            eprintln!("  [Error] {failure}");
            if show_dialogue && !failure.dialogue.is_empty() {
                println!();
                print!("{}", format_dialogue(&failure.dialogue));
            }
            false
        }
    }
}

/// Run one question to completion. Ctrl+C stops the session before its next
/// round; a second Ctrl+C exits immediately.
async fn ask_once(
    engine: &ReasoningEngine,
    client: &CapabilityClient,
    question: &str,
    show_dialogue: bool,
) -> ExitCode {
    let sink = FnSink::new(|text: &str| println!("  → {text}"));
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let tokens_before = client.tokens_used();

    let watcher = tokio::spawn(async move {
        let ctrl_c = || async { tokio::signal::ctrl_c().await.is_ok() };
        if relay_interrupts(ctrl_c, cancel_tx).await {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });

    let result = engine.reason_cancellable(question, &sink, cancel_rx).await;
    watcher.abort();

    let solved = report_session(&result, show_dialogue);
    let tokens = client.tokens_used().saturating_sub(tokens_before);
    if tokens > 0 {
        println!("\n  Tokens used: {tokens}");
    }
    if solved { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

/// Wait for the next question. `None` means the user quit, either with
/// `interrupted` (Ctrl+C at the prompt) or by closing input.
async fn next_question(
    rx: &mut mpsc::Receiver<Result<ChannelMessage, ChannelError>>,
    interrupted: impl Future<Output = ()>,
) -> Option<Result<ChannelMessage, ChannelError>> {
    tokio::select! {
        msg = rx.recv() => msg,
        () = interrupted => None,
    }
}

/// Exits non-zero when a single question fails; the error has already been
/// printed by then.
pub async fn run(
    message: Option<String>,
    options: AskOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    apply_overrides(&mut config, &options)?;

    // Check for API key early and give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    MISTRAL_API_KEY=...       (default provider)");
        eprintln!("    OPENAI_API_KEY=...        (with default_provider = \"openai\")");
        eprintln!("    REASONLOOP_API_KEY=...    (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let (engine, client) = build_engine(&config)?;

    if let Some(question) = message {
        println!();
        println!("  ⏳ Reasoning...");
        println!();
        return Ok(ask_once(&engine, &client, &question, options.show_dialogue).await);
    }

    let settings = engine.settings();
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Reasonloop: Interactive Mode          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:   {}", config.default_provider);
    println!("  Models:     {} (fallback {})", config.primary_model, config.fallback_model);
    println!("  Threshold:  {:.2}", settings.validity_threshold);
    println!("  Rounds:     up to {}", settings.max_iterations);
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit', Ctrl+C or Ctrl+D to quit.");
    println!();

    let channel = CliChannel::new();
    let mut rx = channel
        .start()
        .await
        .map_err(|e| format!("Channel error: {e}"))?;

    print!("  You > ");
    std::io::stdout().flush()?;

    // Without a SIGINT handler the prompt only ends on EOF or `exit`.
    let at_prompt_ctrl_c = || async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    while let Some(result) = next_question(&mut rx, at_prompt_ctrl_c()).await {
        match result {
            Ok(msg) => {
                println!();
                ask_once(&engine, &client, &msg.content, options.show_dialogue).await;
                println!();
                print!("  You > ");
                std::io::stdout().flush()?;
            }
            Err(e) => {
                eprintln!("  [Channel Error] {e}");
                break;
            }
        }
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(ExitCode::SUCCESS)
}
