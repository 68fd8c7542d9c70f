//! The `check` command: wire the engine to the HTTP services (or run the
//! local rules offline) and report on one file.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::warn;

use redpen_client::{ClientConfig, GenerativeClient, GrammarClient, HistoryClient};
use redpen_core::{CheckOptions, CheckTrigger};
use redpen_engine::{BuiltinRules, CheckEngine, CheckOutcome, EngineConfig, RuleChecker};

use crate::display;

#[derive(Args)]
pub struct CheckArgs {
    /// Text file to analyze.
    pub file: PathBuf,

    /// Analysis language.
    #[arg(long, default_value = "en")]
    pub language: String,

    /// Drop suggestions below this confidence.
    #[arg(long, default_value_t = 30)]
    pub min_confidence: i32,

    /// Use the streaming generative service instead of the grammar service.
    #[arg(long)]
    pub stream: bool,

    /// Local rule-based checks only; no network.
    #[arg(long)]
    pub offline: bool,

    /// Service base URL.
    #[arg(long, env = "REDPEN_ENDPOINT", default_value = "http://localhost:8080")]
    pub endpoint: String,

    /// Bearer token for the remote services.
    #[arg(long, env = "REDPEN_TOKEN")]
    pub token: Option<String>,
}

pub async fn run_check(args: CheckArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;

    let options = CheckOptions {
        language: args.language.clone(),
        min_confidence: args.min_confidence,
        ..CheckOptions::default()
    };

    if args.offline {
        let suggestions = BuiltinRules::new().check(&text, &options);
        display::print_report(&text, &suggestions);
        return Ok(());
    }

    let mut client_config = ClientConfig::new(args.endpoint);
    if let Some(key) = args.token {
        client_config = client_config.with_api_key(key);
    }
    let grammar = GrammarClient::new(client_config.clone())?;
    let generative = GenerativeClient::new(client_config.clone())?;

    let engine_config = EngineConfig { options, ..EngineConfig::default() };
    let engine = CheckEngine::new(engine_config, grammar, generative, BuiltinRules::new());

    // History is advisory; a cold start without it is fine.
    match HistoryClient::new(client_config)?.load().await {
        Ok(records) => engine.load_history(&records),
        Err(err) => warn!(error = %err, "could not load ignore history"),
    }

    let outcome = if args.stream {
        engine.request_streaming_check(&text, CheckTrigger::Blur).await?
    } else {
        engine.request_check(&text, CheckTrigger::Blur).await?
    };
    match &outcome {
        CheckOutcome::Degraded { reason, .. } => {
            eprintln!("warning: service degraded ({reason}); showing local results");
        }
        CheckOutcome::Stale => anyhow::bail!("check superseded before completion"),
        _ => {}
    }

    display::print_report(&text, &engine.suggestions());
    Ok(())
}
