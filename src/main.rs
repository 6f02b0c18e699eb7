// Society Scribe - command-line entry point
//
// Reads one user turn per stdin line and prints each answer to stdout.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use scribe_llm::OpenAICompatProvider;
use society_scribe::{init_logging, ConfigService, Session};

/// Grace period for the agent task to finish its current turn on exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "society-scribe", version, about = "Pathfinder Society scribe agent")]
struct Cli {
    /// Path to config.toml (defaults to ~/.config/society-scribe/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "society_scribe=debug" (RUST_LOG wins)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            eprintln!("society-scribe: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Arc::new(ConfigService::load(cli.config.as_deref())?);
    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level))?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting society-scribe");

    let provider = Arc::new(OpenAICompatProvider::new(config.provider_config())?);
    let session = Session::start(Arc::clone(&config), provider).await?;
    let bridge = session.bridge();
    let (handle, mut worker) = session.into_handle();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        };
        let text = match line {
            Ok(Some(text)) => text,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stdin");
                break;
            }
        };
        if text.trim().is_empty() {
            continue;
        }

        let answer = tokio::select! {
            answer = handle.ask(text) => answer,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted during a turn");
                break;
            }
        };
        match answer {
            Ok(answer) => println!("{}\n", answer),
            Err(e) => {
                tracing::error!(error = %e, "Agent stopped");
                break;
            }
        }
    }

    drop(handle);
    if tokio::time::timeout(SHUTDOWN_GRACE, &mut worker).await.is_err() {
        tracing::warn!("Agent still busy; abandoning the current turn");
        worker.abort();
    }
    bridge.close().await;
    tracing::info!("Shut down");
    Ok(())
}
