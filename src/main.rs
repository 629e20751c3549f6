use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use assistant_bridge::jobs::OptimizeOutcome;
use assistant_bridge::{Config, Daemon};

/// Assistant bridge - webhook backend for station chat assistants
#[derive(Parser)]
#[command(name = "assistant-bridge", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve webhooks and run scheduled jobs (default)
    Serve,
    /// Delete last week's sessions and submissions now
    Cleanup,
    /// Rebuild the document vector store if its settings have drifted
    OptimizeVectorStore,
    /// Upload a directory of .txt documents for the document assistant
    SyncDocuments {
        /// Directory containing the documents
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set
    let filter = match cli.verbose {
        0 => "info,assistant_bridge=info",
        1 => "info,assistant_bridge=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    let daemon = Daemon::new(config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!("starting assistant bridge");
            daemon.run().await?;
        }
        Command::Cleanup => {
            let reports = daemon.cleanup().await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Command::OptimizeVectorStore => match daemon.optimize_vector_store().await? {
            OptimizeOutcome::NoStore => println!("No vector store recorded; nothing to optimize."),
            OptimizeOutcome::AlreadyOptimal => println!("Vector store settings are already optimal."),
            OptimizeOutcome::NoFiles => println!("Vector store has no files to re-index."),
            OptimizeOutcome::Optimized {
                previous,
                current,
                file_count,
            } => println!("Re-indexed {file_count} files from {previous} into {current}."),
        },
        Command::SyncDocuments { dir } => {
            let report = daemon.sync_documents(&dir).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
