//! Tapestry Ingest - metadata ingestion tool

use anyhow::Result;
use clap::{Parser, Subcommand};
use tapestry_common::logging::{init_logging, LogConfig};
use tapestry_ingest::config::IngestConfig;
use tapestry_ingest::orchestrator::Orchestrator;
use tapestry_ingest::source::RunParams;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "tapestry-ingest")]
#[command(author, version, about = "Tapestry metadata ingestion tool")]
struct Cli {
    /// Run a subset instead of the full sweep
    #[command(subcommand)]
    command: Option<Command>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every registered source to completion (the default)
    Run,

    /// Run a single source's pipeline
    Source {
        /// Source name, e.g. "internet-archive"
        name: String,

        /// Optional query to spot-check instead of the default sweep
        #[arg(short, long)]
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Verbose flag sets the default; LOG_* environment variables still
    // take precedence.
    let log_config = LogConfig::from_env_or(LogConfig {
        level: if cli.verbose { "debug" } else { "info" }.to_string(),
        log_file_prefix: "tapestry-ingest".to_string(),
        ..LogConfig::default()
    });
    init_logging(&log_config)?;

    let config = IngestConfig::from_env()?;
    let pool = config.database.create_pool().await?;

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("failed to run migrations: {}", e))?;

    let orchestrator = Orchestrator::from_config(pool, &config)?;

    let result = match cli.command {
        None | Some(Command::Run) => {
            info!("starting full ingestion run");
            let report = orchestrator.run_all().await;
            report.log_summary();
            Ok(())
        },
        Some(Command::Source { name, query }) => {
            info!(source = %name, "starting single-source run");
            let params = RunParams { query };
            orchestrator
                .run_source(&name, &params)
                .await
                .map(|summary| {
                    info!(
                        source = %summary.source,
                        outcome = ?summary.outcome,
                        pages = summary.pages_fetched,
                        persisted = summary.records_persisted,
                        skipped = summary.records_skipped,
                        "single-source run finished"
                    );
                })
                .map_err(anyhow::Error::from)
        },
    };

    orchestrator.shutdown().await;
    result
}
