use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tradewinds_ingest::{
    backfill, load_registry, run_dataset_job, start_scheduler, IngestConfig, IngestDeps,
};
use tradewinds_store::{IngestionMetrics, PgStore, RedisCoordinator};

#[derive(Debug, Parser)]
#[command(name = "tradewinds-cli")]
#[command(about = "Tradewinds ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Contend for leadership and run the interval scheduler until ctrl-c.
    Schedule,
    /// Execute a single dataset's ingestion once, outside the scheduler.
    RunOnce {
        dataset: String,
    },
    /// Re-ingest a historical window for one dataset.
    Backfill {
        dataset: String,
        #[arg(value_parser = parse_utc)]
        start: DateTime<Utc>,
        #[arg(value_parser = parse_utc)]
        end: DateTime<Utc>,
    },
}

/// Accepts `2024-01-01` or a full RFC 3339 timestamp.
fn parse_utc(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = raw.parse::<DateTime<Utc>>() {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("{raw:?} is not a date or RFC 3339 timestamp"))
}

async fn build_deps(config: &IngestConfig) -> Result<IngestDeps> {
    let registry = load_registry(&config.registry_path).context("loading dataset registry")?;
    let store = PgStore::connect(&config.database_url, config.max_connections)
        .await
        .context("connecting to Postgres")?;
    let coord = RedisCoordinator::connect(&config.redis_url)
        .await
        .context("connecting to the coordination service")?;
    let metrics = IngestionMetrics::register(prometheus::default_registry())
        .context("registering ingestion metrics")?;

    Ok(IngestDeps {
        registry: Arc::new(registry),
        store: Arc::new(store),
        coord: Arc::new(coord),
        metrics: Arc::new(metrics),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = IngestConfig::from_env();
    let deps = build_deps(&config).await?;

    match cli.command {
        Commands::Schedule => {
            let scheduler = start_scheduler(deps, config.lease).await?;
            if !scheduler.is_leader() {
                println!("scheduler lock held by another instance; staying idle");
                return Ok(());
            }
            info!(jobs = scheduler.job_count(), "scheduler running; ctrl-c to stop");
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            scheduler.shutdown().await?;
        }
        Commands::RunOnce { dataset } => {
            let cfg = deps
                .registry
                .get(&dataset)
                .with_context(|| format!("unknown dataset id {dataset:?}"))?
                .clone();
            let rows = run_dataset_job(&deps, &dataset, &cfg).await?;
            println!("run complete: dataset={dataset} rows={rows}");
        }
        Commands::Backfill {
            dataset,
            start,
            end,
        } => {
            let rows = backfill(&deps, &dataset, start, end).await?;
            println!("backfill complete: dataset={dataset} rows={rows} window={start}..{end}");
        }
    }

    Ok(())
}
