use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use event_sync::apis::create_adapter;
use event_sync::config::{Config, DEFAULT_CONFIG_PATH};
use event_sync::constants::{get_supported_sources, MIN_RETENTION_DAYS};
use event_sync::delivery::{Deliverer, HttpDeliveryClient};
use event_sync::infra::build_client;
use event_sync::observability::metrics::init_metrics;
use event_sync::pipeline::{SyncMode, SyncReport, SyncWorkflow};
use event_sync::server::{start_server, AppState};
use event_sync::storage::{Ledger, SqliteLedger};
use event_sync::types::SourceAdapter;
use event_sync::{logging, ScraperError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "event_sync")]
#[command(about = "Collects event listings, deduplicates them and syncs new ones downstream")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clear the ledger and deliver every collected event
    FullSync {
        /// Sources to run (comma-separated). Available: festivalfans, ticketswap
        #[arg(long)]
        sources: Option<String>,
    },
    /// Deliver only events the ledger has not seen
    IncrementalSync {
        /// Sources to run (comma-separated)
        #[arg(long)]
        sources: Option<String>,
    },
    /// Drop ledger entries older than the retention window
    Prune {
        /// Days to keep (at least 90); defaults to ledger.retention_days
        #[arg(long)]
        days: Option<i64>,
    },
    /// Sync once (full if the ledger is empty), then incrementally on an interval
    Run,
    /// Serve the HTTP trigger endpoints
    Serve {
        /// Listen address, e.g. 0.0.0.0:3000
        #[arg(long)]
        addr: Option<String>,
    },
}

fn parse_sources(list: Option<String>) -> Option<Vec<String>> {
    list.map(|l| {
        l.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

fn open_ledger(config: &Config) -> anyhow::Result<Arc<dyn Ledger>> {
    let ledger = SqliteLedger::open(&config.ledger.path)
        .with_context(|| format!("opening ledger at {}", config.ledger.path))?;
    Ok(Arc::new(ledger))
}

fn build_workflow(config: &Config) -> anyhow::Result<Arc<SyncWorkflow>> {
    config.validate()?;

    let client = build_client(
        config.scraper.user_agent.as_deref(),
        Duration::from_secs(config.scraper.timeout_secs),
    )?;

    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    for (name, url) in config.enabled_sources() {
        match create_adapter(&name, client.clone(), url.as_deref()) {
            Some(adapter) => adapters.push(adapter),
            None => warn!("Unknown source '{}', available: {:?}", name, get_supported_sources()),
        }
    }
    if adapters.is_empty() {
        bail!("no enabled sources");
    }

    let endpoint = config.delivery.endpoint.clone().unwrap_or_default();
    let delivery = HttpDeliveryClient::new(client, endpoint, config.field_mapping()?)
        .with_api_key(config.delivery.api_key.clone())
        .with_timeout(Duration::from_secs(config.delivery.request_timeout_secs));
    let deliverer = Deliverer::new(Arc::new(delivery), config.retry_policy());

    Ok(Arc::new(SyncWorkflow::new(
        adapters,
        open_ledger(config)?,
        deliverer,
        config.sync_options(),
    )))
}

fn print_report(report: &SyncReport) {
    println!("\n📊 {} sync results (run {}):", report.mode.as_str(), report.run_id);
    println!("   Collected: {}", report.collected);
    println!("   New: {}", report.new);
    println!("   Delivered: {}", report.delivered);
    println!("   Errors: {}", report.errors);
    if report.cancelled {
        println!("   ⏹️  Cancelled before completion");
    }
    if !report.source_failures.is_empty() {
        println!("\n⚠️  Failed sources:");
        for failure in &report.source_failures {
            println!("   - {}: {}", failure.source, failure.message);
        }
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after the current step");
            token.cancel();
        }
    });
}

async fn sync_once(
    workflow: &SyncWorkflow,
    mode: SyncMode,
    only: Option<Vec<String>>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let report = workflow.run(mode, only.as_deref(), cancel).await?;
    print_report(&report);
    Ok(())
}

async fn run_scheduled(workflow: Arc<SyncWorkflow>, config: &Config, cancel: CancellationToken) -> anyhow::Result<()> {
    match workflow.ledger().prune(config.retention()).await {
        Ok(pruned) if pruned > 0 => info!("🧹 Pruned {} old ledger entries", pruned),
        Ok(_) => {}
        Err(e) => warn!("Ledger prune failed: {}", e),
    }

    let first_mode = if workflow.ledger().is_empty().await? {
        info!("📥 Ledger is empty, starting with a full sync");
        SyncMode::Full
    } else {
        SyncMode::Incremental
    };
    sync_once(&workflow, first_mode, None, &cancel).await?;

    let interval = config.sync_interval();
    info!("⏰ Incremental sync every {} minutes", interval.as_secs() / 60);
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => break,
        }
        match workflow.incremental_sync(&cancel).await {
            Ok(report) => print_report(&report),
            Err(e @ ScraperError::LedgerUnavailable(_)) => {
                error!("Ledger unavailable, stopping scheduler: {}", e);
                return Err(e.into());
            }
            Err(e) => error!("Scheduled sync failed: {}", e),
        }
    }
    println!("👋 Scheduler stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_with_env(&cli.config)?;

    if let Ok(addr) = std::env::var("EVENT_SYNC_METRICS_ADDR") {
        init_metrics(&addr);
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    match cli.command {
        Commands::FullSync { sources } => {
            println!("🔄 Running full sync...");
            let workflow = build_workflow(&config)?;
            sync_once(&workflow, SyncMode::Full, parse_sources(sources), &cancel).await?;
        }
        Commands::IncrementalSync { sources } => {
            println!("🔄 Running incremental sync...");
            let workflow = build_workflow(&config)?;
            sync_once(&workflow, SyncMode::Incremental, parse_sources(sources), &cancel).await?;
        }
        Commands::Prune { days } => {
            let days = days.unwrap_or(config.ledger.retention_days);
            if days < MIN_RETENTION_DAYS {
                bail!("retention must be at least {} days, got {}", MIN_RETENTION_DAYS, days);
            }
            let ledger = open_ledger(&config)?;
            let pruned = ledger.prune(chrono::Duration::days(days)).await?;
            println!("🧹 Pruned {} ledger entries older than {} days", pruned, days);
        }
        Commands::Run => {
            println!("🚀 Starting scheduled sync...");
            let workflow = build_workflow(&config)?;
            run_scheduled(workflow, &config, cancel).await?;
        }
        Commands::Serve { addr } => {
            let workflow = build_workflow(&config)?;
            let addr: SocketAddr = addr
                .unwrap_or_else(|| config.server.addr.clone())
                .parse()
                .context("invalid listen address")?;
            start_server(AppState { workflow, shutdown: cancel }, addr).await?;
        }
    }
    Ok(())
}
