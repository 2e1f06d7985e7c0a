#![warn(clippy::all, clippy::pedantic)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use logger::init_tracing;
use tracing::info;

use uppe_checks::alerts::{AlertDispatcher, LogDispatcher, TwilioSms};
use uppe_checks::config::{AlertProvider, Config};
use uppe_checks::database::{LibsqlStore, MemoryStore, RecordStore};
use uppe_checks::monitoring::{CheckEngine, HttpChecker, MonitoringExecutor, MonitoringScheduler, TickTrigger};

/// Periodic uptime checker for stored HTTP/HTTPS checks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file (created with defaults if missing)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Run a single tick and exit
    #[arg(long)]
    once: bool,

    /// Keep records in memory instead of the database file
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_deref())?;

    if cli.print_config {
        println!("{config}");
        return Ok(());
    }

    let store: Arc<dyn RecordStore> = if cli.in_memory {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(LibsqlStore::open(&config.store.path, config.store.max_connections).await?)
    };

    let dispatcher: Arc<dyn AlertDispatcher> = match config.alerts.provider {
        AlertProvider::Log => Arc::new(LogDispatcher),
        AlertProvider::Twilio => Arc::new(TwilioSms::new(config.alerts.twilio.clone())?),
    };

    let executor = Arc::new(MonitoringExecutor::new(Arc::new(HttpChecker::new()?)));
    let engine = Arc::new(CheckEngine::new(
        store,
        executor,
        dispatcher,
        config.engine.max_concurrent_probes,
    ));

    if cli.once {
        let report = engine.run_tick().await;
        info!(?report, "Single tick finished");
        return Ok(());
    }

    let mut scheduler = MonitoringScheduler::new(engine);
    let handle = scheduler.start(TickTrigger::Interval(config.engine.interval()));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, waiting for running ticks");
    scheduler.stop().await;
    handle.await?;

    Ok(())
}
