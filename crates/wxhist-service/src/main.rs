//! wxhist - Daily history rollups for weather station readings.
//!
//! Run with: `cargo run -p wxhist-service -- once`

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use wxhist_core::HistoryBuilder;
use wxhist_service::{Config, RunSummary, Scheduler, StationSummary};
use wxhist_store::Store;

/// wxhist - Daily history rollups for weather station readings.
#[derive(Parser, Debug)]
#[command(name = "wxhist")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides config).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Print pass summaries as JSON.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run scheduled passes in the foreground (default behavior).
    Run,

    /// Run a single pass over every station and exit.
    Once,

    /// Run a single pass for one station and exit.
    Station {
        /// Station id as configured.
        id: String,
    },

    /// Validate the configuration and exit.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wxhist_core=info".parse()?)
                .add_directive("wxhist_service=info".parse()?),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    if let Some(db_path) = args.database.clone() {
        config.storage.path = db_path;
    }
    config.validate()?;

    let command = args.command.unwrap_or(Command::Run);
    if let Command::Check = command {
        println!(
            "Configuration OK: {} station(s), database {}",
            config.stations.len(),
            config.storage.path.display()
        );
        return Ok(());
    }

    info!("Opening database at {:?}", config.storage.path);
    let store = Store::open(&config.storage.path)?;
    let builder = HistoryBuilder::new(store, config.stations(), config.history.policy());
    let scheduler = Scheduler::new(builder, &config.history);

    match command {
        Command::Run | Command::Check => run_forever(&scheduler).await,
        Command::Once => {
            let report = scheduler.run_once().await?;
            let summary = RunSummary::from(&report);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                for station in &summary.stations {
                    println!("{}", station);
                }
                for failure in &summary.failures {
                    println!("{} failed: {}", failure.station_id, failure.error);
                }
            }
            Ok(())
        }
        Command::Station { id } => {
            let report = scheduler.run_station(&id).await?;
            let summary = StationSummary::from(&report);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", summary);
            }
            Ok(())
        }
    }
}

async fn run_forever(scheduler: &Scheduler<Store>) -> anyhow::Result<()> {
    let shutdown = scheduler.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    scheduler.run().await;
    Ok(())
}
