use std::{fs::OpenOptions, path::{Path, PathBuf}, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use run_tracker_data_management::{default_data_dir, DataManager};
use run_tracker_lib::stopwatch::format_stopwatch;
use run_tracker_session::{Collaborators, Tracker, TrackerConfig};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::console::{format_status, parse_line, print_updates, ConsoleLine};

mod console;

#[derive(Parser)]
#[command(name = "tracker")]
#[command(about = "Record runs from a stream of location fixes", long_about = None)]
struct Cli {
    /// key = value configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[arg(long)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session driven by console lines from stdin or a script
    Session {
        #[arg(long)]
        script: Option<PathBuf>,
    },
    /// List stored runs, newest first
    Runs {
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(log_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir).with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("tracker.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=info,run_tracker_session=info,run_tracker_data_management=info", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let log_dir = cli.log_dir.unwrap_or_else(|| data_dir.join("log"));
    init_tracing(&log_dir)?;

    let config = match &cli.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };

    let data_manager = DataManager::start(&data_dir).await?;

    match cli.command {
        Commands::Session { script } => run_session(config, data_manager, script).await,
        Commands::Runs { json } => list_runs(&data_manager, json).await,
    }
}

async fn run_session(config: TrackerConfig, data_manager: DataManager, script: Option<PathBuf>) -> anyhow::Result<()> {
    tracing::info!("Starting session for {} ({} kg)", config.profile.name, config.profile.weight_kg);

    let collaborators = Collaborators {
        converter: config.coordinate_system.converter(),
        store: Arc::new(data_manager),
        settings: Arc::new(config.profile.clone()),
    };
    let tracker = Tracker::start(&config, collaborators);
    let sink = tracker.location_sink();

    let cancel = CancellationToken::new();
    let printer = tokio::spawn(print_updates(tracker.bus().clone(), cancel.clone()));

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match script {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open script {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let parsed = match parse_line(&line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("{:#}", err);
                continue;
            }
        };

        match parsed {
            ConsoleLine::Command(command) => tracker.send(command).await?,
            ConsoleLine::Fix(fix) => sink.push(fix).await?,
            ConsoleLine::Wait(duration) => tokio::time::sleep(duration).await,
            ConsoleLine::Status => println!("{}", format_status(&tracker.snapshot())),
            ConsoleLine::Quit => break,
        }
    }

    tracker.shutdown().await;
    cancel.cancel();
    printer.await?;

    Ok(())
}

async fn list_runs(data_manager: &DataManager, json: bool) -> anyhow::Result<()> {
    let runs = data_manager.get_runs().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    for run in runs {
        let summary = &run.summary;
        println!(
            "{}\t{}\t{} m\t{}\t{} km/h\t{} kcal",
            run.run_id,
            summary.timestamp.format("%d/%m/%Y %H:%M (UTC)"),
            summary.distance_meters,
            format_stopwatch(summary.duration_millis, false),
            summary.avg_speed_kmh,
            summary.calories_burned
        );
    }

    Ok(())
}
