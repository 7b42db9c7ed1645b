//! transfer-breaker
//!
//! Validates connector configuration and replays scripted transfer
//! outcomes through a circuit-breaker guarded connector.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──▶ config::load_config ──▶ TransferConfig
//!                                               │
//!                                               ▼
//!   script / --random ──▶ ScriptedTransport ──▶ Connector ◀── CircuitBreaker
//!                                               │               (rolling window,
//!                                               ▼                categorizer)
//!                                   workers on blocking tasks
//!                                               │
//!                                               ▼
//!                                  BreakerStats + summary (JSON)
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;

use transfer_breaker::config::{load_config, TransferConfig};
use transfer_breaker::observability::{logging, metrics};
use transfer_breaker::resilience::BreakerStats;
use transfer_breaker::transfer::{
    parse_script, random_script, Connector, ConnectorError, FileOperation, ScriptedTransport, Step,
};

#[derive(Parser)]
#[command(name = "transfer-breaker")]
#[command(about = "Circuit breaker tooling for FTP/SFTP connectors", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a config file, then print the breaker parameters
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Replay scripted transfer outcomes through a guarded connector
    Simulate {
        #[arg(short, long)]
        config: PathBuf,

        /// Comma separated steps: ok, refused, timeout, reset, auth,
        /// unavailable, unknown or a three-digit reply code
        #[arg(long, conflicts_with = "random")]
        script: Option<String>,

        /// Generate this many random steps instead of a script
        #[arg(long)]
        random: Option<usize>,

        #[arg(long, default_value_t = 0.5)]
        failure_rate: f64,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Worker tasks issuing operations in parallel
        #[arg(long, default_value_t = 1)]
        concurrency: usize,

        /// Pause after each operation, per worker
        #[arg(long, default_value_t = 0)]
        pause_ms: u64,
    },
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    attempted: usize,
    succeeded: usize,
    failed: usize,
    rejected: usize,
    transport_calls: usize,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    summary: Summary,
    breaker: Option<BreakerStats>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => {
            let config = load_config(&config)?;
            logging::init_logging(&config.observability.log_level);
            check(&config)?;
        }
        Commands::Simulate {
            config,
            script,
            random,
            failure_rate,
            seed,
            concurrency,
            pause_ms,
        } => {
            let config = load_config(&config)?;
            logging::init_logging(&config.observability.log_level);
            init_metrics(&config);

            let steps = match (script, random) {
                (Some(script), _) => parse_script(&script)?,
                (None, Some(n)) => random_script(n, failure_rate, seed),
                (None, None) => Vec::new(),
            };
            let report = simulate(
                config,
                steps,
                concurrency.max(1),
                Duration::from_millis(pause_ms),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn init_metrics(config: &TransferConfig) {
    if !config.observability.metrics_enabled {
        return;
    }
    match config.observability.metrics_address.parse() {
        Ok(addr) => metrics::init_metrics(addr),
        Err(_) => tracing::error!(
            metrics_address = %config.observability.metrics_address,
            "Failed to parse metrics address"
        ),
    }
}

fn check(config: &TransferConfig) -> Result<(), serde_json::Error> {
    let params = config.breaker.to_parameters();
    let output = serde_json::json!({
        "connector": config.connector.name,
        "host": config.connector.host,
        "breaker_enabled": config.breaker.enabled,
        "request_volume_threshold": params.request_volume_threshold,
        "time_window_millis": params.time_window_millis,
        "bucket_size_millis": params.bucket_size_millis,
        "number_of_buckets": config.breaker.to_breaker_config().ok().map(|c| c.number_of_buckets()),
        "failure_threshold": params.failure_threshold,
        "reset_time_millis": params.reset_time_millis,
        "failure_categories": params.failure_categories,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

const OPERATIONS: [FileOperation; 4] = [
    FileOperation::List,
    FileOperation::Get,
    FileOperation::Put,
    FileOperation::Delete,
];

#[derive(Debug, Default)]
struct Counters {
    next: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    rejected: AtomicUsize,
}

async fn simulate(
    config: TransferConfig,
    steps: Vec<Step>,
    concurrency: usize,
    pause: Duration,
) -> Result<SimulationReport, Box<dyn std::error::Error>> {
    let attempts = steps.len();
    let transport = ScriptedTransport::new(config.connector.host.clone(), steps);
    let connector = Arc::new(Connector::from_config(&config, transport)?);
    let counters = Arc::new(Counters::default());

    tracing::info!(
        connector = %connector.name(),
        attempts,
        concurrency,
        pause_ms = pause.as_millis() as u64,
        "Starting simulation"
    );

    let mut workers = Vec::with_capacity(concurrency);
    for _ in 0..concurrency {
        let connector = Arc::clone(&connector);
        let counters = Arc::clone(&counters);
        workers.push(tokio::task::spawn_blocking(move || {
            run_worker(&connector, &counters, attempts, pause)
        }));
    }
    for worker in workers {
        worker.await?;
    }

    let summary = Summary {
        attempted: attempts,
        succeeded: counters.succeeded.load(Ordering::SeqCst),
        failed: counters.failed.load(Ordering::SeqCst),
        rejected: counters.rejected.load(Ordering::SeqCst),
        transport_calls: connector.transport().calls(),
    };
    tracing::info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        rejected = summary.rejected,
        "Simulation finished"
    );

    Ok(SimulationReport {
        summary,
        breaker: connector.breaker().map(|b| b.stats()),
    })
}

fn run_worker(
    connector: &Connector<ScriptedTransport>,
    counters: &Counters,
    attempts: usize,
    pause: Duration,
) {
    loop {
        let i = counters.next.fetch_add(1, Ordering::SeqCst);
        if i >= attempts {
            return;
        }

        let path = format!("/outbound/file-{i}.csv");
        let result = match OPERATIONS[i % OPERATIONS.len()] {
            FileOperation::Get => connector.get(&path).map(drop),
            FileOperation::Put => connector.put(&path, b"payload"),
            FileOperation::List => connector.list("/outbound").map(drop),
            FileOperation::Delete => connector.delete(&path),
        };

        match result {
            Ok(()) => counters.succeeded.fetch_add(1, Ordering::SeqCst),
            Err(ConnectorError::Open(_)) => counters.rejected.fetch_add(1, Ordering::SeqCst),
            Err(ConnectorError::Transfer(_)) => counters.failed.fetch_add(1, Ordering::SeqCst),
        };

        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
    }
}
