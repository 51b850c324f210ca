//! GENESIS Operator CLI
//!
//! Drives an identity ledger from the command line: split a secret into
//! shards, register and verify identities from JSON requests, move
//! identities through their lifecycle, inspect the ledger, and run the
//! maintenance monitor.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

use genesis_core::{
    CoreError, ErrorResponse, GenesisConfig, LedgerMonitor, Orchestrator, RegistrationRequest,
    VerificationRequest,
};
use genesis_crypto::split;
use genesis_identity::Fingerprint;

/// GENESIS identity ledger
///
/// Registration-guarantee core with continuous authentication.
#[derive(Parser, Debug)]
#[command(name = "genesis-node")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long, env = "GENESIS_CONFIG")]
    config: Option<PathBuf>,

    /// Ledger data directory (overrides the configuration file)
    #[arg(short, long, env = "GENESIS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Keep the ledger in memory only
    #[arg(long, env = "GENESIS_IN_MEMORY", default_value = "false")]
    in_memory: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GENESIS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (plain, json)
    #[arg(long, env = "GENESIS_LOG_FORMAT", default_value = "plain")]
    log_format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a secret into shards
    Split {
        /// The secret, as UTF-8 text
        secret: String,

        /// Shards to produce
        #[arg(short = 'n', long, default_value = "5")]
        total: usize,

        /// Shards required to reconstruct
        #[arg(short = 'k', long, default_value = "3")]
        threshold: usize,
    },

    /// Register an identity from a JSON registration request
    Register {
        /// Request file, or `-` for stdin
        request: PathBuf,

        /// Give up after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Verify an identity from a JSON verification request
    Verify {
        /// Request file, or `-` for stdin
        request: PathBuf,
    },

    /// Freeze an identity
    Freeze {
        /// Fingerprint, 128 hex characters
        fingerprint: String,
    },

    /// Activate a pending identity
    Activate {
        /// Fingerprint, 128 hex characters
        fingerprint: String,
    },

    /// Show one record, or summarize the ledger
    Inspect {
        /// Fingerprint, 128 hex characters
        fingerprint: Option<String>,
    },

    /// Purge expired locks and print events until interrupted
    Monitor {
        /// Pass interval in milliseconds (defaults to the configuration)
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

fn setup_logging(log_level: &str, log_format: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("sled=warn".parse()?);

    match log_format.to_lowercase().as_str() {
        "json" => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
        _ => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
    }

    Ok(())
}

/// Build the configuration from the file (if any) and CLI overrides
fn build_config(args: &Args) -> Result<GenesisConfig> {
    let mut config = match &args.config {
        Some(path) => GenesisConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => GenesisConfig::default(),
    };

    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if args.in_memory {
        config.storage.in_memory = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn read_request<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request {}", path.display()))?
    };
    serde_json::from_str(&text).context("Malformed request JSON")
}

fn parse_fingerprint(hex: &str) -> Result<Fingerprint> {
    Fingerprint::from_hex(hex.trim()).context("Invalid fingerprint")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", text);
    Ok(())
}

/// Print a core outcome; core errors are reported in their wire form.
fn report<T: Serialize>(outcome: genesis_core::Result<T>) -> Result<ExitCode> {
    match outcome {
        Ok(value) => {
            print_json(&value)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            warn!(error = %e, kind = ?e.kind(), "Operation failed");
            print_json(&ErrorResponse::from(&e))?;
            Ok(if e.is_retryable() {
                ExitCode::from(75)
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn inspect(orchestrator: &Orchestrator, fingerprint: Option<&str>) -> Result<ExitCode> {
    let Some(hex) = fingerprint else {
        let ledger = orchestrator.ledger();
        return report(Ok(serde_json::json!({
            "backend": ledger.backend_name(),
            "records": ledger.record_count(),
            "locks": ledger.lock_count(),
        })));
    };

    let fingerprint = parse_fingerprint(hex)?;
    let outcome = match orchestrator.lookup(&fingerprint).await {
        Ok(Some(record)) => Ok(serde_json::json!({
            "fingerprint": record.fingerprint,
            "status": record.status,
            "registeredAt": record.registered_at,
            "shardIndices": record.shard_indices,
            "channels": record.biometric_bundle.channels().collect::<Vec<_>>(),
            "lockState": record.lock_state,
        })),
        Ok(None) => Err(CoreError::UnknownIdentity(fingerprint.short())),
        Err(e) => Err(e),
    };
    report(outcome)
}

async fn monitor(orchestrator: &Orchestrator, period: Duration) -> Result<ExitCode> {
    let mut events = orchestrator
        .take_event_receiver()
        .context("Event receiver already taken")?;
    let handle = LedgerMonitor::new(orchestrator).spawn(period);

    info!(period_ms = period.as_millis() as u64, "Press Ctrl+C to stop the monitor");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            event = events.recv() => match event {
                Some(event) => print_json(&event)?,
                None => break,
            },
        }
    }

    if let Some(stats) = handle.shutdown().await {
        info!(
            ticks = stats.ticks,
            purged_locks = stats.purged_locks,
            evicted_sessions = stats.evicted_sessions,
            failed_ticks = stats.failed_ticks,
            "Monitor stopped"
        );
    }
    let dropped = orchestrator.events().dropped();
    if dropped > 0 {
        warn!(dropped, "Events dropped while the buffer was full");
    }
    Ok(ExitCode::SUCCESS)
}

async fn run(args: Args) -> Result<ExitCode> {
    if let Command::Split {
        secret,
        total,
        threshold,
    } = &args.command
    {
        let shards = split(secret.as_bytes(), *total, *threshold).context("Failed to split secret")?;
        print_json(&shards)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = build_config(&args)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        in_memory = config.storage.in_memory,
        data_dir = %config.storage.data_dir.display(),
        "Opening GENESIS ledger"
    );
    let monitor_interval = config.monitor_interval;
    let orchestrator = Orchestrator::open(config).context("Failed to open ledger")?;

    let code = match args.command {
        Command::Split { .. } => ExitCode::SUCCESS,
        Command::Register {
            request,
            timeout_ms,
        } => {
            let request: RegistrationRequest = read_request(&request)?;
            let outcome = match timeout_ms {
                Some(ms) => {
                    orchestrator
                        .register_with_timeout(request, Duration::from_millis(ms))
                        .await
                }
                None => orchestrator.register(request).await,
            };
            report(outcome)?
        }
        Command::Verify { request } => {
            let request: VerificationRequest = read_request(&request)?;
            report(orchestrator.verify(request).await)?
        }
        Command::Freeze { fingerprint } => {
            let fingerprint = parse_fingerprint(&fingerprint)?;
            report(orchestrator.freeze(&fingerprint).await)?
        }
        Command::Activate { fingerprint } => {
            let fingerprint = parse_fingerprint(&fingerprint)?;
            report(orchestrator.activate(&fingerprint).await)?
        }
        Command::Inspect { fingerprint } => inspect(&orchestrator, fingerprint.as_deref()).await?,
        Command::Monitor { interval_ms } => {
            let period = interval_ms.map_or(monitor_interval, Duration::from_millis);
            monitor(&orchestrator, period).await?
        }
    };

    orchestrator
        .ledger()
        .flush()
        .await
        .context("Failed to flush ledger")?;
    Ok(code)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, &args.log_format)?;

    run(args).await
}
