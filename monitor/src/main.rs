//! espmon Monitor - ESP32 serial log monitor.
//!
//! Spawns the serial bridge, classifies and colorizes its output, and
//! optionally saves the full stream to a session log file.
//!
//! # Environment Variables
//!
//! See the [`espmon_monitor::config`] module for available overrides.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use espmon_monitor::config::{SessionConfig, DEFAULT_BAUD};
use espmon_monitor::patterns::PatternRegistry;
use espmon_monitor::session::{EndReason, StreamSession};

/// espmon Monitor - ESP32 serial log monitor.
///
/// Attaches to the device's serial output, classifies each line
/// (error, warning, success, network, station), and colorizes it for
/// the terminal. The live view can be filtered by category; the saved
/// log always contains the full stream.
#[derive(Parser, Debug)]
#[command(name = "espmon-monitor")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
EXAMPLES:
    # Monitor with automatic port detection
    espmon-monitor

    # Monitor a specific port, show only errors
    espmon-monitor --port /dev/ttyUSB0 --filter error

    # Save the full stream while watching network activity
    espmon-monitor --filter network --save-log

    # Use a custom classification rule set
    espmon-monitor --rules rules.json
")]
struct Cli {
    /// Serial port of the ESP32 (auto-detected when omitted).
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate for the serial bridge.
    #[arg(short, long, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// Show only lines of this category in the live view.
    #[arg(short, long)]
    filter: Option<String>,

    /// Save the full unfiltered stream to esp32_log_<timestamp>.txt.
    #[arg(short, long)]
    save_log: bool,

    /// JSON rules file replacing the built-in classification rules.
    #[arg(long)]
    rules: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(run_monitor(cli))
}

/// Runs one monitoring session to completion.
async fn run_monitor(cli: Cli) -> Result<()> {
    let registry = match &cli.rules {
        Some(path) => PatternRegistry::load(path)
            .with_context(|| format!("Failed to load rules from {}", path.display()))?,
        None => PatternRegistry::defaults(),
    };

    let config = SessionConfig {
        port: cli.port,
        baud: cli.baud,
        filter: cli.filter,
        save_log: cli.save_log,
        log_dir: PathBuf::from("."),
    };

    print_banner(&config);

    let session = StreamSession::new(config, registry).context("Failed to start session")?;
    let summary = session
        .run(wait_for_shutdown())
        .await
        .context("Monitoring session failed")?;

    match summary.reason {
        EndReason::Cancelled => println!("\nMonitoring stopped."),
        EndReason::StreamEnded => println!("\nSerial bridge output ended."),
    }
    println!(
        "Lines seen: {}, displayed: {}",
        summary.lines_seen, summary.lines_displayed
    );
    if let Some(path) = summary.log_path {
        println!("Log saved to: {}", path.display());
    }

    info!("monitor exited");
    Ok(())
}

/// Prints the startup banner describing the session configuration.
fn print_banner(config: &SessionConfig) {
    println!("ESP32 Monitor");
    println!("Port:  {}", config.port.as_deref().unwrap_or("auto"));
    println!("Baud:  {}", config.baud);
    if let Some(filter) = &config.filter {
        println!("Filter: {filter}");
    }
    if config.save_log {
        println!("Saving full stream to a session log file");
    }
    println!("{}", "=".repeat(50));
    println!("Press Ctrl+C to stop");
    println!("{}", "=".repeat(50));
}

/// Initializes the logging subsystem.
///
/// Diagnostics go to stderr so they never interleave with the live view
/// on stdout.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
