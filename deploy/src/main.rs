//! espmon Deploy - ESP32 firmware build and upload pipeline.
//!
//! Runs the fixed PlatformIO sequence (clean, build, build filesystem,
//! upload, upload filesystem) with pass/fail gating, then optionally
//! hands off to `espmon-monitor`.

mod pipeline;

use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pipeline::{DeployOptions, StepEvent, StepReport};

/// espmon Deploy - ESP32 firmware build and upload pipeline.
///
/// Builds the firmware and the filesystem image, uploads both to the
/// device, and can start the serial monitor afterwards. Run from the
/// root of the PlatformIO project.
#[derive(Parser, Debug)]
#[command(name = "espmon-deploy")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
EXAMPLES:
    # Build and upload everything
    espmon-deploy --port /dev/ttyUSB0

    # Build without touching the device
    espmon-deploy --only-build

    # Upload firmware only, then watch the serial output
    espmon-deploy --no-filesystem --monitor
")]
struct Cli {
    /// Upload port of the ESP32 (auto-detected when omitted).
    #[arg(short, long)]
    port: Option<String>,

    /// Skip building and uploading the filesystem image.
    #[arg(long)]
    no_filesystem: bool,

    /// Build only; do not upload anything.
    #[arg(long)]
    only_build: bool,

    /// Start the serial monitor after a successful upload.
    #[arg(long)]
    monitor: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(run_deploy(cli))
}

async fn run_deploy(cli: Cli) -> Result<()> {
    println!("ESP32 Charging Station Management System");
    println!("Automated build and upload\n");

    if !pipeline::toolchain_available().await {
        bail!("PlatformIO not found. Install it with: pip install platformio");
    }

    if !pipeline::project_root_present(Path::new(".")) {
        bail!("platformio.ini not found. Run espmon-deploy from the ESP32 project root.");
    }

    let options = DeployOptions {
        port: cli.port.clone(),
        skip_filesystem: cli.no_filesystem,
        build_only: cli.only_build,
    };

    let report = pipeline::run(&options, |event| match event {
        StepEvent::Started(step) => print_step_banner(&step.description),
        StepEvent::Finished(step, outcome) => {
            print_step_report(outcome);
            if !outcome.success && !step.gating {
                if let Some(hint) = &step.failure_hint {
                    println!("{hint}");
                }
            }
        }
    })
    .await?;

    if !report.success {
        // run() stops at the gating failure, so it is the last report.
        let failed = report
            .steps
            .last()
            .map(|step| step.description.as_str())
            .unwrap_or("Deploy");
        bail!("{failed} failed");
    }

    if cli.only_build {
        println!("\nBuild finished successfully.");
        return Ok(());
    }

    println!("\nUpload finished successfully.");
    println!("Connect to the 'ESP32_ChargingStations' WiFi network and open http://192.168.4.1");

    if cli.monitor {
        start_monitor(cli.port.as_deref()).await?;
    } else {
        println!("\nTo watch the serial output run: espmon-monitor");
    }

    Ok(())
}

fn print_step_banner(description: &str) {
    println!("\n{}", "=".repeat(50));
    println!("{description}");
    println!("{}", "=".repeat(50));
}

fn print_step_report(report: &StepReport) {
    if report.success {
        println!("{} - OK", report.description);
        if !report.stdout.trim().is_empty() {
            println!("{}", report.stdout.trim_end());
        }
    } else {
        println!("{} - FAILED", report.description);
        if !report.stderr.trim().is_empty() {
            println!("{}", report.stderr.trim_end());
        }
    }
}

/// Hands the terminal over to the serial monitor.
///
/// Prefers the `espmon-monitor` binary installed next to this one, then
/// falls back to the search path.
async fn start_monitor(port: Option<&str>) -> Result<()> {
    let sibling = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("espmon-monitor")))
        .filter(|path| path.is_file());

    let program = match &sibling {
        Some(path) => path.as_os_str().to_os_string(),
        None => "espmon-monitor".into(),
    };

    println!("\nStarting serial monitor...");
    let mut command = tokio::process::Command::new(program);
    if let Some(port) = port {
        command.args(["--port", port]);
    }
    let status = command
        .status()
        .await
        .context("Failed to start espmon-monitor")?;
    if !status.success() {
        bail!("espmon-monitor exited with {status}");
    }
    Ok(())
}

/// Initializes the logging subsystem (diagnostics to stderr).
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}
