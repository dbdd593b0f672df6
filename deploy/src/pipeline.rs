//! The build-and-deploy step sequence.
//!
//! A fixed, linear list of toolchain invocations with pass/fail gating:
//! clean, build firmware, build the filesystem image, upload firmware,
//! upload the filesystem. No retries, no concurrency, no state beyond
//! each step's outcome. A failed gating step stops the sequence; the
//! filesystem upload only warns, because the device still runs without
//! the web interface.

use std::path::Path;

use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

/// The PlatformIO executable.
pub const TOOLCHAIN: &str = "pio";

/// Errors from the deploy pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step's program could not be launched at all.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Options for one deploy run.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Upload port for the device (auto-detected when omitted).
    pub port: Option<String>,
    /// Skip building and uploading the filesystem image.
    pub skip_filesystem: bool,
    /// Build everything but upload nothing.
    pub build_only: bool,
}

/// One planned toolchain invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Operator-facing description.
    pub description: String,
    /// Program to run.
    pub program: String,
    /// Arguments to the program.
    pub args: Vec<String>,
    /// Whether a failure stops the sequence.
    pub gating: bool,
    /// Operator hint printed when a non-gating step fails.
    pub failure_hint: Option<String>,
}

impl Step {
    fn pio(description: &str, args: &[&str], gating: bool) -> Self {
        Self {
            description: description.to_string(),
            program: TOOLCHAIN.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            gating,
            failure_hint: None,
        }
    }
}

/// Progress notification delivered to the pipeline observer.
#[derive(Debug)]
pub enum StepEvent<'a> {
    /// The step is about to run.
    Started(&'a Step),
    /// The step finished with the given report.
    Finished(&'a Step, &'a StepReport),
}

/// Outcome of one executed step.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Description of the step that ran.
    pub description: String,
    /// Whether the step's process exited successfully.
    pub success: bool,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Outcome of a full pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    /// Reports for every step that was executed, in order.
    pub steps: Vec<StepReport>,
    /// Overall success: no gating step failed.
    pub success: bool,
}

/// Builds the step sequence for the given options.
///
/// Order matters and matches the upload protocol: everything is built
/// and verified before the first byte goes to the device.
#[must_use]
pub fn plan(options: &DeployOptions) -> Vec<Step> {
    let mut steps = Vec::new();

    // A failed clean leaves stale objects behind but does not block a
    // rebuild.
    steps.push(Step::pio("Clean project", &["run", "--target", "clean"], false));
    steps.push(Step::pio("Build firmware", &["run"], true));

    if !options.skip_filesystem {
        steps.push(Step::pio(
            "Build filesystem image",
            &["run", "--target", "buildfs"],
            true,
        ));
    }

    if options.build_only {
        return steps;
    }

    let mut upload_args = vec!["run", "--target", "upload"];
    let mut uploadfs_args = vec!["run", "--target", "uploadfs"];
    if let Some(port) = &options.port {
        upload_args.extend(["--upload-port", port]);
        uploadfs_args.extend(["--upload-port", port]);
    }
    steps.push(Step::pio("Upload firmware", &upload_args, true));

    if !options.skip_filesystem {
        let mut uploadfs = Step::pio("Upload filesystem image", &uploadfs_args, false);
        uploadfs.failure_hint = Some(
            "The device will run, but the web interface may be unavailable.".to_string(),
        );
        steps.push(uploadfs);
    }

    steps
}

/// Runs the full sequence for the given options, stopping at the first
/// gating failure. The observer receives a [`StepEvent`] before and
/// after every executed step, so callers can show live progress.
///
/// # Errors
///
/// Returns [`PipelineError::Launch`] if a step's program cannot be
/// started (toolchain missing); step failures are reported in the
/// [`PipelineReport`], not as errors.
pub async fn run(
    options: &DeployOptions,
    observe: impl FnMut(StepEvent<'_>),
) -> Result<PipelineReport, PipelineError> {
    run_steps(&plan(options), observe).await
}

/// Executes a step list in order with pass/fail gating.
///
/// This is the single gating implementation: a failed gating step ends
/// the sequence and the overall success, a failed non-gating step is
/// logged and skipped over.
///
/// # Errors
///
/// Returns [`PipelineError::Launch`] if a step's program cannot be
/// started.
pub async fn run_steps(
    steps: &[Step],
    mut observe: impl FnMut(StepEvent<'_>),
) -> Result<PipelineReport, PipelineError> {
    let mut reports = Vec::new();
    let mut success = true;

    for step in steps {
        info!(step = %step.description, "running deploy step");
        observe(StepEvent::Started(step));
        let report = run_step(step).await?;
        observe(StepEvent::Finished(step, &report));
        let failed = !report.success;
        reports.push(report);
        if failed {
            if step.gating {
                success = false;
                break;
            }
            warn!(step = %step.description, "non-gating step failed, continuing");
        }
    }

    Ok(PipelineReport {
        steps: reports,
        success,
    })
}

/// Executes one step, capturing its output.
///
/// # Errors
///
/// Returns [`PipelineError::Launch`] if the program cannot be started.
pub async fn run_step(step: &Step) -> Result<StepReport, PipelineError> {
    let output = Command::new(&step.program)
        .args(&step.args)
        .output()
        .await
        .map_err(|source| PipelineError::Launch {
            program: step.program.clone(),
            source,
        })?;

    Ok(StepReport {
        description: step.description.clone(),
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Whether the PlatformIO toolchain is installed and runnable.
pub async fn toolchain_available() -> bool {
    Command::new(TOOLCHAIN)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Whether `dir` looks like a PlatformIO project root.
#[must_use]
pub fn project_root_present(dir: &Path) -> bool {
    dir.join("platformio.ini").is_file()
}
