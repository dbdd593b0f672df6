//! Stream session: subprocess lifecycle and the per-line pipeline.
//!
//! A session owns one serial bridge subprocess and drives every line of
//! its combined stdout/stderr output through the
//! classify → persist → filter → render chain, in emission order, before
//! pulling the next line. There is no internal parallelism: the only
//! suspension point is the next-line read, and a slow sink or terminal
//! simply backpressures consumption.
//!
//! # Lifecycle
//!
//! `Starting → Streaming → Draining → Closed`. End-of-stream (device
//! unplugged, bridge exited) and operator cancellation take the same
//! `Draining → Closed` path, which guarantees the persistence sink is
//! flushed and closed on every exit. A session is consumed by
//! [`StreamSession::run`] and cannot be reused.

use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, SessionConfig};
use crate::filter::FilterGate;
use crate::patterns::PatternRegistry;
use crate::render::Renderer;
use crate::sink::{LogSink, SinkError};
use crate::types::LogRecord;

/// Errors that prevent a session from streaming.
///
/// Everything here is fatal at startup; once the session is streaming,
/// per-line problems are handled in place (see the module docs of
/// [`crate::sink`]).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Session configuration failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persistence was requested but the log file could not be opened.
    #[error("persistence error: {0}")]
    Sink(#[from] SinkError),

    /// The serial bridge subprocess could not be spawned.
    #[error("failed to spawn bridge command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The spawned bridge exposed no output pipe.
    #[error("bridge subprocess has no captured output stream")]
    MissingStream,
}

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Configuration validated, resources being acquired.
    Starting,
    /// Blocking on the next line from the bridge.
    Streaming,
    /// No new lines accepted; in-flight output being flushed.
    Draining,
    /// Subprocess released and sink closed. Terminal.
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The bridge's output stream ended (e.g., device disconnected).
    StreamEnded,
    /// The operator cancelled the session.
    Cancelled,
}

/// Outcome of a completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Non-empty lines consumed from the bridge.
    pub lines_seen: u64,
    /// Lines admitted by the filter gate and rendered.
    pub lines_displayed: u64,
    /// Path of the persisted log file, if persistence was active.
    pub log_path: Option<PathBuf>,
    /// How the session ended.
    pub reason: EndReason,
}

/// One run of the monitor, from subprocess spawn to resource release.
///
/// Generic over the live-view writer so tests can capture rendered
/// output; operators get [`StreamSession::new`], which writes to stdout.
#[derive(Debug)]
pub struct StreamSession<W: Write> {
    config: SessionConfig,
    registry: PatternRegistry,
    gate: FilterGate,
    renderer: Renderer,
    out: W,
    state: SessionState,
    lines_seen: u64,
    lines_displayed: u64,
}

impl StreamSession<io::Stdout> {
    /// Creates a session rendering to standard output.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the configuration fails
    /// validation against the registry.
    pub fn new(
        config: SessionConfig,
        registry: PatternRegistry,
    ) -> Result<Self, SessionError> {
        Self::with_output(io::stdout(), config, registry)
    }
}

impl<W: Write> StreamSession<W> {
    /// Creates a session rendering to an arbitrary writer.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the configuration fails
    /// validation against the registry.
    pub fn with_output(
        out: W,
        config: SessionConfig,
        registry: PatternRegistry,
    ) -> Result<Self, SessionError> {
        config.validate(&registry)?;
        let gate = FilterGate::new(config.filter.clone());
        let renderer = Renderer::new(&registry);
        Ok(Self {
            config,
            registry,
            gate,
            renderer,
            out,
            state: SessionState::Starting,
            lines_seen: 0,
            lines_displayed: 0,
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session to completion.
    ///
    /// `shutdown` is the cancellation signal (Ctrl+C in the binary); when
    /// it completes, the session stops consuming output at the next
    /// line-read boundary, drains, and closes. End-of-stream takes the
    /// same path without operator action.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] for startup failures (sink open, spawn).
    /// After streaming begins the session always completes with a summary.
    pub async fn run(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<SessionSummary, SessionError> {
        // Starting: acquire the sink before the subprocess, so a
        // persistence failure is reported before any output is consumed.
        let mut sink = if self.config.save_log {
            let sink = LogSink::open(&self.config.log_dir)?;
            info!(path = %sink.path().display(), "session log file opened");
            Some(sink)
        } else {
            None
        };

        let argv = self.config.bridge_command();
        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SessionError::Spawn {
                command: argv.join(" "),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(SessionError::MissingStream)?;
        let stderr = child.stderr.take().ok_or(SessionError::MissingStream)?;
        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();

        self.state = SessionState::Streaming;
        info!(command = %argv.join(" "), "streaming from serial bridge");

        tokio::pin!(shutdown);
        let mut stdout_done = false;
        let mut stderr_done = false;

        // Both pipes are read in this one task; within each pipe, line
        // order is preserved end to end.
        let reason = loop {
            if stdout_done && stderr_done {
                break EndReason::StreamEnded;
            }
            tokio::select! {
                _ = &mut shutdown => break EndReason::Cancelled,
                line = stdout_lines.next_line(), if !stdout_done => match line {
                    Ok(Some(line)) => self.handle_line(&line, &mut sink),
                    Ok(None) => stdout_done = true,
                    Err(e) => {
                        warn!(error = %e, "bridge stdout read failed");
                        stdout_done = true;
                    }
                },
                line = stderr_lines.next_line(), if !stderr_done => match line {
                    Ok(Some(line)) => self.handle_line(&line, &mut sink),
                    Ok(None) => stderr_done = true,
                    Err(e) => {
                        warn!(error = %e, "bridge stderr read failed");
                        stderr_done = true;
                    }
                },
            }
        };

        // Draining: stop consuming, release the subprocess.
        self.state = SessionState::Draining;
        match reason {
            EndReason::Cancelled => {
                info!("cancellation received, draining session");
                if let Err(e) = child.start_kill() {
                    debug!(error = %e, "bridge already exited");
                }
            }
            EndReason::StreamEnded => info!("bridge output ended"),
        }
        match child.wait().await {
            Ok(status) => debug!(%status, "bridge subprocess reaped"),
            Err(e) => warn!(error = %e, "failed to reap bridge subprocess"),
        }

        // Closed: every record handed to the sink is on disk.
        let log_path = match sink {
            Some(sink) => {
                let path = sink.path().to_path_buf();
                match sink.finish() {
                    Ok(path) => Some(path),
                    Err(e) => {
                        error!(error = %e, "failed to flush session log file");
                        Some(path)
                    }
                }
            }
            None => None,
        };
        self.state = SessionState::Closed;
        info!(
            lines_seen = self.lines_seen,
            lines_displayed = self.lines_displayed,
            "session closed"
        );

        Ok(SessionSummary {
            lines_seen: self.lines_seen,
            lines_displayed: self.lines_displayed,
            log_path,
            reason,
        })
    }

    /// Drives one raw line through the pipeline.
    ///
    /// Empty lines are discarded before any component runs. Persistence
    /// is unconditional; display is gated. A sink write failure is
    /// reported once and disables persistence for the rest of the
    /// session rather than aborting the live view.
    fn handle_line(&mut self, raw: &str, sink: &mut Option<LogSink>) {
        let line = raw.trim_end();
        if line.is_empty() {
            return;
        }
        self.lines_seen += 1;

        let category = self.registry.classify(line);
        let record = LogRecord::new(line.to_string(), category);

        if let Some(active) = sink.as_mut() {
            if let Err(e) = active.append(&record) {
                error!(error = %e, "log persistence failed; continuing without saving");
                *sink = None;
            }
        }

        if self.gate.admits(&record) {
            let decorated = self.renderer.decorate(&record);
            if writeln!(self.out, "{decorated}").and_then(|()| self.out.flush()).is_err() {
                // Terminal gone; keep consuming so persistence stays complete.
                debug!("live view write failed");
            } else {
                self.lines_displayed += 1;
            }
        }
    }
}
