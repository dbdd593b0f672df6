//! Append-only persistence for the full, unfiltered log stream.
//!
//! When persistence is requested the sink opens a session-named file
//! (`esp32_log_<YYYYMMDD>_<HHMMSS>.txt`) and writes every record as
//! `[HH:MM:SS] <raw text>`, flushing after each line so the file can be
//! tailed live. The sink never filters: the live view and the persisted
//! stream are independent by design.
//!
//! Failure to open the file at startup is fatal for the session. A write
//! failure mid-stream is reported once and the sink is dropped for the
//! remainder of the session; the live view continues.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;

use crate::types::LogRecord;

/// Prefix for session log file names.
pub const LOG_FILE_PREFIX: &str = "esp32_log";

/// Timestamp layout embedded in session log file names.
const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Errors from the persistence sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The session log file could not be created.
    #[error("failed to create log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be written or flushed.
    #[error("failed to write log file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Line-buffered, append-only writer for the session log file.
///
/// Owned exclusively by the stream session; there is no concurrent
/// writer. Dropping the sink flushes whatever was buffered, but the
/// session closes it explicitly through [`LogSink::finish`] so flush
/// errors surface.
#[derive(Debug)]
pub struct LogSink {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl LogSink {
    /// Opens a session log file named after the current wall-clock time
    /// inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Open`] if the file cannot be created. The
    /// session treats this as fatal: when the operator asked for
    /// persistence, silently proceeding without it is not acceptable.
    pub fn open(dir: &Path) -> Result<Self, SinkError> {
        let stamp = Local::now().format(FILE_STAMP_FORMAT);
        let path = dir.join(format!("{LOG_FILE_PREFIX}_{stamp}.txt"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SinkError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    /// Wraps an already-open log file.
    pub(crate) fn from_file(file: File, path: PathBuf) -> Self {
        Self {
            writer: BufWriter::new(file),
            path,
        }
    }

    /// Path of the session log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record as `[HH:MM:SS] <raw>` and flushes immediately.
    ///
    /// Durability over throughput: the operator must be able to `tail`
    /// the file while the session runs.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Write`] if the write or flush fails.
    pub fn append(&mut self, record: &LogRecord) -> Result<(), SinkError> {
        let write = |w: &mut BufWriter<File>| -> std::io::Result<()> {
            writeln!(w, "{}", record.stamped())?;
            w.flush()
        };
        write(&mut self.writer).map_err(|source| SinkError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Flushes and closes the sink, returning the log file path.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Write`] if the final flush fails.
    pub fn finish(mut self) -> Result<PathBuf, SinkError> {
        self.writer.flush().map_err(|source| SinkError::Write {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.path)
    }
}
