//! Error types for the espmon monitor.
//!
//! Each module defines its own error enum; this module folds them into
//! the crate-level [`MonitorError`] for callers that want a single type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::patterns::PatternError;
use crate::session::SessionError;
use crate::sink::SinkError;

/// Errors that can occur during monitor operations.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Session configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pattern registry construction error.
    #[error("pattern error: {0}")]
    Pattern(#[from] PatternError),

    /// Persistence sink error.
    #[error("persistence error: {0}")]
    Sink(#[from] SinkError),

    /// Stream session error.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
