//! espmon Monitor - ESP32 serial log monitor.
//!
//! This crate attaches to the output of a serial bridge subprocess
//! (`pio device monitor` by default), classifies each line into a
//! semantic category, optionally filters the live terminal view by
//! category, timestamps and colorizes displayed lines, and can persist
//! the full unfiltered stream to a session log file.
//!
//! # Overview
//!
//! Lines flow through a fixed pipeline, one at a time and in emission
//! order: classification (first matching registry rule wins), then the
//! persistence sink (unconditional), then the filter gate and renderer
//! (live view only). Cancellation and end-of-stream share one shutdown
//! path that flushes and closes the sink.
//!
//! # Modules
//!
//! - [`types`]: log records and categories
//! - [`patterns`]: pattern registry and line classification
//! - [`filter`]: category filter for the live view
//! - [`render`]: timestamp and color rendering
//! - [`sink`]: append-only session log persistence
//! - [`session`]: subprocess lifecycle and the streaming loop
//! - [`config`]: session configuration
//! - [`error`]: crate-level error type

pub mod config;
pub mod error;
pub mod filter;
pub mod patterns;
pub mod render;
pub mod session;
pub mod sink;
pub mod types;

pub use config::{SessionConfig, BRIDGE_CMD_ENV, DEFAULT_BAUD};
pub use error::{MonitorError, Result};
pub use filter::FilterGate;
pub use patterns::{PatternError, PatternRegistry, PatternRule, RuleSpec};
pub use render::{Renderer, Tint};
pub use session::{EndReason, SessionError, SessionState, SessionSummary, StreamSession};
pub use sink::{LogSink, SinkError, LOG_FILE_PREFIX};
pub use types::{Category, LogRecord};
