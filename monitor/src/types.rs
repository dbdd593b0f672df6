//! Core data types for the log monitoring pipeline.
//!
//! A [`LogRecord`] is the immutable unit of work flowing through the
//! monitor: the raw line text as emitted by the serial bridge, the
//! wall-clock capture time, and the [`Category`] assigned by the pattern
//! registry. Records are created once per non-empty line and never
//! mutated; the renderer and the persistence sink consume them
//! independently.

use std::fmt;

use chrono::{DateTime, Local};

/// Render format for capture timestamps (`[HH:MM:SS]` prefixes).
pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

/// Semantic category assigned to a log line.
///
/// Categories are drawn from the closed set defined by the pattern
/// registry at startup, plus the implicit [`Category::Uncategorized`]
/// fallback for lines matching no rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    /// A category named by a registry rule (e.g., `error`, `network`).
    Named(String),
    /// No registry rule matched the line.
    Uncategorized,
}

impl Category {
    /// Creates a named category.
    pub fn named(name: impl Into<String>) -> Self {
        Category::Named(name.into())
    }

    /// Returns the category name, or `None` for [`Category::Uncategorized`].
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Category::Named(name) => Some(name),
            Category::Uncategorized => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Named(name) => f.write_str(name),
            Category::Uncategorized => f.write_str("uncategorized"),
        }
    }
}

/// One captured log line: raw text, capture time, and category.
///
/// Immutable after creation. The same record feeds both the live view
/// (through the filter gate and renderer) and the persistence sink, so
/// both outputs carry the same timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    raw: String,
    timestamp: DateTime<Local>,
    category: Category,
}

impl LogRecord {
    /// Creates a record stamped with the current wall-clock time.
    #[must_use]
    pub fn new(raw: String, category: Category) -> Self {
        Self::at(Local::now(), raw, category)
    }

    /// Creates a record with an explicit capture time.
    #[must_use]
    pub fn at(timestamp: DateTime<Local>, raw: String, category: Category) -> Self {
        Self {
            raw,
            timestamp,
            category,
        }
    }

    /// The raw line text, without its line terminator.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// When the line was captured.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// The category assigned by the classifier.
    #[must_use]
    pub fn category(&self) -> &Category {
        &self.category
    }

    /// The record formatted as `[HH:MM:SS] <raw text>`.
    ///
    /// This is the shared layout for both the live view (before color is
    /// applied) and the persisted log file.
    #[must_use]
    pub fn stamped(&self) -> String {
        format!("[{}] {}", self.timestamp.format(TIMESTAMP_FORMAT), self.raw)
    }
}
