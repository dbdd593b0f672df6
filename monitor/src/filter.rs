//! Category filter for the live view.
//!
//! The gate decides whether a classified record is displayed on the
//! terminal. It never touches persistence: the sink always receives the
//! full stream, so an operator can filter the live view without losing
//! data for later inspection.

use crate::types::LogRecord;

/// Keep/drop decision for the rendered path.
///
/// With no requested category every record is admitted. With a requested
/// category, a record is admitted iff its category name matches exactly;
/// uncategorized records never match a named filter, so they are dropped
/// from the live view (but still persisted).
#[derive(Debug, Clone)]
pub struct FilterGate {
    requested: Option<String>,
}

impl FilterGate {
    /// Creates a gate for the optionally requested category.
    #[must_use]
    pub fn new(requested: Option<String>) -> Self {
        Self { requested }
    }

    /// Whether the gate admits everything.
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        self.requested.is_none()
    }

    /// Whether the record should be displayed.
    #[must_use]
    pub fn admits(&self, record: &LogRecord) -> bool {
        match &self.requested {
            None => true,
            Some(want) => record.category().name() == Some(want.as_str()),
        }
    }
}
