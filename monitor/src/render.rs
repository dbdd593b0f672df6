//! Timestamp and color rendering for the live terminal view.
//!
//! The renderer decorates a [`LogRecord`] with its capture-time prefix and
//! the display color associated with its category. Colors are declared as
//! [`Tint`] values on the registry rules; the mapping to terminal escape
//! sequences happens only here, at the output boundary.
//!
//! Rendering is deterministic: decorating the same record twice yields
//! byte-identical output.

use std::collections::HashMap;

use crossterm::style::{Color, Stylize};
use serde::Deserialize;

use crate::patterns::PatternRegistry;
use crate::types::{Category, LogRecord};

/// Declarative display color for a category.
///
/// `Tint::None` renders the line without any styling (the uncategorized
/// fallback). Rule files spell tints in lowercase (`"red"`, `"cyan"`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tint {
    /// No styling.
    #[default]
    None,
    Red,
    Yellow,
    Green,
    Blue,
    Cyan,
    Magenta,
    White,
}

impl Tint {
    /// The terminal color for this tint, or `None` for unstyled output.
    #[must_use]
    pub fn color(self) -> Option<Color> {
        match self {
            Tint::None => None,
            Tint::Red => Some(Color::Red),
            Tint::Yellow => Some(Color::Yellow),
            Tint::Green => Some(Color::Green),
            Tint::Blue => Some(Color::Blue),
            Tint::Cyan => Some(Color::Cyan),
            Tint::Magenta => Some(Color::Magenta),
            Tint::White => Some(Color::White),
        }
    }
}

/// Decorates log records for terminal display.
///
/// Captures the category-to-tint theme from the pattern registry at
/// construction; the theme is fixed for the session lifetime.
#[derive(Debug, Clone)]
pub struct Renderer {
    theme: HashMap<String, Tint>,
}

impl Renderer {
    /// Builds a renderer themed from the registry's rules.
    #[must_use]
    pub fn new(registry: &PatternRegistry) -> Self {
        Self {
            theme: registry.theme(),
        }
    }

    /// Returns the tint for a category. Uncategorized records and
    /// categories missing from the theme render unstyled.
    #[must_use]
    pub fn tint_for(&self, category: &Category) -> Tint {
        category
            .name()
            .and_then(|name| self.theme.get(name).copied())
            .unwrap_or(Tint::None)
    }

    /// Renders a record as `[HH:MM:SS] <raw>` wrapped in its category
    /// color, ready to write to the terminal.
    #[must_use]
    pub fn decorate(&self, record: &LogRecord) -> String {
        let line = record.stamped();
        match self.tint_for(record.category()).color() {
            Some(color) => line.with(color).to_string(),
            None => line,
        }
    }
}
