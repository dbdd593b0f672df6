//! Pattern registry and line classification.
//!
//! The registry is an ordered list of `(category, pattern)` rules, fixed
//! at session start. Classification walks the rules in registration order
//! and assigns the first match; iteration order is part of the contract,
//! so a line matching several rules always gets the earliest one.
//! Matching is case-insensitive and side-effect-free.
//!
//! The built-in rules cover the categories the ESP32 charging-station
//! firmware emits. A JSON rules file can replace them entirely:
//!
//! ```json
//! [
//!   { "category": "error", "pattern": "ERROR|Failed", "tint": "red" },
//!   { "category": "ota", "pattern": "OTA|update" }
//! ]
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use thiserror::Error;

use crate::render::Tint;
use crate::types::Category;

/// Errors raised while building a pattern registry.
///
/// All of these are fatal at startup; a session never streams with a
/// partially built registry.
#[derive(Error, Debug)]
pub enum PatternError {
    /// A rule's match expression failed to compile.
    #[error("invalid pattern for category '{category}': {source}")]
    InvalidPattern {
        category: String,
        #[source]
        source: regex::Error,
    },

    /// Two rules claim the same category name.
    #[error("duplicate category '{0}' in rules")]
    DuplicateCategory(String),

    /// A rules file parsed to an empty list.
    #[error("rules file defines no rules")]
    Empty,

    /// A rules file could not be read.
    #[error("failed to read rules file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rules file was not valid JSON.
    #[error("failed to parse rules file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One rule as declared in configuration, before compilation.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    /// Category name assigned to matching lines.
    pub category: String,
    /// Match expression (regular expression, matched case-insensitively).
    pub pattern: String,
    /// Display tint for the live view. Defaults to unstyled.
    #[serde(default)]
    pub tint: Tint,
}

impl RuleSpec {
    fn new(category: &str, pattern: &str, tint: Tint) -> Self {
        Self {
            category: category.to_string(),
            pattern: pattern.to_string(),
            tint,
        }
    }
}

/// A compiled rule: category name, case-insensitive expression, tint.
///
/// Immutable for the session lifetime.
#[derive(Debug, Clone)]
pub struct PatternRule {
    category: String,
    regex: Regex,
    tint: Tint,
}

impl PatternRule {
    /// The category this rule assigns.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The display tint declared for this category.
    #[must_use]
    pub fn tint(&self) -> Tint {
        self.tint
    }

    /// Whether the rule's expression matches the line.
    #[must_use]
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

/// Ordered, read-only registry of classification rules.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    rules: Vec<PatternRule>,
}

impl PatternRegistry {
    /// The built-in rule set, recovered from the firmware's log
    /// vocabulary. The firmware logs in both English and Russian, so the
    /// patterns carry both alternates.
    ///
    /// Registration order is the classification tie-break order:
    /// error, warning, success, network, station.
    #[must_use]
    pub fn defaults() -> Self {
        let specs = vec![
            RuleSpec::new("error", "ERROR|ОШИБКА|Failed|Ошибка", Tint::Red),
            RuleSpec::new("warning", "WARNING|WARN|Предупреждение", Tint::Yellow),
            RuleSpec::new("success", "SUCCESS|✅|успешно|готов", Tint::Green),
            RuleSpec::new("network", "WiFi|IP|WebSocket|HTTP", Tint::Blue),
            RuleSpec::new("station", "station|станци|charging|зарядн", Tint::Cyan),
        ];
        Self::from_specs(specs).expect("built-in patterns are valid")
    }

    /// Compiles a registry from rule specs, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::Empty`] for an empty spec list,
    /// [`PatternError::DuplicateCategory`] if a category name repeats, and
    /// [`PatternError::InvalidPattern`] if an expression fails to compile.
    pub fn from_specs(specs: Vec<RuleSpec>) -> Result<Self, PatternError> {
        if specs.is_empty() {
            return Err(PatternError::Empty);
        }

        let mut rules = Vec::with_capacity(specs.len());
        for spec in specs {
            if rules
                .iter()
                .any(|r: &PatternRule| r.category == spec.category)
            {
                return Err(PatternError::DuplicateCategory(spec.category));
            }
            let regex = RegexBuilder::new(&spec.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| PatternError::InvalidPattern {
                    category: spec.category.clone(),
                    source,
                })?;
            rules.push(PatternRule {
                category: spec.category,
                regex,
                tint: spec.tint,
            });
        }

        Ok(Self { rules })
    }

    /// Loads a registry from a JSON rules file, replacing the defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] if the file cannot be read, is not valid
    /// JSON, or its rules fail validation.
    pub fn load(path: &Path) -> Result<Self, PatternError> {
        let contents = std::fs::read_to_string(path).map_err(|source| PatternError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let specs: Vec<RuleSpec> =
            serde_json::from_str(&contents).map_err(|source| PatternError::ParseFile {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_specs(specs)
    }

    /// Classifies a line: the first rule in registration order whose
    /// expression matches wins; no match yields
    /// [`Category::Uncategorized`].
    #[must_use]
    pub fn classify(&self, line: &str) -> Category {
        self.rules
            .iter()
            .find(|rule| rule.is_match(line))
            .map(|rule| Category::named(rule.category()))
            .unwrap_or(Category::Uncategorized)
    }

    /// Whether a category name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.rules.iter().any(|rule| rule.category == name)
    }

    /// Category names in registration order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(PatternRule::category)
    }

    /// The category-to-tint theme for the renderer.
    #[must_use]
    pub fn theme(&self) -> HashMap<String, Tint> {
        self.rules
            .iter()
            .map(|rule| (rule.category.clone(), rule.tint))
            .collect()
    }
}
