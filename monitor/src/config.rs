//! Session configuration for the monitor.
//!
//! Configuration is supplied once at session start (normally from the
//! CLI) and is immutable for the session's lifetime.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `ESPMON_BRIDGE_CMD` | No | `pio device monitor` | Serial bridge command (whitespace-split; replaces the default verbatim, port/baud flags are not appended) |
//!
//! The override exists for the board emulator and for tests; the default
//! command is the PlatformIO serial bridge with the configured port and
//! baud rate appended.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::patterns::PatternRegistry;

/// Default serial line rate.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Environment variable overriding the serial bridge command.
pub const BRIDGE_CMD_ENV: &str = "ESPMON_BRIDGE_CMD";

/// Default serial bridge command.
const DEFAULT_BRIDGE_CMD: &[&str] = &["pio", "device", "monitor"];

/// Errors raised while validating session configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A configuration value is out of range or malformed.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// The requested filter names no registered category.
    #[error("unknown filter category '{requested}' (expected one of: {available})")]
    UnknownFilter {
        requested: String,
        available: String,
    },
}

/// Immutable configuration for one monitoring session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Serial port identifier. `None` lets the bridge auto-detect.
    pub port: Option<String>,

    /// Baud rate for the serial bridge.
    pub baud: u32,

    /// Category filter for the live view. `None` displays everything.
    pub filter: Option<String>,

    /// Whether to persist the full stream to a session log file.
    pub save_log: bool,

    /// Directory where the session log file is created.
    pub log_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: DEFAULT_BAUD,
            filter: None,
            save_log: false,
            log_dir: PathBuf::from("."),
        }
    }
}

impl SessionConfig {
    /// Validates the configuration against the session's registry.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the baud rate is zero or the
    /// requested filter names no registered category.
    pub fn validate(&self, registry: &PatternRegistry) -> Result<(), ConfigError> {
        if self.baud == 0 {
            return Err(ConfigError::InvalidValue {
                key: "baud".to_string(),
                message: "baud rate must be greater than 0".to_string(),
            });
        }

        if let Some(filter) = &self.filter {
            if !registry.contains(filter) {
                return Err(ConfigError::UnknownFilter {
                    requested: filter.clone(),
                    available: registry.categories().collect::<Vec<_>>().join(", "),
                });
            }
        }

        Ok(())
    }

    /// The serial bridge command line for this session.
    ///
    /// Honors [`BRIDGE_CMD_ENV`] verbatim when set; otherwise builds
    /// `pio device monitor [--port <port>] --baud <baud>`.
    #[must_use]
    pub fn bridge_command(&self) -> Vec<String> {
        if let Ok(raw) = env::var(BRIDGE_CMD_ENV) {
            let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
            if !parts.is_empty() {
                return parts;
            }
        }

        let mut cmd: Vec<String> = DEFAULT_BRIDGE_CMD.iter().map(|s| s.to_string()).collect();
        if let Some(port) = &self.port {
            cmd.push("--port".to_string());
            cmd.push(port.clone());
        }
        cmd.push("--baud".to_string());
        cmd.push(self.baud.to_string());
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serial_test::serial;

    #[test]
    fn default_config_is_valid() {
        let config = SessionConfig::default();
        assert!(config.validate(&PatternRegistry::defaults()).is_ok());
        assert_eq!(config.baud, DEFAULT_BAUD);
        assert!(config.port.is_none());
        assert!(!config.save_log);
    }

    #[test]
    fn zero_baud_is_rejected() {
        let config = SessionConfig {
            baud: 0,
            ..SessionConfig::default()
        };
        let err = config.validate(&PatternRegistry::defaults()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "baud"));
    }

    #[test]
    fn known_filter_is_accepted() {
        let config = SessionConfig {
            filter: Some("network".to_string()),
            ..SessionConfig::default()
        };
        assert!(config.validate(&PatternRegistry::defaults()).is_ok());
    }

    #[test]
    fn unknown_filter_is_rejected_with_choices() {
        let config = SessionConfig {
            filter: Some("netwrok".to_string()),
            ..SessionConfig::default()
        };
        let err = config.validate(&PatternRegistry::defaults()).unwrap_err();
        match err {
            ConfigError::UnknownFilter {
                requested,
                available,
            } => {
                assert_eq!(requested, "netwrok");
                assert!(available.contains("network"));
                assert!(available.contains("error"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[serial]
    fn bridge_command_defaults_to_pio() {
        env::remove_var(BRIDGE_CMD_ENV);
        let config = SessionConfig::default();
        assert_eq!(
            config.bridge_command(),
            vec!["pio", "device", "monitor", "--baud", "115200"]
        );
    }

    #[test]
    #[serial]
    fn bridge_command_includes_port_when_set() {
        env::remove_var(BRIDGE_CMD_ENV);
        let config = SessionConfig {
            port: Some("/dev/ttyUSB0".to_string()),
            baud: 9600,
            ..SessionConfig::default()
        };
        assert_eq!(
            config.bridge_command(),
            vec![
                "pio",
                "device",
                "monitor",
                "--port",
                "/dev/ttyUSB0",
                "--baud",
                "9600"
            ]
        );
    }

    #[test]
    #[serial]
    fn bridge_command_env_override_is_verbatim() {
        env::set_var(BRIDGE_CMD_ENV, "node scripts/emulate-board.js");
        let config = SessionConfig {
            port: Some("/dev/ttyUSB0".to_string()),
            ..SessionConfig::default()
        };
        assert_eq!(
            config.bridge_command(),
            vec!["node", "scripts/emulate-board.js"]
        );
        env::remove_var(BRIDGE_CMD_ENV);
    }

    #[test]
    #[serial]
    fn blank_env_override_falls_back_to_default() {
        env::set_var(BRIDGE_CMD_ENV, "   ");
        let config = SessionConfig::default();
        assert_eq!(
            config.bridge_command(),
            vec!["pio", "device", "monitor", "--baud", "115200"]
        );
        env::remove_var(BRIDGE_CMD_ENV);
    }
}
