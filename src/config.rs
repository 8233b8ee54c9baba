//! Bridge configuration
//!
//! Loaded from TOML, every field optional:
//!
//! ```toml
//! [log]
//! level = "debug"
//! format = "json"
//! directory = "/var/log/pyslot"
//! spans = false
//! filter = "pyslot::dispatch=trace"
//!
//! [dispatch]
//! catch_panics = true
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::logging::{parse_level, LogConfig, LogFormat};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub log: LogSection,

    #[serde(default)]
    pub dispatch: DispatchSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default = "default_format")]
    pub format: String,

    /// Write daily-rolling log files here instead of stderr
    #[serde(default)]
    pub directory: Option<String>,

    #[serde(default = "default_false")]
    pub spans: bool,

    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchSection {
    /// Turn panics in slot closures into exceptions; abort when false
    #[serde(default = "default_true")]
    pub catch_panics: bool,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            directory: None,
            spans: false,
            filter: None,
        }
    }
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self { catch_panics: true }
    }
}

fn default_true() -> bool { true }
fn default_false() -> bool { false }
fn default_level() -> String { "info".to_string() }
fn default_format() -> String { "compact".to_string() }

/// Configuration loading failure
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(toml::de::Error),
    InvalidValue { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value for {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::InvalidValue { .. } => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl BridgeConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// The file named by `PYSLOT_CONFIG` (or defaults), then env overrides
    pub fn load() -> Result<Self, ConfigError> {
        let config = match std::env::var_os("PYSLOT_CONFIG") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Apply `PYSLOT_*` environment variables on top of this config
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(level) = std::env::var("PYSLOT_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Ok(format) = std::env::var("PYSLOT_LOG_FORMAT") {
            self.log.format = format;
        }
        if let Ok(directory) = std::env::var("PYSLOT_LOG_DIR") {
            self.log.directory = Some(directory);
        }
        if std::env::var("PYSLOT_LOG_SPANS").is_ok() {
            self.log.spans = true;
        }
        if let Ok(value) = std::env::var("PYSLOT_CATCH_PANICS") {
            self.dispatch.catch_panics = parse_bool("dispatch.catch_panics", &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if parse_level(&self.log.level).is_none() {
            return Err(ConfigError::InvalidValue {
                key: "log.level",
                value: self.log.level.clone(),
            });
        }
        if LogFormat::parse(&self.log.format).is_none() {
            return Err(ConfigError::InvalidValue {
                key: "log.format",
                value: self.log.format.clone(),
            });
        }
        Ok(())
    }

    /// Logging settings derived from the `[log]` section
    pub fn log_config(&self) -> LogConfig {
        let mut config = LogConfig::new().with_span_events(self.log.spans);
        if let Some(level) = parse_level(&self.log.level) {
            config = config.with_level(level);
        }
        if let Some(format) = LogFormat::parse(&self.log.format) {
            config = config.with_format(format);
        }
        if let Some(directory) = &self.log.directory {
            config = config.with_file(directory);
        }
        if let Some(filter) = &self.log.filter {
            config = config.with_filter(filter.clone());
        }
        config
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

static CURRENT: Lazy<RwLock<BridgeConfig>> = Lazy::new(|| RwLock::new(BridgeConfig::default()));

/// Snapshot of the active configuration
pub fn current() -> BridgeConfig {
    CURRENT.read().clone()
}

/// Replace the active configuration
pub fn set_current(config: BridgeConfig) {
    *CURRENT.write() = config;
}

/// Whether slot dispatch converts panics into exceptions
pub(crate) fn catch_panics() -> bool {
    CURRENT.read().dispatch.catch_panics
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.log.level, "info");
        assert!(config.dispatch.catch_panics);
    }

    #[test]
    fn test_parse_sections() {
        let config = BridgeConfig::from_toml_str(
            r#"
            [log]
            level = "debug"
            format = "json"
            filter = "pyslot::dispatch=trace"

            [dispatch]
            catch_panics = false
            "#,
        )
        .unwrap();

        assert_eq!(config.log.level, "debug");
        assert!(!config.dispatch.catch_panics);

        let log = config.log_config();
        assert_eq!(log.level, tracing::Level::DEBUG);
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.filter.as_deref(), Some("pyslot::dispatch=trace"));
    }

    #[test]
    fn test_invalid_level_rejected() {
        let err = BridgeConfig::from_toml_str("[log]\nlevel = \"loud\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "log.level", .. }));
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn test_malformed_toml() {
        let err = BridgeConfig::from_toml_str("[log\nlevel = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[log]\ndirectory = \"/tmp/pyslot-logs\"").unwrap();

        let config = BridgeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.log.directory.as_deref(), Some("/tmp/pyslot-logs"));
        assert!(matches!(
            config.log_config().output,
            crate::logging::LogOutput::File { .. }
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BridgeConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    // The only test that touches PYSLOT_* variables
    #[test]
    fn test_env_overrides() {
        const VARS: [&str; 5] = [
            "PYSLOT_LOG_LEVEL",
            "PYSLOT_LOG_FORMAT",
            "PYSLOT_LOG_DIR",
            "PYSLOT_LOG_SPANS",
            "PYSLOT_CATCH_PANICS",
        ];
        let reset = || VARS.iter().for_each(|var| std::env::remove_var(var));
        reset();

        std::env::set_var("PYSLOT_LOG_LEVEL", "trace");
        std::env::set_var("PYSLOT_LOG_FORMAT", "pretty");
        std::env::set_var("PYSLOT_LOG_DIR", "/tmp/pyslot-env");
        std::env::set_var("PYSLOT_LOG_SPANS", "1");
        std::env::set_var("PYSLOT_CATCH_PANICS", "off");

        let config = BridgeConfig::default().with_env_overrides().unwrap();
        assert_eq!(config.log.level, "trace");
        assert_eq!(config.log.format, "pretty");
        assert_eq!(config.log.directory.as_deref(), Some("/tmp/pyslot-env"));
        assert!(config.log.spans);
        assert!(!config.dispatch.catch_panics);

        std::env::set_var("PYSLOT_CATCH_PANICS", "sometimes");
        let err = BridgeConfig::default().with_env_overrides().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: "dispatch.catch_panics", ref value } if value == "sometimes"
        ));

        std::env::remove_var("PYSLOT_CATCH_PANICS");
        std::env::set_var("PYSLOT_LOG_LEVEL", "loud");
        let err = BridgeConfig::default().with_env_overrides().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "log.level", .. }));

        reset();
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("k", "Yes").unwrap());
        assert!(!parse_bool("k", "0").unwrap());
        assert!(parse_bool("k", "maybe").is_err());
    }
}
