//! Logging infrastructure for the slot bridge
//!
//! Design: `tracing` everywhere, with one idempotent initialisation point:
//! - Level, format and destination configurable in code or from the environment
//! - Optional daily-rolling file output through `tracing-appender`
//! - Helpers for the events every slot call and exception transfer emits

use std::path::Path;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::Level;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub use tracing::{debug, error, info, trace, warn};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with timestamps
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// File with daily rotation
    File { directory: String, prefix: String },
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: LogFormat,
    /// Output destination
    pub output: LogOutput,
    /// Whether to include span events
    pub span_events: bool,
    /// Custom filter directives (e.g., "pyslot::dispatch=trace")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

/// Parse a level name; `None` for anything unrecognized
pub fn parse_level(s: &str) -> Option<Level> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `PYSLOT_LOG_*` variables on top of this config
    pub fn with_env_overrides(mut self) -> Self {
        // PYSLOT_LOG_LEVEL: trace, debug, info, warn, error
        if let Some(level) = std::env::var("PYSLOT_LOG_LEVEL").ok().as_deref().and_then(parse_level) {
            self.level = level;
        }

        // PYSLOT_LOG_FORMAT: pretty, compact, json
        if let Some(format) = std::env::var("PYSLOT_LOG_FORMAT").ok().as_deref().and_then(LogFormat::parse) {
            self.format = format;
        }

        // PYSLOT_LOG_DIR: write to daily-rolling files in this directory
        if let Ok(directory) = std::env::var("PYSLOT_LOG_DIR") {
            self.output = LogOutput::File {
                directory,
                prefix: "pyslot".to_string(),
            };
        }

        // PYSLOT_LOG_SPANS: show span enter/exit
        if std::env::var("PYSLOT_LOG_SPANS").is_ok() {
            self.span_events = true;
        }

        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Log to daily-rolling files under `directory`
    pub fn with_file(self, directory: impl AsRef<Path>) -> Self {
        self.with_output(LogOutput::File {
            directory: directory.as_ref().to_string_lossy().to_string(),
            prefix: "pyslot".to_string(),
        })
    }
}

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Keeps the non-blocking writer flushing for the life of the process
static WORKER_GUARD: Mutex<Option<WorkerGuard>> = parking_lot::const_mutex(None);

/// Initialize logging from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize the global subscriber; later calls are no-ops
///
/// Also a no-op when the host already installed a subscriber.
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        if let Some(guard) = install(config) {
            *WORKER_GUARD.lock() = Some(guard);
        }
    });
}

fn install(config: LogConfig) -> Option<WorkerGuard> {
    let (writer, guard) = match &config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File { directory, prefix } => {
            tracing_appender::non_blocking(rolling::daily(directory, prefix))
        }
    };

    let filter = build_filter(&config);
    let spans = span_events_config(config.span_events);
    let layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .pretty()
            .with_span_events(spans)
            .with_filter(filter)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(writer)
            .compact()
            .with_span_events(spans)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .with_writer(writer)
            .json()
            .with_span_events(spans)
            .with_filter(filter)
            .boxed(),
    };

    match tracing_subscriber::registry().with(layer).try_init() {
        Ok(()) => {
            info!(format = ?config.format, level = %config.level, "logging initialized");
            Some(guard)
        }
        // Host owns the global subscriber
        Err(_) => None,
    }
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base_filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env_lossy();

    match &config.filter {
        Some(filter_str) => filter_str
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .fold(base_filter, |filter, directive| match directive.parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(_) => {
                    warn!("Invalid filter directive: {}", directive);
                    filter
                }
            }),
        None => base_filter,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Log a slot entry point being invoked
#[inline]
pub fn log_slot_call(slot: &str, class: &str) {
    trace!(target: "pyslot::dispatch", slot, class, "slot call");
}

/// Log a slot closure returning an error
#[inline]
pub fn log_slot_error(slot: &str, class: &str, error: &dyn std::fmt::Display) {
    debug!(target: "pyslot::dispatch", slot, class, error = %error, "slot failed");
}

/// Log an exception taken out of the interpreter
#[inline]
pub fn log_capture(name: &str, msg: &str) {
    debug!(target: "pyslot::err", exception = name, message = msg, "exception captured");
}

/// Log an error handed to the interpreter
#[inline]
pub fn log_raise(name: &str, msg: &str, typed: bool) {
    debug!(target: "pyslot::err", exception = name, message = msg, typed, "exception raised");
}
