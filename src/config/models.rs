use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Root configuration for scriptbot.
///
/// Deserialized from a JSON file; every field has a default so `{}` is a valid
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Log input actions instead of simulating them.
    pub dry_run: bool,

    /// Delay before every step, in milliseconds (max 600000).
    pub step_delay_ms: u64,

    /// Capacity of the step event channel observers subscribe to (1..=65536).
    pub event_capacity: usize,

    /// Log level; overridden by `--log-level`.
    pub log_level: Option<LogLevel>,

    /// Reload the script when its file changes.
    pub watch: WatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dry_run: false,
            step_delay_ms: 0,
            event_capacity: 256,
            log_level: None,
            watch: WatchConfig::default(),
        }
    }
}

/// Script file watching.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct WatchConfig {
    /// Restart the run whenever the script file changes (default: false).
    pub enabled: bool,
    /// Poll interval in milliseconds (default: 250; minimum 10).
    pub poll_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_ms: 250,
        }
    }
}

/// Logging level enumeration.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name (`warning` is accepted for `warn`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}
