use serde::{Deserialize, Serialize};

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Tracing filter directive scoped to the codebox crates.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "codebox=trace",
            LogLevel::Debug => "codebox=debug",
            LogLevel::Info => "codebox=info",
            LogLevel::Warn => "codebox=warn",
            LogLevel::Error => "codebox=error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}
