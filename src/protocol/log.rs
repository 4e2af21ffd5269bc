//! Server-side log records carried by `log` events.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Logger name of the request-timing middleware.
pub const LOGGING_MIDDLEWARE: &str = "OmniSharp.Middleware.LoggingMiddleware";

// Matches middleware lines such as "/codecheck: 200 339ms".
static TIMING_200: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/[/\w]+: 200 \d+ms").expect("timing pattern is a valid regex")
});

/// Severity of a server log record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
    /// A level this client does not know; kept verbatim.
    Other(String),
}

impl LogLevel {
    /// Short prefix shown in front of each record.
    #[must_use]
    pub fn prefix(&self) -> &str {
        match self {
            Self::Trace => "trce",
            Self::Debug => "dbug",
            Self::Information => "info",
            Self::Warning => "warn",
            Self::Error => "fail",
            Self::Critical => "crit",
            Self::Other(level) => level,
        }
    }

    /// The level as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Information => "INFORMATION",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
            Self::Other(level) => level,
        }
    }
}

impl From<String> for LogLevel {
    fn from(level: String) -> Self {
        match level.as_str() {
            "TRACE" => Self::Trace,
            "DEBUG" => Self::Debug,
            "INFORMATION" => Self::Information,
            "WARNING" => Self::Warning,
            "ERROR" => Self::Error,
            "CRITICAL" => Self::Critical,
            _ => Self::Other(level),
        }
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Other(level) => level,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a `log` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogRecord {
    #[serde(rename = "LogLevel")]
    pub level: LogLevel,
    pub name: String,
    #[serde(default)]
    pub message: String,
}

impl LogRecord {
    /// True for the middleware's per-request "200 OK" timing lines.
    #[must_use]
    pub fn is_timing_noise(&self) -> bool {
        self.level == LogLevel::Information
            && self.name == LOGGING_MIDDLEWARE
            && TIMING_200.is_match(&self.message)
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]: {}\n{}", self.level.prefix(), self.name, self.message)
    }
}
