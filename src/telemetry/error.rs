use std::fmt;

use crate::config::ConfigError;

/// Why a single probe produced no usable reading.
///
/// Failures never escape the engine; the publisher turns them into a stale or
/// default snapshot according to the metric's [`FailurePolicy`].
///
/// [`FailurePolicy`]: super::types::FailurePolicy
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeFailure {
    /// The query ran but matched nothing (no battery, no interfaces, ...).
    NoData(String),
    /// An OS call returned a non-success status.
    QueryFailed(&'static str, i32),
    /// Output was present but could not be interpreted.
    Parse(String),
    /// An external command could not be spawned or exited non-zero.
    Subprocess { program: String, detail: String },
    /// An external command outlived the configured timeout and was killed.
    Timeout { program: String },
    /// The interface does not exist on this platform.
    Unsupported(&'static str),
    /// Every strategy of a fallback chain failed, in order.
    Exhausted(Vec<String>),
    /// The blocking worker running the probe panicked or was cancelled.
    Worker(String),
}

impl ProbeFailure {
    pub fn no_data(detail: impl Into<String>) -> Self {
        ProbeFailure::NoData(detail.into())
    }

    pub fn parse(detail: impl Into<String>) -> Self {
        ProbeFailure::Parse(detail.into())
    }

    pub fn subprocess(program: &str, detail: impl Into<String>) -> Self {
        ProbeFailure::Subprocess {
            program: program.to_string(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::NoData(detail) => write!(f, "no data: {}", detail),
            ProbeFailure::QueryFailed(call, code) => write!(f, "{} returned {}", call, code),
            ProbeFailure::Parse(detail) => write!(f, "unparseable output: {}", detail),
            ProbeFailure::Subprocess { program, detail } => {
                write!(f, "{} failed: {}", program, detail)
            }
            ProbeFailure::Timeout { program } => write!(f, "{} timed out", program),
            ProbeFailure::Unsupported(what) => write!(f, "{} is not supported here", what),
            ProbeFailure::Exhausted(attempts) => {
                write!(f, "all strategies failed ({})", attempts.join("; "))
            }
            ProbeFailure::Worker(detail) => write!(f, "probe worker failed: {}", detail),
        }
    }
}

impl std::error::Error for ProbeFailure {}

/// Failure to construct an engine. Nothing after construction is fatal.
#[derive(Debug)]
pub enum TelemetryError {
    Config(ConfigError),
    Runtime(std::io::Error),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::Config(err) => write!(f, "configuration error: {}", err),
            TelemetryError::Runtime(err) => write!(f, "failed to build telemetry runtime: {}", err),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::Config(err) => Some(err),
            TelemetryError::Runtime(err) => Some(err),
        }
    }
}

impl From<ConfigError> for TelemetryError {
    fn from(err: ConfigError) -> Self {
        TelemetryError::Config(err)
    }
}
