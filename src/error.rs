//! Error types for the aggregation engine.
//!
//! Construction-time failures are returned synchronously from constructors.
//! Runtime watch failures travel as `SourceEvent::Failed` and are fanned out
//! on the coordinator's error channel; they never enter the data path.

use thiserror::Error;

/// Errors produced by formatters, resources and the coordinator.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No formatter is registered for the requested format identifier.
    /// Fatal to resource construction.
    #[error("no formatter registered for format {0:?}")]
    FormatNotFound(String),

    /// Raw bytes could not be parsed by the chosen formatter.
    #[error("failed to decode {format} payload: {reason}")]
    Decode { format: String, reason: String },

    /// A backend fetch or connect failed.
    #[error("source {locator} unavailable: {reason}")]
    SourceUnavailable { locator: String, reason: String },

    /// Terminal signal: the watch stream will deliver no further events.
    #[error("watch stream stopped")]
    Stopped,
}

impl ConfigError {
    /// Shorthand for a decode failure.
    pub fn decode(format: impl Into<String>, reason: impl ToString) -> Self {
        ConfigError::Decode {
            format: format.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a backend fetch failure.
    pub fn unavailable(locator: impl Into<String>, reason: impl ToString) -> Self {
        ConfigError::SourceUnavailable {
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }
}
