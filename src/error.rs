//! Error types for the playtime cache core

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the playtime cache core
#[derive(Error, Debug)]
pub enum Error {
    /// A required argument was missing or malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing user repository reported a failure
    #[error("Repository error: {0}")]
    Repository(String),

    /// A repository call did not settle within its time bound
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Duration parse error
    #[error("Failed to parse duration: {0}")]
    DurationParse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (settings) error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON (seed data) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a timeout error for the named operation
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// Whether this error came from an elapsed time bound
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = Error::timeout("find_top_by_duration", Duration::from_secs(3));
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "find_top_by_duration timed out after 3s"
        );
    }

    #[test]
    fn test_invalid_argument_display() {
        let err = Error::InvalidArgument("name cannot be blank".into());
        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), "Invalid argument: name cannot be blank");
    }

    #[test]
    fn test_source_errors_convert() {
        let io: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        let json: Error = serde_json::from_str::<u32>("x").unwrap_err().into();

        for err in [io, json, Error::Config("bad".into())] {
            let kind = match &err {
                Error::InvalidArgument(_) | Error::Repository(_) => "caller",
                Error::Timeout { .. } => "timeout",
                Error::Config(_) | Error::DurationParse(_) => "config",
                Error::Io(_) | Error::Yaml(_) | Error::Json(_) => "source",
            };
            assert_ne!(kind, "timeout");
            assert!(!err.is_timeout());
        }
    }
}
