//! Custom error types and handling
//!
//! These errors describe infrastructure failures: a backend that cannot be
//! reached, a command that cannot be launched, a setup step that timed out.
//! Individual operations that fail are not errors; probes record them as
//! unsuccessful samples instead.

use std::time::Duration;

/// Harness-wide error type
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    // Probe lifecycle errors
    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Unsupported test: {0}")]
    UnsupportedTest(String),

    // External service errors
    #[error("Failed to launch command: {0}")]
    Io(#[from] std::io::Error),

    #[error("Docker error: {0}")]
    Docker(String),

    // Data errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl BenchError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Setup(_) => "SETUP_FAILED",
            Self::Unavailable(_) => "BACKEND_UNAVAILABLE",
            Self::Timeout(_) => "TIMEOUT",
            Self::UnsupportedTest(_) => "UNSUPPORTED_TEST",
            Self::Io(_) => "IO_ERROR",
            Self::Docker(_) => "DOCKER_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error came from a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<bollard::errors::Error> for BenchError {
    fn from(err: bollard::errors::Error) -> Self {
        BenchError::Docker(err.to_string())
    }
}

impl From<crate::config::ConfigError> for BenchError {
    fn from(err: crate::config::ConfigError) -> Self {
        BenchError::Configuration(err.to_string())
    }
}

/// Result type alias using BenchError
pub type BenchResult<T> = Result<T, BenchError>;
