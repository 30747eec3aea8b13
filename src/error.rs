//! Error types for convlog
//!
//! This module defines the error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for convlog operations
///
/// Storage, validation, and configuration failures are all expressed
/// through this enum. Functions return [`Result`], so callers that need
/// to distinguish a caller mistake from a filesystem failure classify the
/// error with [`ErrorKind::of`].
#[derive(Error, Debug)]
pub enum ConvlogError {
    /// Malformed or missing caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors on the append or read path
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for convlog operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

/// Coarse classification of a failure, reported to callers of the tool layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself was malformed; retrying it unchanged will not help
    Validation,
    /// A filesystem operation failed; the append may have been partial
    Io,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Classify an error by walking its cause chain
    ///
    /// # Examples
    ///
    /// ```
    /// use convlog::error::{ConvlogError, ErrorKind};
    ///
    /// let err: anyhow::Error = ConvlogError::Validation("messages is required".into()).into();
    /// assert_eq!(ErrorKind::of(&err), ErrorKind::Validation);
    /// ```
    pub fn of(error: &anyhow::Error) -> Self {
        for cause in error.chain() {
            if let Some(err) = cause.downcast_ref::<ConvlogError>() {
                return match err {
                    ConvlogError::Validation(_) => ErrorKind::Validation,
                    ConvlogError::Io(_) => ErrorKind::Io,
                    _ => ErrorKind::Internal,
                };
            }
            if cause.downcast_ref::<std::io::Error>().is_some() {
                return ErrorKind::Io;
            }
        }
        ErrorKind::Internal
    }

    /// Wire name used in structured failure responses
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Io => "io_error",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
