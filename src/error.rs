//! Error types for portsweep.
//!
//! Uses `thiserror` for ergonomic error definitions. Only request validation
//! ever stops a scan; probe, fingerprint and resolver failures are absorbed
//! where they happen and never show up here.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single problem found while validating scan parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid IPv4 address: '{0}'")]
    InvalidAddress(String),

    #[error("invalid range: start address {start} is greater than end address {end}")]
    InvalidRange { start: String, end: String },

    #[error("port specification '{0}' contains no valid ports")]
    InvalidPortSpec(String),

    #[error("timeout {0}ms is out of bounds (100-9999)")]
    TimeoutOutOfBounds(u64),

    #[error("concurrency {0} is out of bounds (1-9999)")]
    ConcurrencyOutOfBounds(usize),
}

/// All validation problems found in one request, reported together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Main error type for scanning operations.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid scan request: {0}")]
    InvalidRequest(ValidationErrors),

    #[error("scan task failed: {0}")]
    TaskFailed(String),
}

impl From<ValidationError> for ScanError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidRequest(ValidationErrors(vec![err]))
    }
}

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors raised while locating, reading or writing the settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine a configuration directory for this platform")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid settings format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_join() {
        let errors = ValidationErrors(vec![
            ValidationError::InvalidAddress("300.1.1.1".to_string()),
            ValidationError::TimeoutOutOfBounds(50),
        ]);
        let message = errors.to_string();
        assert!(message.contains("300.1.1.1"));
        assert!(message.contains("50ms"));
        assert!(message.contains("; "));
    }

    #[test]
    fn test_single_issue_into_scan_error() {
        let err: ScanError = ValidationError::ConcurrencyOutOfBounds(0).into();
        match err {
            ScanError::InvalidRequest(errors) => assert_eq!(errors.0.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }
}
