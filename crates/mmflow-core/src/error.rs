//! Error types for mmflow

use thiserror::Error;

/// Main error type for mmflow
#[derive(Error, Debug)]
pub enum MmflowError {
    /// Malformed solver or optimizer input, rejected before any iteration
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Topology or optimizer configuration that cannot produce a decision
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Postcondition failure inside the fixed-point computation
    #[error("Internal invariant violated: {0}")]
    InternalInvariantViolation(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for mmflow operations
pub type MmflowResult<T> = Result<T, MmflowError>;

impl MmflowError {
    /// Whether the error signals a bug rather than bad input
    pub fn is_internal(&self) -> bool {
        matches!(self, MmflowError::InternalInvariantViolation(_))
    }
}

impl From<serde_json::Error> for MmflowError {
    fn from(err: serde_json::Error) -> Self {
        MmflowError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for MmflowError {
    fn from(err: toml::de::Error) -> Self {
        MmflowError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MmflowError::InvalidInput("capacity of R1 is negative".to_string());
        assert_eq!(err.to_string(), "Invalid input: capacity of R1 is negative");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MmflowError = io_err.into();
        assert!(matches!(err, MmflowError::Io(_)));
    }

    #[test]
    fn test_error_from_toml() {
        let parse_err = toml::from_str::<toml::Value>("= nope").unwrap_err();
        let err: MmflowError = parse_err.into();
        assert!(matches!(err, MmflowError::Config(_)));
    }

    #[test]
    fn test_internal_classification() {
        assert!(MmflowError::InternalInvariantViolation("x".into()).is_internal());
        assert!(!MmflowError::InvalidConfiguration("x".into()).is_internal());
    }
}
