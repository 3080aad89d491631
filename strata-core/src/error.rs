//! Error types for Strata operations

use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Configuration errors, raised before any query executes.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("No data source configured: at least one source is required")]
    MissingSource,

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Failure reported by the authoritative data source.
///
/// The message and cause are carried verbatim to the caller of `execute`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SourceError {
    message: String,
    #[source]
    cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Wrap an underlying driver or transport error.
    pub fn from_cause<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Cache store errors. These never reach the caller of `execute`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Read from tier {tier} failed: {reason}")]
    ReadFailed { tier: String, reason: String },

    #[error("Write to tier {tier} failed: {reason}")]
    WriteFailed { tier: String, reason: String },

    #[error("Payload for tier {tier} could not be decoded: {reason}")]
    Decode { tier: String, reason: String },

    #[error("Payload could not be encoded: {reason}")]
    Encode { reason: String },
}

impl StoreError {
    pub fn read_failed(tier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReadFailed {
            tier: tier.into(),
            reason: reason.into(),
        }
    }

    pub fn write_failed(tier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            tier: tier.into(),
            reason: reason.into(),
        }
    }
}

/// Master error type for all Strata errors.
#[derive(Debug, Clone, Error)]
pub enum StrataError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl StrataError {
    /// Returns true if this error came from the authoritative source.
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }
}

/// Result type alias for Strata operations.
pub type StrataResult<T> = Result<T, StrataError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_source_display() {
        let err = StrataError::from(ConfigError::MissingSource);
        let msg = format!("{}", err);
        assert!(msg.contains("No data source configured"));
    }

    #[test]
    fn test_source_error_keeps_message_verbatim() {
        let err = SourceError::new("relation \"users\" does not exist");
        assert_eq!(err.message(), "relation \"users\" does not exist");
        assert_eq!(format!("{}", err), "relation \"users\" does not exist");
    }

    #[test]
    fn test_source_error_exposes_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timed out");
        let err = SourceError::from_cause("query timed out", io);
        let cause = err.source().expect("cause should be present");
        assert_eq!(cause.to_string(), "socket timed out");
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::read_failed("redis", "connection refused");
        assert_eq!(
            format!("{}", err),
            "Read from tier redis failed: connection refused"
        );

        let err = StoreError::write_failed("disk", "no space left");
        assert!(format!("{}", err).contains("disk"));
    }

    #[test]
    fn test_is_source() {
        assert!(StrataError::from(SourceError::new("boom")).is_source());
        assert!(!StrataError::from(ConfigError::MissingSource).is_source());
    }
}
