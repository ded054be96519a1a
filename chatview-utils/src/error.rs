//! Error types for chatview
//!
//! Provides a unified error type used across all chatview crates.

use std::path::PathBuf;

/// Main error type for chatview operations
#[derive(Debug, thiserror::Error)]
pub enum ChatviewError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Connection Errors ===

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Connection timeout after {millis}ms")]
    ConnectionTimeout { millis: u64 },

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Not connected to a channel")]
    NotConnected,

    // === Protocol Errors ===

    #[error("Invalid channel name: {0:?}")]
    InvalidChannel(String),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Authentication Errors ===

    #[error("Authentication failed: {0}")]
    Auth(String),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatviewError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::Connection(_) | Self::ConnectionClosed
        )
    }
}

/// Result type alias using ChatviewError
pub type Result<T> = std::result::Result<T, ChatviewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChatviewError::InvalidChannel("#".into());
        assert_eq!(err.to_string(), "Invalid channel name: \"#\"");

        let err = ChatviewError::ConnectionTimeout { millis: 2000 };
        assert_eq!(err.to_string(), "Connection timeout after 2000ms");
    }

    #[test]
    fn test_retryable() {
        assert!(ChatviewError::ConnectionTimeout { millis: 5 }.is_retryable());
        assert!(ChatviewError::ConnectionClosed.is_retryable());
        assert!(ChatviewError::connection("refused").is_retryable());
        assert!(!ChatviewError::auth("bad token").is_retryable());
        assert!(!ChatviewError::NotConnected.is_retryable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err: ChatviewError = io_err.into();
        assert!(matches!(err, ChatviewError::Io(_)));
    }
}
