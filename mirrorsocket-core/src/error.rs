//! Error types for MirrorSocket
//!
//! This module defines all error types used throughout the MirrorSocket crates.
//! Client-input problems never become [`Error`] values on the wire; they are
//! answered with status codes. These types cover what the operator sees.

#![allow(missing_docs)]

use thiserror::Error;

/// Result type alias for MirrorSocket operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for MirrorSocket operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors (bind, accept, read, write)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP / WebSocket upgrade protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// TLS setup or handshake errors
    #[error("TLS error: {0}")]
    Tls(String),

    /// Certificate/key provisioning errors
    #[error("Provisioning error: {0}")]
    Provision(#[from] ProvisionError),

    /// Server lifecycle errors
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
}

/// HTTP request head and WebSocket upgrade errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The request head could not be parsed
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// The request head exceeded the size limit
    #[error("Request head too large: {size} bytes (max: {max})")]
    HeadTooLarge { size: usize, max: usize },

    /// The peer closed before a complete head arrived
    #[error("Connection closed mid-request")]
    IncompleteRequest,

    /// Missing required header
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// Invalid header value
    #[error("Invalid header value for {header}: {value}")]
    InvalidHeaderValue { header: String, value: String },
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Missing required configuration
    #[error("Missing required configuration: {field}")]
    MissingField { field: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Errors raised while producing TLS material
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Key pair generation failed
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Certificate construction or signing failed
    #[error("Certificate generation failed: {0}")]
    Certificate(String),

    /// Persisting generated material failed
    #[error("Failed to write {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by start/stop
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// `start()` called on a running server
    #[error("{0} is already running")]
    AlreadyRunning(String),

    /// `stop()` called on a server that is not running
    #[error("{0} is not running")]
    NotRunning(String),

    /// The configured address resolved to nothing
    #[error("Address {0} did not resolve to any socket address")]
    Unresolvable(String),

    /// A background task failed while shutting down
    #[error("Task failed during shutdown: {0}")]
    Join(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Protocol(ProtocolError::MissingHeader("sec-websocket-key".to_string()));
        assert_eq!(
            err.to_string(),
            "Protocol error: Missing required header: sec-websocket-key"
        );

        let err = Error::Lifecycle(LifecycleError::NotRunning("HTTP Server".to_string()));
        assert_eq!(err.to_string(), "Lifecycle error: HTTP Server is not running");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::AddrInUse));
    }

    #[test]
    fn test_persist_error_keeps_source() {
        use std::error::Error as _;
        let err = ProvisionError::Persist {
            path: "tls/key.pem".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("tls/key.pem"));
        assert!(err.source().is_some());
    }
}
