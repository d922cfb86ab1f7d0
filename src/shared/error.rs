//! Shared Error Types
//!
//! This module defines the error type used by every component of the live
//! synchronization layer. Each variant maps to one failure class the
//! callers are expected to handle differently.
//!
//! # Error Categories
//!
//! - `Validation` - malformed input, rejected before it reaches the store
//! - `Connection` - transport or handshake failure
//! - `NotConnected` - operation attempted while the push channel is down
//! - `Timeout` - a request or handshake exceeded its deadline
//! - `Conflict` - business-rule violation (status transition, overlap)
//! - `Serialization` - JSON encoding or decoding failure
//! - `Http` - non-success response from the REST API
//!
//! # Usage
//!
//! ```rust
//! use vcms_sync::shared::error::SyncError;
//!
//! let error = SyncError::validation("endTime", "end must be after start");
//! assert!(!error.is_retryable());
//! ```
use thiserror::Error;

/// Errors raised by the synchronization layer
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Malformed event or entity
    #[error("Validation error in field '{field}': {message}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// Transport-level or handshake failure
    #[error("Connection error: {message}")]
    Connection {
        /// Human-readable error message
        message: String,
    },

    /// The push channel is not connected
    #[error("Not connected: cannot {operation}")]
    NotConnected {
        /// Operation that required a live channel
        operation: String,
    },

    /// A deadline elapsed
    #[error("Timed out after {elapsed_ms}ms: {operation}")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Deadline that was exceeded
        elapsed_ms: u64,
    },

    /// Business-rule violation
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable error message
        message: String,
    },

    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },

    /// Non-success HTTP status from the API
    #[error("HTTP {status}: {message}")]
    Http {
        /// Response status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },
}

impl SyncError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a new not-connected error
    pub fn not_connected(operation: impl Into<String>) -> Self {
        Self::NotConnected {
            operation: operation.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout(operation: impl Into<String>, elapsed: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Create a new conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a new HTTP error
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Whether retrying the same operation later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::NotConnected { .. } | Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Validation { .. } | Self::Conflict { .. } | Self::Serialization { .. } => false,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            let operation = err
                .url()
                .map(|url| url.path().to_string())
                .unwrap_or_else(|| "request".to_string());
            Self::Timeout {
                operation,
                elapsed_ms: 0,
            }
        } else if err.is_decode() {
            Self::serialization(err.to_string())
        } else {
            Self::connection(err.to_string())
        }
    }
}
