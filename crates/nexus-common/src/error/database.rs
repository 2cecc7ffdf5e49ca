//! Database error types.
//!
//! Provides the shared error type for the transaction components.

use std::fmt;
use thiserror::Error;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Internal error (bug).
    Internal = 0x0001,
    /// Operation not supported.
    NotSupported = 0x0002,
    /// Invalid argument provided.
    InvalidArgument = 0x0003,
    /// A bounded shared resource is exhausted.
    ResourceExhausted = 0x0006,

    // Transaction errors (0x0300 - 0x03FF)
    /// Transaction is not in a state that allows the operation.
    InvalidTransactionState = 0x0306,

    // Query errors (0x0600 - 0x06FF)
    /// Type mismatch.
    TypeMismatch = 0x0603,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x03 => "Transaction",
            0x06 => "Query",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The main error type for NexusDB.
///
/// Component crates keep their own error enums and convert into this one
/// at crate boundaries.
///
/// # Example
///
/// ```rust
/// use nexus_common::error::{NexusError, NexusResult};
///
/// fn check_limit(live: usize, limit: usize) -> NexusResult<()> {
///     if live >= limit {
///         return Err(NexusError::ResourceExhausted {
///             resource: "rw-conflict slots".to_string(),
///             limit,
///         });
///     }
///     Ok(())
/// }
///
/// assert!(check_limit(3, 2).unwrap_err().is_retryable());
/// ```
#[derive(Debug, Error)]
pub enum NexusError {
    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// Internal error - this indicates a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// Operation not supported.
    #[error("operation not supported: {operation}")]
    NotSupported {
        /// The unsupported operation.
        operation: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    /// A bounded shared resource is exhausted.
    #[error("out of {resource}: limit of {limit} reached")]
    ResourceExhausted {
        /// The exhausted resource.
        resource: String,
        /// The configured limit.
        limit: usize,
    },

    // ==========================================================================
    // Transaction Errors
    // ==========================================================================
    /// Transaction is not in a state that allows the operation.
    #[error("invalid transaction state: {message}")]
    InvalidTransactionState {
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // Query Errors
    // ==========================================================================
    /// Type mismatch.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type.
        expected: String,
        /// Actual type.
        actual: String,
    },

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },
}

impl NexusError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::NotSupported { .. } => ErrorCode::NotSupported,
            Self::InvalidArgument { .. } | Self::InvalidConfig { .. } => {
                ErrorCode::InvalidArgument
            }
            Self::ResourceExhausted { .. } => ErrorCode::ResourceExhausted,
            Self::InvalidTransactionState { .. } => ErrorCode::InvalidTransactionState,
            Self::TypeMismatch { .. } => ErrorCode::TypeMismatch,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a not-supported error.
    #[must_use]
    pub fn not_supported(operation: impl Into<String>) -> Self {
        Self::NotSupported {
            operation: operation.into(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = NexusError::InvalidTransactionState {
            message: "retired".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::InvalidTransactionState);
        assert_eq!(err.code().category(), "Transaction");
        assert_eq!(ErrorCode::TypeMismatch.category(), "Query");
        assert_eq!(ErrorCode::ResourceExhausted.as_u16(), 0x0006);
    }

    #[test]
    fn test_error_display() {
        let err = NexusError::invalid_argument("bad handle");
        assert_eq!(err.to_string(), "invalid argument: bad handle");

        let err = NexusError::ResourceExhausted {
            resource: "rw-conflict slots".to_string(),
            limit: 8,
        };
        assert_eq!(err.to_string(), "out of rw-conflict slots: limit of 8 reached");
    }

    #[test]
    fn test_retryable() {
        let err = NexusError::ResourceExhausted {
            resource: "tracked transactions".to_string(),
            limit: 1,
        };
        assert!(err.is_retryable());
        assert!(!NexusError::internal("bug").is_retryable());
    }

    #[test]
    fn test_not_supported() {
        let err = NexusError::not_supported("scalar export");
        assert_eq!(err.code(), ErrorCode::NotSupported);
        assert_eq!(err.code().category(), "General");
    }
}
