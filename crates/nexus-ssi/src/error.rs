//! SSI conflict graph error types.

use thiserror::Error;

use nexus_common::error::{ErrorCode, NexusError};
use nexus_common::types::{ProcessId, TxnId};

use crate::graph::NodeHandle;

/// Result type for conflict graph operations.
pub type SsiResult<T> = Result<T, SsiError>;

/// Errors that can occur while maintaining or exporting the conflict graph.
///
/// A transaction that is simply not tracked for conflicts is not an error;
/// resolution returns `None` and export yields an empty sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SsiError {
    /// The caller cannot consume a sequence of records.
    #[error("set-valued export called in a context that cannot accept a set: {reason}")]
    UnsupportedContext {
        /// Why the context cannot take a sequence.
        reason: String,
    },

    /// The caller's expected record shape does not match the edge record.
    #[error("return type must be a row type of shape {expected}, got {actual}")]
    ShapeMismatch {
        /// The edge record shape.
        expected: String,
        /// The shape the caller asked for.
        actual: String,
    },

    /// A transaction cannot conflict with itself.
    #[error("transaction node {node} cannot conflict with itself")]
    SelfConflict {
        /// The offending node.
        node: NodeHandle,
    },

    /// Node is not registered in the graph.
    #[error("transaction node {node} not found")]
    NodeNotFound {
        /// The missing node.
        node: NodeHandle,
    },

    /// Node is being destroyed and accepts no new conflicts.
    #[error("transaction node {node} has been retired")]
    NodeRetired {
        /// The retired node.
        node: NodeHandle,
    },

    /// The session already has a tracked transaction attached.
    #[error("process {pid} is already attached to transaction node {node}")]
    SessionBusy {
        /// The session.
        pid: ProcessId,
        /// The node already attached to it.
        node: NodeHandle,
    },

    /// The node already carries a transaction ID.
    #[error("transaction node {node} already has transaction id {txn_id}")]
    TxnIdAlreadyAssigned {
        /// The node.
        node: NodeHandle,
        /// The ID it already carries.
        txn_id: TxnId,
    },

    /// The sentinel transaction ID was supplied as a real ID.
    #[error("invalid transaction id for node {node}")]
    InvalidTxnId {
        /// The node the ID was meant for.
        node: NodeHandle,
    },

    /// A fixed-size pool is exhausted.
    #[error("not enough elements in {resource} pool (limit {limit})")]
    CapacityExceeded {
        /// The exhausted pool.
        resource: &'static str,
        /// Its configured size.
        limit: usize,
    },

    /// Configuration error.
    #[error("conflict graph configuration error: {reason}")]
    InvalidConfig {
        /// What is wrong.
        reason: String,
    },

    /// Broken internal invariant. Indicates a bug.
    #[error("internal conflict graph error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl SsiError {
    /// Creates an unsupported context error.
    pub fn unsupported_context(reason: impl Into<String>) -> Self {
        Self::UnsupportedContext {
            reason: reason.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the stable error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedContext { .. } => ErrorCode::NotSupported,
            Self::ShapeMismatch { .. } => ErrorCode::TypeMismatch,
            Self::SelfConflict { .. }
            | Self::NodeNotFound { .. }
            | Self::InvalidTxnId { .. }
            | Self::InvalidConfig { .. } => ErrorCode::InvalidArgument,
            Self::NodeRetired { .. }
            | Self::SessionBusy { .. }
            | Self::TxnIdAlreadyAssigned { .. } => ErrorCode::InvalidTransactionState,
            Self::CapacityExceeded { .. } => ErrorCode::ResourceExhausted,
            Self::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// Returns true if the error reflects a caller or configuration defect
    /// rather than a transient runtime condition.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedContext { .. } | Self::ShapeMismatch { .. }
        )
    }
}

impl From<SsiError> for NexusError {
    fn from(err: SsiError) -> Self {
        match err {
            SsiError::UnsupportedContext { reason } => NexusError::not_supported(reason),
            SsiError::ShapeMismatch { expected, actual } => {
                NexusError::TypeMismatch { expected, actual }
            }
            SsiError::CapacityExceeded { resource, limit } => NexusError::ResourceExhausted {
                resource: resource.to_string(),
                limit,
            },
            SsiError::InvalidConfig { reason } => NexusError::InvalidConfig { message: reason },
            SsiError::Internal { message } => NexusError::internal(message),
            err @ (SsiError::SelfConflict { .. }
            | SsiError::NodeNotFound { .. }
            | SsiError::InvalidTxnId { .. }) => NexusError::invalid_argument(err.to_string()),
            err @ (SsiError::NodeRetired { .. }
            | SsiError::SessionBusy { .. }
            | SsiError::TxnIdAlreadyAssigned { .. }) => NexusError::InvalidTransactionState {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SsiError::unsupported_context("scalar").code(),
            ErrorCode::NotSupported
        );
        assert_eq!(
            SsiError::CapacityExceeded {
                resource: "rw-conflict",
                limit: 4
            }
            .code(),
            ErrorCode::ResourceExhausted
        );
        assert_eq!(
            SsiError::NodeRetired {
                node: NodeHandle::new(3)
            }
            .code()
            .category(),
            "Transaction"
        );
    }

    #[test]
    fn test_usage_errors() {
        assert!(SsiError::unsupported_context("scalar").is_usage_error());
        assert!(SsiError::ShapeMismatch {
            expected: "a".into(),
            actual: "b".into()
        }
        .is_usage_error());
        assert!(!SsiError::internal("torn edge").is_usage_error());
    }

    #[test]
    fn test_into_nexus_error() {
        let err: NexusError = SsiError::CapacityExceeded {
            resource: "rw-conflict",
            limit: 4,
        }
        .into();
        assert_eq!(err.code(), ErrorCode::ResourceExhausted);
        assert!(err.is_retryable());

        let err: NexusError = SsiError::SessionBusy {
            pid: ProcessId::new(7),
            node: NodeHandle::new(1),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::InvalidTransactionState);
    }

    #[test]
    fn test_error_display() {
        let err = SsiError::SelfConflict {
            node: NodeHandle::new(5),
        };
        assert_eq!(
            err.to_string(),
            "transaction node sx5 cannot conflict with itself"
        );
    }
}
