//! Core identifier types for NexusDB.
//!
//! These types provide type-safe wrappers around numeric identifiers,
//! preventing accidental misuse of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction identifier - uniquely identifies a top-level transaction.
///
/// Transaction IDs label the endpoints of exported rw-conflicts.
///
/// A transaction that never writes may never be assigned an ID; such
/// transactions carry [`TxnId::INVALID`] internally and surface as `None`
/// through [`TxnId::assigned`].
///
/// # Example
///
/// ```rust
/// use nexus_common::types::TxnId;
///
/// let txn = TxnId::new(1);
/// assert!(txn.is_valid());
/// assert_eq!(TxnId::INVALID.assigned(), None);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TxnId(u64);

impl TxnId {
    /// Invalid transaction ID, used as a sentinel value.
    pub const INVALID: Self = Self(0);

    /// Creates a new `TxnId` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Checks if this is a valid transaction ID.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    /// Returns `Some(self)` for a valid ID and `None` for the sentinel.
    #[inline]
    #[must_use]
    pub const fn assigned(self) -> Option<Self> {
        if self.is_valid() {
            Some(self)
        } else {
            None
        }
    }
}

impl fmt::Debug for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "TxnId(INVALID)")
        } else {
            write!(f, "TxnId({})", self.0)
        }
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TxnId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<TxnId> for u64 {
    #[inline]
    fn from(id: TxnId) -> Self {
        id.0
    }
}

/// Process identifier - identifies the backend executing a transaction.
///
/// Every transaction tracked for conflict detection runs inside exactly one
/// process (session), so the process ID is always available for a live
/// transaction even when it has no [`TxnId`] yet.
///
/// # Example
///
/// ```rust
/// use nexus_common::types::ProcessId;
///
/// let pid = ProcessId::new(100);
/// assert_eq!(pid.as_i32(), 100);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// Creates a new `ProcessId` from a raw i32 value.
    #[inline]
    #[must_use]
    pub const fn new(pid: i32) -> Self {
        Self(pid)
    }

    /// Returns the raw i32 value.
    #[inline]
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }
}

impl fmt::Debug for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProcessId({})", self.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ProcessId {
    #[inline]
    fn from(pid: i32) -> Self {
        Self::new(pid)
    }
}

impl From<ProcessId> for i32 {
    #[inline]
    fn from(pid: ProcessId) -> Self {
        pid.0
    }
}
