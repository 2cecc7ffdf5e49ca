//! Resolution of the caller's transaction to a graph node.

use std::fmt;

use nexus_common::types::ProcessId;
use serde::{Deserialize, Serialize};

use crate::graph::{ConflictGraph, NodeRef};

/// Isolation level for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IsolationLevel {
    /// Read committed: sees committed data at each statement.
    ReadCommitted,
    /// Snapshot isolation: sees data as of transaction start.
    SnapshotIsolation,
    /// Serializable snapshot isolation: SI with conflict detection.
    Serializable,
}

impl IsolationLevel {
    /// Returns true if transactions at this level are tracked in the
    /// rw-conflict graph.
    pub fn tracks_conflicts(self) -> bool {
        matches!(self, Self::Serializable)
    }
}

impl Default for IsolationLevel {
    fn default() -> Self {
        Self::SnapshotIsolation
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadCommitted => write!(f, "READ COMMITTED"),
            Self::SnapshotIsolation => write!(f, "SNAPSHOT"),
            Self::Serializable => write!(f, "SERIALIZABLE"),
        }
    }
}

/// The transaction executing on behalf of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentTransaction {
    /// Session the caller runs in.
    pub pid: ProcessId,
    /// Isolation level of the running transaction.
    pub isolation: IsolationLevel,
}

impl CurrentTransaction {
    /// Creates a description of the current transaction.
    pub fn new(pid: ProcessId, isolation: IsolationLevel) -> Self {
        Self { pid, isolation }
    }

    /// A serializable transaction in session `pid`.
    pub fn serializable(pid: ProcessId) -> Self {
        Self::new(pid, IsolationLevel::Serializable)
    }
}

impl ConflictGraph {
    /// Resolves the caller's transaction to its node.
    ///
    /// Returns `None` when the transaction is not tracked: it does not run
    /// at `Serializable`, or its session has no attached node. That is not
    /// an error.
    pub fn resolve(&self, current: &CurrentTransaction) -> Option<NodeRef> {
        if !current.isolation.tracks_conflicts() {
            return None;
        }
        self.attached_node(current.pid)
    }
}
