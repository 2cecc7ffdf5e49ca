//! rw-conflict edges.

use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use super::node::{NodeHandle, NodeRef, TransactionNode};

/// Identifier of a conflict edge.
///
/// Allocated from a graph-wide counter while both endpoint locks are held,
/// which keeps each node's lists sorted by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EdgeId(u64);

impl EdgeId {
    /// Creates an edge ID from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rw{}", self.0)
    }
}

/// A directed rw-antidependency: `source` read something `target` later
/// overwrote.
///
/// Endpoints are fixed at creation. The edge holds only weak references to
/// its endpoints; the nodes own the edge through their lists.
pub struct ConflictEdge {
    id: EdgeId,
    source_handle: NodeHandle,
    target_handle: NodeHandle,
    source: Weak<TransactionNode>,
    target: Weak<TransactionNode>,
}

impl ConflictEdge {
    /// Creates an edge between two live nodes.
    pub(crate) fn new(id: EdgeId, source: &NodeRef, target: &NodeRef) -> Self {
        Self {
            id,
            source_handle: source.handle(),
            target_handle: target.handle(),
            source: Arc::downgrade(source),
            target: Arc::downgrade(target),
        }
    }

    /// Returns the edge ID.
    pub fn id(&self) -> EdgeId {
        self.id
    }

    /// Handle of the reading transaction.
    pub fn source_handle(&self) -> NodeHandle {
        self.source_handle
    }

    /// Handle of the writing transaction.
    pub fn target_handle(&self) -> NodeHandle {
        self.target_handle
    }

    /// Upgrades the source reference, if the node is still alive.
    pub fn source(&self) -> Option<NodeRef> {
        self.source.upgrade()
    }

    /// Upgrades the target reference, if the node is still alive.
    pub fn target(&self) -> Option<NodeRef> {
        self.target.upgrade()
    }

    /// Returns true if this edge runs from `source` to `target`.
    pub fn connects(&self, source: NodeHandle, target: NodeHandle) -> bool {
        self.source_handle == source && self.target_handle == target
    }

    /// Returns the endpoint on the other side of `handle`.
    pub(crate) fn peer_of(&self, handle: NodeHandle) -> Option<NodeRef> {
        if handle == self.source_handle {
            self.target()
        } else {
            self.source()
        }
    }
}

impl fmt::Debug for ConflictEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConflictEdge")
            .field("id", &self.id)
            .field("source", &self.source_handle)
            .field("target", &self.target_handle)
            .finish()
    }
}
