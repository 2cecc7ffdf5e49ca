//! Transaction nodes of the rw-conflict graph.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use nexus_common::types::{ProcessId, TxnId};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use super::edge::{ConflictEdge, EdgeId};

/// Stable arena key of a transaction node.
///
/// Handles are allocated monotonically and never reused, so a stale handle
/// can only fail to resolve; it never aliases a newer transaction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeHandle(u64);

impl NodeHandle {
    /// Creates a handle from a raw value.
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

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle({})", self.0)
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sx{}", self.0)
    }
}

/// Which of a node's two edge lists an edge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictDirection {
    /// The node is the conflict source (its read was overwritten).
    Out,
    /// The node is the conflict target (its write overwrote a read).
    In,
}

impl ConflictDirection {
    /// Returns the list the same edge occupies on the other endpoint.
    pub const fn opposite(self) -> Self {
        match self {
            ConflictDirection::Out => ConflictDirection::In,
            ConflictDirection::In => ConflictDirection::Out,
        }
    }
}

impl fmt::Display for ConflictDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictDirection::Out => write!(f, "out"),
            ConflictDirection::In => write!(f, "in"),
        }
    }
}

/// The two edge lists of a node, guarded together by the node's lock.
///
/// Both lists are kept sorted by `EdgeId`: ids are allocated while every
/// list that receives the edge is locked.
#[derive(Debug, Default)]
pub(crate) struct EdgeLists {
    out_edges: Vec<Arc<ConflictEdge>>,
    in_edges: Vec<Arc<ConflictEdge>>,
    retired: bool,
}

impl EdgeLists {
    pub(crate) fn list(&self, direction: ConflictDirection) -> &[Arc<ConflictEdge>] {
        match direction {
            ConflictDirection::Out => &self.out_edges,
            ConflictDirection::In => &self.in_edges,
        }
    }

    fn list_mut(&mut self, direction: ConflictDirection) -> &mut Vec<Arc<ConflictEdge>> {
        match direction {
            ConflictDirection::Out => &mut self.out_edges,
            ConflictDirection::In => &mut self.in_edges,
        }
    }

    pub(crate) fn push(&mut self, direction: ConflictDirection, edge: Arc<ConflictEdge>) {
        debug_assert!(self
            .list(direction)
            .last()
            .map_or(true, |last| last.id() < edge.id()));
        self.list_mut(direction).push(edge);
    }

    pub(crate) fn get(
        &self,
        direction: ConflictDirection,
        edge_id: EdgeId,
    ) -> Option<&Arc<ConflictEdge>> {
        let list = self.list(direction);
        list.binary_search_by_key(&edge_id, |edge| edge.id())
            .ok()
            .map(|pos| &list[pos])
    }

    /// Unlinks an edge, returning whether it was present.
    pub(crate) fn remove(&mut self, direction: ConflictDirection, edge_id: EdgeId) -> bool {
        let list = self.list_mut(direction);
        match list.binary_search_by_key(&edge_id, |edge| edge.id()) {
            Ok(pos) => {
                list.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// All edges of both lists, out-edges first.
    pub(crate) fn all_edges(&self) -> Vec<Arc<ConflictEdge>> {
        self.out_edges
            .iter()
            .chain(self.in_edges.iter())
            .cloned()
            .collect()
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.retired
    }

    pub(crate) fn retire(&mut self) {
        self.retired = true;
    }
}

/// A transaction participating in rw-conflict tracking.
///
/// The node owns its incident edges through its two lists; edges only
/// refer back to nodes weakly. All list access goes through the node's own
/// lock, so readers of one node never contend with writers of unrelated
/// nodes.
pub struct TransactionNode {
    /// Arena key.
    handle: NodeHandle,
    /// Executing process.
    pid: ProcessId,
    /// Top-level transaction ID, `TxnId::INVALID` until assigned.
    txn_id: AtomicU64,
    /// Out- and in-edges.
    edges: Mutex<EdgeLists>,
}

/// Shared reference to a live transaction node.
pub type NodeRef = Arc<TransactionNode>;

impl TransactionNode {
    /// Creates a new node without edges.
    pub(crate) fn new(handle: NodeHandle, pid: ProcessId, txn_id: Option<TxnId>) -> Self {
        Self {
            handle,
            pid,
            txn_id: AtomicU64::new(txn_id.unwrap_or(TxnId::INVALID).as_u64()),
            edges: Mutex::new(EdgeLists::default()),
        }
    }

    /// Returns the arena handle.
    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    /// Returns the executing process.
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Returns the transaction ID, if one has been assigned.
    ///
    /// Assignment can race with readers; a reader may observe `None` for a
    /// transaction that is being assigned an ID at the same moment.
    pub fn txn_id(&self) -> Option<TxnId> {
        TxnId::new(self.txn_id.load(AtomicOrdering::Acquire)).assigned()
    }

    /// Records the transaction ID once. Returns the existing ID on failure.
    pub(crate) fn set_txn_id(&self, txn_id: TxnId) -> Result<(), TxnId> {
        self.txn_id
            .compare_exchange(
                TxnId::INVALID.as_u64(),
                txn_id.as_u64(),
                AtomicOrdering::AcqRel,
                AtomicOrdering::Acquire,
            )
            .map(|_| ())
            .map_err(TxnId::new)
    }

    /// Number of edges where this node is the source.
    pub fn out_degree(&self) -> usize {
        self.edges.lock().list(ConflictDirection::Out).len()
    }

    /// Number of edges where this node is the target.
    pub fn in_degree(&self) -> usize {
        self.edges.lock().list(ConflictDirection::In).len()
    }

    /// Returns true if this transaction has a conflict out to another.
    pub fn has_conflict_out(&self) -> bool {
        self.out_degree() > 0
    }

    /// Returns true if another transaction has a conflict in to this one.
    pub fn has_conflict_in(&self) -> bool {
        self.in_degree() > 0
    }

    /// Returns true once destruction of this node has begun.
    pub fn is_retired(&self) -> bool {
        self.edges.lock().is_retired()
    }

    /// Locks the node's edge lists.
    pub(crate) fn lists(&self) -> MutexGuard<'_, EdgeLists> {
        self.edges.lock()
    }
}

impl fmt::Debug for TransactionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lists = self.edges.lock();
        f.debug_struct("TransactionNode")
            .field("handle", &self.handle)
            .field("pid", &self.pid)
            .field("txn_id", &self.txn_id())
            .field("out_edges", &lists.list(ConflictDirection::Out).len())
            .field("in_edges", &lists.list(ConflictDirection::In).len())
            .field("retired", &lists.is_retired())
            .finish()
    }
}

/// Locks the edge lists of two distinct nodes in ascending handle order.
///
/// Every path that holds two node locks goes through here, which rules out
/// lock-order inversions between concurrent inserts, releases and
/// destructions.
pub(crate) fn lock_pair<'a>(
    first: &'a TransactionNode,
    second: &'a TransactionNode,
) -> (MutexGuard<'a, EdgeLists>, MutexGuard<'a, EdgeLists>) {
    debug_assert_ne!(first.handle, second.handle);
    if first.handle < second.handle {
        let a = first.lists();
        let b = second.lists();
        (a, b)
    } else {
        let b = second.lists();
        let a = first.lists();
        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(id: u64, source: &NodeRef, target: &NodeRef) -> Arc<ConflictEdge> {
        Arc::new(ConflictEdge::new(EdgeId::new(id), source, target))
    }

    #[test]
    fn test_txn_id_assignment() {
        let node = TransactionNode::new(NodeHandle::new(1), ProcessId::new(10), None);
        assert_eq!(node.txn_id(), None);

        assert!(node.set_txn_id(TxnId::new(42)).is_ok());
        assert_eq!(node.txn_id(), Some(TxnId::new(42)));

        assert_eq!(node.set_txn_id(TxnId::new(43)), Err(TxnId::new(42)));
        assert_eq!(node.txn_id(), Some(TxnId::new(42)));
    }

    #[test]
    fn test_edge_lists_lookup() {
        let a = Arc::new(TransactionNode::new(NodeHandle::new(1), ProcessId::new(1), None));
        let b = Arc::new(TransactionNode::new(NodeHandle::new(2), ProcessId::new(2), None));

        let mut lists = EdgeLists::default();
        lists.push(ConflictDirection::Out, edge(3, &a, &b));
        lists.push(ConflictDirection::Out, edge(7, &a, &b));
        lists.push(ConflictDirection::In, edge(9, &b, &a));

        assert!(lists.remove(ConflictDirection::Out, EdgeId::new(7)));
        assert!(!lists.remove(ConflictDirection::Out, EdgeId::new(7)));
        assert!(lists.get(ConflictDirection::Out, EdgeId::new(3)).is_some());
        assert!(lists.get(ConflictDirection::Out, EdgeId::new(7)).is_none());
        // Lookups are per list.
        assert!(lists.get(ConflictDirection::Out, EdgeId::new(9)).is_none());

        let ids: Vec<_> = lists.all_edges().iter().map(|edge| edge.id()).collect();
        assert_eq!(ids, vec![EdgeId::new(3), EdgeId::new(9)]);
    }

    #[test]
    fn test_degrees() {
        let a = Arc::new(TransactionNode::new(NodeHandle::new(1), ProcessId::new(1), None));
        let b = Arc::new(TransactionNode::new(NodeHandle::new(2), ProcessId::new(2), None));

        assert!(!a.has_conflict_out());
        a.lists().push(ConflictDirection::Out, edge(1, &a, &b));
        b.lists().push(ConflictDirection::In, edge(1, &a, &b));

        assert_eq!(a.out_degree(), 1);
        assert_eq!(a.in_degree(), 0);
        assert!(a.has_conflict_out());
        assert!(b.has_conflict_in());
        assert!(!b.has_conflict_out());
    }

    #[test]
    fn test_lock_pair_either_order() {
        let a = TransactionNode::new(NodeHandle::new(1), ProcessId::new(1), None);
        let b = TransactionNode::new(NodeHandle::new(2), ProcessId::new(2), None);

        {
            let (mut ga, gb) = lock_pair(&b, &a);
            ga.retire();
            assert!(!gb.is_retired());
        }
        assert!(b.is_retired());
        assert!(!a.is_retired());
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(NodeHandle::new(12).to_string(), "sx12");
        assert_eq!(format!("{:?}", NodeHandle::new(12)), "NodeHandle(12)");
        assert_eq!(ConflictDirection::In.to_string(), "in");
    }
}
