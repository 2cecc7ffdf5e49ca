//! rw-conflict graph for serializable snapshot isolation.
//!
//! Every transaction tracked for serializability is a node. When the
//! predicate-lock layer sees that transaction `R` read data that a
//! concurrent transaction `W` wrote, it records a directed edge `R -> W`:
//!
//! ```text
//!   T1 reads x, T2 writes x:   T1 -rw-> T2
//!   T2 reads y, T3 writes y:   T2 -rw-> T3
//!
//!   T2.out_edges = [T2->T3]    T2.in_edges = [T1->T2]
//! ```
//!
//! # Locking
//!
//! - The node arena and session map are behind `RwLock`s that are held only
//!   for lookups and registration, never while walking edges.
//! - Each node guards its own two edge lists with a `Mutex`.
//! - Operations that touch two nodes lock them in ascending handle order.
//!   Edge insertion and removal therefore appear atomic to anyone reading
//!   either endpoint.
//! - The sessions lock is always taken before the nodes lock.

mod edge;
mod node;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use nexus_common::types::{ProcessId, TxnId};
use parking_lot::RwLock;
use tracing::{debug, warn};

pub use edge::{ConflictEdge, EdgeId};
pub use node::{ConflictDirection, NodeHandle, NodeRef, TransactionNode};

pub(crate) use node::lock_pair;

use crate::config::ConflictGraphConfig;
use crate::error::{SsiError, SsiResult};

/// Statistics about the conflict graph.
#[derive(Debug, Default)]
pub struct ConflictGraphStats {
    /// Number of nodes registered.
    pub nodes_registered: AtomicU64,
    /// Number of nodes destroyed.
    pub nodes_destroyed: AtomicU64,
    /// Number of conflicts recorded.
    pub conflicts_recorded: AtomicU64,
    /// Number of conflicts unlinked, explicitly or by node destruction.
    pub conflicts_released: AtomicU64,
    /// Number of neighborhood exports started.
    pub exports: AtomicU64,
    /// Number of neighborhood exports rejected or failed.
    pub export_errors: AtomicU64,
}

impl ConflictGraphStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }
}

/// The rw-conflict graph.
///
/// Shared by all sessions, typically behind an `Arc`. All operations take
/// `&self`.
pub struct ConflictGraph {
    /// Live nodes by handle.
    nodes: RwLock<HashMap<NodeHandle, NodeRef>>,
    /// Tracked transaction currently attached to each session.
    sessions: RwLock<HashMap<ProcessId, NodeHandle>>,
    /// Next node handle to hand out.
    next_handle: AtomicU64,
    /// Next edge ID to hand out.
    next_edge_id: AtomicU64,
    /// Number of live edges, reserved before linking.
    live_conflicts: AtomicUsize,
    /// Sizing.
    config: ConflictGraphConfig,
    /// Statistics.
    stats: ConflictGraphStats,
}

impl ConflictGraph {
    /// Creates an empty graph with the default configuration.
    pub fn new() -> Self {
        Self::build(ConflictGraphConfig::default())
    }

    /// Creates an empty graph with the given configuration.
    pub fn with_config(config: ConflictGraphConfig) -> SsiResult<Self> {
        config
            .validate()
            .map_err(|reason| SsiError::InvalidConfig { reason })?;
        Ok(Self::build(config))
    }

    fn build(config: ConflictGraphConfig) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            next_edge_id: AtomicU64::new(1),
            live_conflicts: AtomicUsize::new(0),
            config,
            stats: ConflictGraphStats::new(),
        }
    }

    /// Registers a transaction for conflict tracking and attaches it to the
    /// session `pid`.
    ///
    /// `Some(TxnId::INVALID)` is treated as "no ID yet".
    pub fn register_node(&self, pid: ProcessId, txn_id: Option<TxnId>) -> SsiResult<NodeHandle> {
        let mut sessions = self.sessions.write();
        if let Some(&node) = sessions.get(&pid) {
            warn!(%pid, %node, "session already has a tracked transaction");
            return Err(SsiError::SessionBusy { pid, node });
        }

        let mut nodes = self.nodes.write();
        if nodes.len() >= self.config.max_nodes {
            warn!(%pid, limit = self.config.max_nodes, "transaction node pool exhausted");
            return Err(SsiError::CapacityExceeded {
                resource: "serializable transaction",
                limit: self.config.max_nodes,
            });
        }

        let handle = NodeHandle::new(self.next_handle.fetch_add(1, AtomicOrdering::Relaxed));
        let txn_id = txn_id.and_then(TxnId::assigned);
        nodes.insert(handle, Arc::new(TransactionNode::new(handle, pid, txn_id)));
        sessions.insert(pid, handle);

        self.stats
            .nodes_registered
            .fetch_add(1, AtomicOrdering::Relaxed);
        debug!(node = %handle, %pid, ?txn_id, "registered transaction node");
        Ok(handle)
    }

    /// Looks up a live node.
    pub fn node(&self, handle: NodeHandle) -> Option<NodeRef> {
        self.nodes.read().get(&handle).cloned()
    }

    /// Returns the node currently attached to the session `pid`.
    pub fn attached_node(&self, pid: ProcessId) -> Option<NodeRef> {
        let sessions = self.sessions.read();
        let handle = sessions.get(&pid)?;
        self.nodes.read().get(handle).cloned()
    }

    /// Ends the session's association with its tracked transaction.
    ///
    /// The node stays in the graph, with its edges, until destroyed.
    pub fn detach_session(&self, pid: ProcessId) -> Option<NodeHandle> {
        let handle = self.sessions.write().remove(&pid);
        if let Some(node) = handle {
            debug!(%pid, %node, "detached session");
        }
        handle
    }

    /// Records the top-level transaction ID of a node.
    ///
    /// Called the first time the transaction writes. An export running at
    /// the same time may or may not observe the new ID.
    pub fn assign_txn_id(&self, handle: NodeHandle, txn_id: TxnId) -> SsiResult<()> {
        if !txn_id.is_valid() {
            return Err(SsiError::InvalidTxnId { node: handle });
        }

        let node = self.lookup(handle)?;
        node.set_txn_id(txn_id)
            .map_err(|existing| SsiError::TxnIdAlreadyAssigned {
                node: handle,
                txn_id: existing,
            })?;

        debug!(node = %handle, %txn_id, "assigned transaction id");
        Ok(())
    }

    /// Records an rw-conflict from `source` (the reader) to `target` (the
    /// writer).
    ///
    /// The edge becomes visible in both endpoint lists at once. The store is
    /// a multigraph: recording the same pair twice creates two edges.
    pub fn notify_conflict(&self, source: NodeHandle, target: NodeHandle) -> SsiResult<EdgeId> {
        if source == target {
            warn!(node = %source, "rejected self-conflict");
            return Err(SsiError::SelfConflict { node: source });
        }

        let source_node = self.lookup(source)?;
        let target_node = self.lookup(target)?;

        self.reserve_conflict()?;

        let (mut source_lists, mut target_lists) = lock_pair(&source_node, &target_node);
        let retired = if source_lists.is_retired() {
            Some(source)
        } else if target_lists.is_retired() {
            Some(target)
        } else {
            None
        };
        if let Some(node) = retired {
            drop(source_lists);
            drop(target_lists);
            self.live_conflicts.fetch_sub(1, AtomicOrdering::AcqRel);
            warn!(%source, %target, %node, "rejected conflict on retired node");
            return Err(SsiError::NodeRetired { node });
        }

        let id = EdgeId::new(self.next_edge_id.fetch_add(1, AtomicOrdering::Relaxed));
        let edge = Arc::new(ConflictEdge::new(id, &source_node, &target_node));
        source_lists.push(ConflictDirection::Out, Arc::clone(&edge));
        target_lists.push(ConflictDirection::In, edge);
        drop(source_lists);
        drop(target_lists);

        self.stats
            .conflicts_recorded
            .fetch_add(1, AtomicOrdering::Relaxed);
        debug!(%source, %target, edge = %id, "recorded rw-conflict");
        Ok(id)
    }

    /// Returns true if at least one edge runs from `source` to `target`.
    pub fn conflict_exists(&self, source: NodeHandle, target: NodeHandle) -> bool {
        if source == target {
            return false;
        }
        match self.node(source) {
            Some(node) => node
                .lists()
                .list(ConflictDirection::Out)
                .iter()
                .any(|edge| edge.target_handle() == target),
            None => false,
        }
    }

    /// Unlinks one edge from both endpoints.
    ///
    /// Returns `false` if no edge with that ID runs from `source` to
    /// `target`, e.g. because it was already released.
    pub fn release_conflict(
        &self,
        edge_id: EdgeId,
        source: NodeHandle,
        target: NodeHandle,
    ) -> SsiResult<bool> {
        if source == target {
            return Err(SsiError::SelfConflict { node: source });
        }

        let source_node = self.lookup(source)?;
        let target_node = self.lookup(target)?;

        let (mut source_lists, mut target_lists) = lock_pair(&source_node, &target_node);
        let linked = source_lists
            .get(ConflictDirection::Out, edge_id)
            .map_or(false, |edge| edge.connects(source, target));
        if !linked {
            return Ok(false);
        }

        if !target_lists.remove(ConflictDirection::In, edge_id) {
            return Err(SsiError::internal(format!(
                "edge {edge_id} is linked from {source} but missing from {target}"
            )));
        }
        source_lists.remove(ConflictDirection::Out, edge_id);
        drop(source_lists);
        drop(target_lists);

        self.live_conflicts.fetch_sub(1, AtomicOrdering::AcqRel);
        self.stats
            .conflicts_released
            .fetch_add(1, AtomicOrdering::Relaxed);
        debug!(%source, %target, edge = %edge_id, "released rw-conflict");
        Ok(true)
    }

    /// Destroys a node: unlinks every incident edge, then retires the node.
    ///
    /// Once this returns, no export of a former neighbor yields an edge to
    /// or from this node. Walks that snapshotted it earlier finish from
    /// their snapshot.
    pub fn destroy_node(&self, handle: NodeHandle) -> SsiResult<()> {
        let node = self.lookup(handle)?;

        let edges = {
            let mut lists = node.lists();
            if lists.is_retired() {
                return Err(SsiError::NodeRetired { node: handle });
            }
            lists.retire();
            lists.all_edges()
        };

        let mut released = 0usize;
        for edge in &edges {
            // A dead peer has already unlinked the edge from both sides.
            let Some(peer) = edge.peer_of(handle) else {
                continue;
            };
            let own = if edge.source_handle() == handle {
                ConflictDirection::Out
            } else {
                ConflictDirection::In
            };

            let (mut own_lists, mut peer_lists) = lock_pair(&node, &peer);
            if own_lists.remove(own, edge.id()) {
                peer_lists.remove(own.opposite(), edge.id());
                released += 1;
            }
        }

        {
            let mut sessions = self.sessions.write();
            if sessions.get(&node.pid()) == Some(&handle) {
                sessions.remove(&node.pid());
            }
            self.nodes.write().remove(&handle);
        }

        self.live_conflicts.fetch_sub(released, AtomicOrdering::AcqRel);
        self.stats
            .conflicts_released
            .fetch_add(released as u64, AtomicOrdering::Relaxed);
        self.stats
            .nodes_destroyed
            .fetch_add(1, AtomicOrdering::Relaxed);
        debug!(node = %handle, pid = %node.pid(), released, "destroyed transaction node");
        Ok(())
    }

    /// Returns the number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    /// Returns the number of live edges.
    pub fn conflict_count(&self) -> usize {
        self.live_conflicts.load(AtomicOrdering::Acquire)
    }

    /// Returns the number of sessions with an attached node.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns statistics.
    pub fn stats(&self) -> &ConflictGraphStats {
        &self.stats
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ConflictGraphConfig {
        &self.config
    }

    fn lookup(&self, handle: NodeHandle) -> SsiResult<NodeRef> {
        self.node(handle)
            .ok_or(SsiError::NodeNotFound { node: handle })
    }

    fn reserve_conflict(&self) -> SsiResult<()> {
        let limit = self.config.max_conflicts;
        self.live_conflicts
            .fetch_update(AtomicOrdering::AcqRel, AtomicOrdering::Acquire, |live| {
                (live < limit).then_some(live + 1)
            })
            .map(|_| ())
            .map_err(|_| {
                warn!(limit, "rw-conflict pool exhausted");
                SsiError::CapacityExceeded {
                    resource: "rw-conflict",
                    limit,
                }
            })
    }
}

impl Default for ConflictGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConflictGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConflictGraph")
            .field("node_count", &self.node_count())
            .field("conflict_count", &self.conflict_count())
            .field("session_count", &self.session_count())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: i32) -> ProcessId {
        ProcessId::new(n)
    }

    fn graph() -> ConflictGraph {
        ConflictGraph::with_config(ConflictGraphConfig::for_testing()).unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let graph = graph();
        let a = graph.register_node(pid(100), None).unwrap();
        let b = graph.register_node(pid(200), Some(TxnId::new(42))).unwrap();

        assert_ne!(a, b);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.session_count(), 2);
        assert_eq!(graph.node(a).unwrap().txn_id(), None);
        assert_eq!(graph.node(b).unwrap().txn_id(), Some(TxnId::new(42)));
        assert_eq!(graph.attached_node(pid(200)).unwrap().handle(), b);
        assert!(graph.attached_node(pid(300)).is_none());
    }

    #[test]
    fn test_register_invalid_txn_id_is_absent() {
        let graph = graph();
        let a = graph.register_node(pid(1), Some(TxnId::INVALID)).unwrap();
        assert_eq!(graph.node(a).unwrap().txn_id(), None);
    }

    #[test]
    fn test_session_busy() {
        let graph = graph();
        let a = graph.register_node(pid(1), None).unwrap();
        assert_eq!(
            graph.register_node(pid(1), None),
            Err(SsiError::SessionBusy { pid: pid(1), node: a })
        );

        // A detached session can start a new tracked transaction while the
        // old node is retained.
        assert_eq!(graph.detach_session(pid(1)), Some(a));
        let b = graph.register_node(pid(1), None).unwrap();
        assert_ne!(a, b);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.attached_node(pid(1)).unwrap().handle(), b);
    }

    #[test]
    fn test_node_capacity() {
        let graph =
            ConflictGraph::with_config(ConflictGraphConfig::for_testing().with_max_nodes(2))
                .unwrap();
        graph.register_node(pid(1), None).unwrap();
        let b = graph.register_node(pid(2), None).unwrap();

        let err = graph.register_node(pid(3), None).unwrap_err();
        assert!(matches!(err, SsiError::CapacityExceeded { limit: 2, .. }));
        assert_eq!(graph.session_count(), 2);

        graph.destroy_node(b).unwrap();
        assert!(graph.register_node(pid(3), None).is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let err = ConflictGraph::with_config(ConflictGraphConfig::default().with_max_nodes(0))
            .unwrap_err();
        assert!(matches!(err, SsiError::InvalidConfig { .. }));
    }

    #[test]
    fn test_assign_txn_id() {
        let graph = graph();
        let a = graph.register_node(pid(1), None).unwrap();

        assert_eq!(
            graph.assign_txn_id(a, TxnId::INVALID),
            Err(SsiError::InvalidTxnId { node: a })
        );
        graph.assign_txn_id(a, TxnId::new(7)).unwrap();
        assert_eq!(graph.node(a).unwrap().txn_id(), Some(TxnId::new(7)));
        assert_eq!(
            graph.assign_txn_id(a, TxnId::new(8)),
            Err(SsiError::TxnIdAlreadyAssigned {
                node: a,
                txn_id: TxnId::new(7)
            })
        );
        assert_eq!(
            graph.assign_txn_id(NodeHandle::new(999), TxnId::new(1)),
            Err(SsiError::NodeNotFound {
                node: NodeHandle::new(999)
            })
        );
    }

    #[test]
    fn test_notify_conflict_links_both_lists() {
        let graph = graph();
        let a = graph.register_node(pid(1), None).unwrap();
        let b = graph.register_node(pid(2), None).unwrap();

        let e1 = graph.notify_conflict(a, b).unwrap();
        let e2 = graph.notify_conflict(a, b).unwrap();
        assert!(e1 < e2);

        let node_a = graph.node(a).unwrap();
        let node_b = graph.node(b).unwrap();
        assert_eq!(node_a.out_degree(), 2);
        assert_eq!(node_a.in_degree(), 0);
        assert_eq!(node_b.in_degree(), 2);
        assert_eq!(node_b.out_degree(), 0);
        assert_eq!(graph.conflict_count(), 2);
        assert!(graph.conflict_exists(a, b));
        assert!(!graph.conflict_exists(b, a));
    }

    #[test]
    fn test_self_conflict_rejected() {
        let graph = graph();
        let a = graph.register_node(pid(1), None).unwrap();
        assert_eq!(
            graph.notify_conflict(a, a),
            Err(SsiError::SelfConflict { node: a })
        );
        assert_eq!(graph.conflict_count(), 0);
    }

    #[test]
    fn test_notify_unknown_node() {
        let graph = graph();
        let a = graph.register_node(pid(1), None).unwrap();
        let missing = NodeHandle::new(500);
        assert_eq!(
            graph.notify_conflict(a, missing),
            Err(SsiError::NodeNotFound { node: missing })
        );
        assert_eq!(graph.conflict_count(), 0);
    }

    #[test]
    fn test_conflict_capacity() {
        let graph =
            ConflictGraph::with_config(ConflictGraphConfig::for_testing().with_max_conflicts(2))
                .unwrap();
        let a = graph.register_node(pid(1), None).unwrap();
        let b = graph.register_node(pid(2), None).unwrap();

        graph.notify_conflict(a, b).unwrap();
        let e2 = graph.notify_conflict(b, a).unwrap();
        let err = graph.notify_conflict(a, b).unwrap_err();
        assert!(matches!(err, SsiError::CapacityExceeded { limit: 2, .. }));
        assert_eq!(graph.node(a).unwrap().out_degree(), 1);

        assert!(graph.release_conflict(e2, b, a).unwrap());
        assert!(graph.notify_conflict(a, b).is_ok());
    }

    #[test]
    fn test_release_conflict() {
        let graph = graph();
        let a = graph.register_node(pid(1), None).unwrap();
        let b = graph.register_node(pid(2), None).unwrap();
        let c = graph.register_node(pid(3), None).unwrap();

        let e = graph.notify_conflict(a, b).unwrap();

        // Wrong endpoints leave the edge alone.
        assert!(!graph.release_conflict(e, a, c).unwrap());
        assert!(!graph.release_conflict(e, b, a).unwrap());
        assert_eq!(graph.conflict_count(), 1);

        assert!(graph.release_conflict(e, a, b).unwrap());
        assert!(!graph.release_conflict(e, a, b).unwrap());
        assert_eq!(graph.conflict_count(), 0);
        assert!(!graph.node(a).unwrap().has_conflict_out());
        assert!(!graph.node(b).unwrap().has_conflict_in());
        assert_eq!(
            graph.stats().conflicts_released.load(AtomicOrdering::Relaxed),
            1
        );
    }

    #[test]
    fn test_destroy_node_unlinks_edges() {
        let graph = graph();
        let a = graph.register_node(pid(1), None).unwrap();
        let b = graph.register_node(pid(2), None).unwrap();
        let c = graph.register_node(pid(3), None).unwrap();

        graph.notify_conflict(a, b).unwrap();
        graph.notify_conflict(b, c).unwrap();
        graph.notify_conflict(c, b).unwrap();
        graph.notify_conflict(a, c).unwrap();

        let node_a = graph.node(a).unwrap();
        let node_c = graph.node(c).unwrap();
        graph.destroy_node(b).unwrap();

        assert!(graph.node(b).is_none());
        assert!(graph.attached_node(pid(2)).is_none());
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.conflict_count(), 1);
        assert_eq!(node_a.out_degree(), 1);
        assert_eq!(node_c.in_degree(), 1);
        assert_eq!(node_c.out_degree(), 0);
        assert!(!graph.conflict_exists(a, b));
        assert!(graph.conflict_exists(a, c));

        let stats = graph.stats();
        assert_eq!(stats.nodes_destroyed.load(AtomicOrdering::Relaxed), 1);
        assert_eq!(stats.conflicts_released.load(AtomicOrdering::Relaxed), 3);
    }

    #[test]
    fn test_destroy_twice_and_notify_after_destroy() {
        let graph = graph();
        let a = graph.register_node(pid(1), None).unwrap();
        let b = graph.register_node(pid(2), None).unwrap();

        let node_b = graph.node(b).unwrap();
        graph.destroy_node(b).unwrap();
        assert!(node_b.is_retired());
        assert_eq!(
            graph.destroy_node(b),
            Err(SsiError::NodeNotFound { node: b })
        );
        assert_eq!(
            graph.notify_conflict(a, b),
            Err(SsiError::NodeNotFound { node: b })
        );
    }

    #[test]
    fn test_destroy_detached_node_keeps_new_session() {
        let graph = graph();
        let old = graph.register_node(pid(1), None).unwrap();
        graph.detach_session(pid(1));
        let new = graph.register_node(pid(1), None).unwrap();

        graph.destroy_node(old).unwrap();
        assert_eq!(graph.attached_node(pid(1)).unwrap().handle(), new);
    }

    #[test]
    fn test_graph_debug() {
        let graph = ConflictGraph::default();
        let debug = format!("{graph:?}");
        assert!(debug.contains("node_count: 0"));
        assert!(debug.contains("conflict_count: 0"));
    }
}
