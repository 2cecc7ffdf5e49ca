//! Walks over one node's conflict lists.

use std::iter::FusedIterator;
use std::vec;

use tracing::trace;

use crate::error::{SsiError, SsiResult};
use crate::graph::{ConflictDirection, ConflictEdge, EdgeId, NodeRef};

use super::record::EdgeRecord;

/// An edge as captured by a snapshot, with both endpoints pinned.
#[derive(Debug)]
pub(crate) struct CapturedEdge {
    pub(crate) id: EdgeId,
    pub(crate) direction: ConflictDirection,
    pub(crate) source: NodeRef,
    pub(crate) target: NodeRef,
}

impl CapturedEdge {
    /// Pins the endpoints of a linked edge.
    ///
    /// Must be called while holding the lock of a list the edge is linked
    /// into. Unlinking always precedes an endpoint's removal from the arena,
    /// so a failed upgrade here means the graph is corrupt.
    fn pin(direction: ConflictDirection, edge: &ConflictEdge) -> SsiResult<Self> {
        let source = edge.source().ok_or_else(|| {
            SsiError::internal(format!(
                "source {} of linked edge {} is gone",
                edge.source_handle(),
                edge.id()
            ))
        })?;
        let target = edge.target().ok_or_else(|| {
            SsiError::internal(format!(
                "target {} of linked edge {} is gone",
                edge.target_handle(),
                edge.id()
            ))
        })?;
        Ok(Self {
            id: edge.id(),
            direction,
            source,
            target,
        })
    }

    fn record(&self) -> EdgeRecord {
        EdgeRecord::from_endpoints(&self.source, &self.target)
    }
}

/// Copies both of `node`'s lists, out-edges first, under one acquisition
/// of its lock.
pub(crate) fn snapshot(node: &NodeRef) -> SsiResult<Vec<CapturedEdge>> {
    let lists = node.lists();
    let out = lists.list(ConflictDirection::Out);
    let inbound = lists.list(ConflictDirection::In);

    let mut captured = Vec::with_capacity(out.len() + inbound.len());
    for edge in out {
        captured.push(CapturedEdge::pin(ConflictDirection::Out, edge)?);
    }
    for edge in inbound {
        captured.push(CapturedEdge::pin(ConflictDirection::In, edge)?);
    }
    Ok(captured)
}

/// Lazy walk over a node's out-edges, then its in-edges.
///
/// The edge set is fixed when the iterator is created: both lists are
/// copied under a single acquisition of the node's lock, so the walk
/// describes the lists exactly as they stood at that instant. Records are
/// built on demand without holding any lock. Edges inserted or released
/// afterwards are not reflected.
///
/// Endpoints are pinned by the snapshot. A neighbor destroyed mid-walk is
/// still reported with its original process ID, and the graph itself is
/// unaffected. Dropping the iterator early releases the pins.
#[derive(Debug)]
pub struct NeighborhoodIter {
    node: NodeRef,
    edges: vec::IntoIter<CapturedEdge>,
}

impl NeighborhoodIter {
    /// Snapshots `node`'s lists and starts a walk at the head of the
    /// out-list.
    pub fn new(node: NodeRef) -> SsiResult<Self> {
        let edges = snapshot(&node)?.into_iter();
        Ok(Self { node, edges })
    }

    /// Returns the node being walked.
    pub fn node(&self) -> &NodeRef {
        &self.node
    }
}

impl Iterator for NeighborhoodIter {
    type Item = EdgeRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let edge = self.edges.next()?;
        trace!(node = %self.node.handle(), direction = %edge.direction, edge = %edge.id, "exported conflict");
        Some(edge.record())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.edges.size_hint()
    }
}

impl ExactSizeIterator for NeighborhoodIter {}

impl FusedIterator for NeighborhoodIter {}

/// Builds every record of `node` under a single acquisition of its lock.
///
/// Unlike [`NeighborhoodIter`], transaction IDs are read up front as well.
pub fn materialize(node: &NodeRef) -> SsiResult<Vec<EdgeRecord>> {
    let lists = node.lists();
    let mut records = Vec::with_capacity(
        lists.list(ConflictDirection::Out).len() + lists.list(ConflictDirection::In).len(),
    );
    for (direction, edges) in [
        (ConflictDirection::Out, lists.list(ConflictDirection::Out)),
        (ConflictDirection::In, lists.list(ConflictDirection::In)),
    ] {
        for edge in edges {
            records.push(CapturedEdge::pin(direction, edge)?.record());
        }
    }
    Ok(records)
}
