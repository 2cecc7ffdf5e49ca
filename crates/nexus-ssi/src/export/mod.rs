//! Export of a transaction's local conflict neighborhood.
//!
//! The neighborhood of a transaction `N` is every edge incident to it,
//! delivered as four-field [`EdgeRecord`]s in a fixed order:
//!
//! ```text
//!   N.out_edges (oldest first)  then  N.in_edges (oldest first)
//!
//!   (src txn, src pid, tgt txn, tgt pid)
//!   (NULL,    100,     42,      200    )   N -> B
//!   (7,       300,     NULL,    100    )   C -> N
//! ```
//!
//! The consumer states how it will take the sequence with an
//! [`ExportRequest`]. Both modes take the walked node's lock exactly once,
//! when the export is opened, and describe its lists as they stood at that
//! instant. A streaming export builds records as they are pulled; a
//! materialized export builds them all before returning. Neither holds any
//! lock while the consumer is working.

mod iter;
mod record;

use std::iter::FusedIterator;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::vec;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use iter::{materialize, NeighborhoodIter};
pub use record::{EdgeRecord, FieldSpec, FieldType, RecordShape};

use crate::error::{SsiError, SsiResult};
use crate::graph::{ConflictGraph, NodeRef};
use crate::session::CurrentTransaction;

/// How the consumer takes the exported sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConsumeMode {
    /// A single value. Cannot receive a sequence.
    Scalar,
    /// Records pulled one at a time.
    #[default]
    Stream,
    /// All records collected up front.
    Materialize,
}

/// How the caller wants to receive a neighborhood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Consumption mode.
    pub mode: ConsumeMode,
    /// Record layout the consumer expects.
    pub shape: RecordShape,
}

impl ExportRequest {
    /// A streaming request for [`EdgeRecord`]s.
    pub fn stream() -> Self {
        Self {
            mode: ConsumeMode::Stream,
            shape: RecordShape::edge_record(),
        }
    }

    /// A materializing request for [`EdgeRecord`]s.
    pub fn materialize() -> Self {
        Self {
            mode: ConsumeMode::Materialize,
            shape: RecordShape::edge_record(),
        }
    }

    /// A request from a consumer that can only take one value.
    pub fn scalar() -> Self {
        Self {
            mode: ConsumeMode::Scalar,
            shape: RecordShape::edge_record(),
        }
    }

    /// Replaces the expected record shape.
    #[must_use]
    pub fn with_shape(mut self, shape: RecordShape) -> Self {
        self.shape = shape;
        self
    }

    /// Checks that the consumer can receive edge records. Mode is checked
    /// before shape.
    pub fn validate(&self) -> SsiResult<()> {
        if self.mode == ConsumeMode::Scalar {
            return Err(SsiError::unsupported_context(
                "consumer accepts a single value, not a sequence",
            ));
        }
        self.shape.check()
    }
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self::stream()
    }
}

/// The exported sequence of a neighborhood.
///
/// Finite and not restartable. Every failure is reported when the export is
/// opened, so iteration itself cannot fail.
#[derive(Debug)]
pub struct Neighborhood {
    inner: NeighborhoodInner,
}

#[derive(Debug)]
enum NeighborhoodInner {
    Empty,
    Streaming(NeighborhoodIter),
    Materialized(vec::IntoIter<EdgeRecord>),
}

impl Neighborhood {
    /// The neighborhood of an untracked transaction.
    pub fn empty() -> Self {
        Self {
            inner: NeighborhoodInner::Empty,
        }
    }

    /// Returns true if the records were collected up front.
    pub fn is_materialized(&self) -> bool {
        matches!(self.inner, NeighborhoodInner::Materialized(_))
    }
}

impl Iterator for Neighborhood {
    type Item = EdgeRecord;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            NeighborhoodInner::Empty => None,
            NeighborhoodInner::Streaming(iter) => iter.next(),
            NeighborhoodInner::Materialized(records) => records.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            NeighborhoodInner::Empty => (0, Some(0)),
            NeighborhoodInner::Streaming(iter) => iter.size_hint(),
            NeighborhoodInner::Materialized(records) => records.size_hint(),
        }
    }
}

impl ExactSizeIterator for Neighborhood {}

impl FusedIterator for Neighborhood {}

/// Opens the walk of a tracked node in an already validated mode.
fn open(node: NodeRef, mode: ConsumeMode) -> SsiResult<NeighborhoodInner> {
    match mode {
        ConsumeMode::Stream => NeighborhoodIter::new(node).map(NeighborhoodInner::Streaming),
        ConsumeMode::Materialize => {
            materialize(&node).map(|records| NeighborhoodInner::Materialized(records.into_iter()))
        }
        ConsumeMode::Scalar => Err(SsiError::internal(format!(
            "scalar consumer reached the walk of {}",
            node.handle()
        ))),
    }
}

/// Exports the neighborhood of an already resolved node.
///
/// `None` means the transaction is not tracked and yields an empty
/// sequence. The request is validated first either way.
pub fn export_resolved(
    graph: &ConflictGraph,
    node: Option<NodeRef>,
    request: &ExportRequest,
) -> SsiResult<Neighborhood> {
    let stats = graph.stats();
    stats.exports.fetch_add(1, AtomicOrdering::Relaxed);

    if let Err(err) = request.validate() {
        stats.export_errors.fetch_add(1, AtomicOrdering::Relaxed);
        warn!(mode = ?request.mode, error = %err, "rejected neighborhood export");
        return Err(err);
    }

    let Some(node) = node else {
        debug!("neighborhood export of untracked transaction");
        return Ok(Neighborhood::empty());
    };

    debug!(node = %node.handle(), mode = ?request.mode, "exporting neighborhood");
    match open(node, request.mode) {
        Ok(inner) => Ok(Neighborhood { inner }),
        Err(err) => {
            stats.export_errors.fetch_add(1, AtomicOrdering::Relaxed);
            warn!(mode = ?request.mode, error = %err, "neighborhood export failed");
            Err(err)
        }
    }
}

/// Exports the conflict neighborhood of the caller's transaction.
///
/// An untracked transaction (not serializable, or without an attached
/// node) yields an empty sequence rather than an error.
pub fn export_neighborhood(
    graph: &ConflictGraph,
    current: &CurrentTransaction,
    request: &ExportRequest,
) -> SsiResult<Neighborhood> {
    export_resolved(graph, graph.resolve(current), request)
}
