//! # nexus-ssi
//!
//! rw-conflict tracking for NexusDB's Serializable Snapshot Isolation.
//!
//! This crate provides:
//!
//! - **Conflict Graph**: Transactions as nodes, rw-antidependencies as
//!   directed edges, with per-node locking and no global lock on reads.
//!
//! - **Identity Resolution**: Maps the caller's session to its tracked
//!   transaction, if it has one.
//!
//! - **Neighborhood Export**: A consistent, ordered view of one
//!   transaction's incident conflicts as four-field records.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        ConflictGraph                         │
//! │                                                              │
//! │   sessions: pid -> handle       nodes: handle -> node        │
//! │                                                              │
//! │   ┌──────────────────┐  edge   ┌──────────────────┐          │
//! │   │ TransactionNode  │ ──────▶ │ TransactionNode  │          │
//! │   │  out_edges ──────┼─┐     ┌─┼──────── in_edges │          │
//! │   │  in_edges        │ │     │ │        out_edges │          │
//! │   └──────────────────┘ │     │ └──────────────────┘          │
//! │                        ▼     ▼                               │
//! │                    ┌─────────────┐                           │
//! │                    │ConflictEdge │ (weak back-references)    │
//! │                    └─────────────┘                           │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!            export_neighborhood(current) -> EdgeRecords
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use nexus_common::types::{ProcessId, TxnId};
//! use nexus_ssi::{export_neighborhood, ConflictGraph, CurrentTransaction, ExportRequest};
//!
//! let graph = ConflictGraph::new();
//! let reader = graph.register_node(ProcessId::new(100), None).unwrap();
//! let writer = graph
//!     .register_node(ProcessId::new(200), Some(TxnId::new(42)))
//!     .unwrap();
//! graph.notify_conflict(reader, writer).unwrap();
//!
//! let current = CurrentTransaction::serializable(ProcessId::new(100));
//! let records: Vec<_> = export_neighborhood(&graph, &current, &ExportRequest::stream())
//!     .unwrap()
//!     .collect();
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].source_txn_id, None);
//! assert_eq!(records[0].target_txn_id, Some(TxnId::new(42)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Graph sizing.
pub mod config;

/// Error types.
pub mod error;

/// Neighborhood export.
///
/// This module provides:
/// - [`export::export_neighborhood`]: Exports the caller's neighborhood
/// - [`export::NeighborhoodIter`]: Lazy walk over a point-in-time snapshot
/// - [`export::EdgeRecord`]: One exported conflict
pub mod export;

/// The rw-conflict graph.
///
/// This module provides:
/// - [`graph::ConflictGraph`]: Node arena and edge maintenance
/// - [`graph::TransactionNode`]: A tracked transaction and its edge lists
/// - [`graph::ConflictEdge`]: A directed rw-antidependency
pub mod graph;

/// Caller identity.
pub mod session;

// Re-export commonly used types

pub use config::ConflictGraphConfig;
pub use error::{SsiError, SsiResult};
pub use export::{
    export_neighborhood, export_resolved, ConsumeMode, EdgeRecord, ExportRequest, FieldSpec,
    FieldType, Neighborhood, NeighborhoodIter, RecordShape,
};
pub use graph::{
    ConflictDirection, ConflictEdge, ConflictGraph, ConflictGraphStats, EdgeId, NodeHandle,
    NodeRef, TransactionNode,
};
pub use session::{CurrentTransaction, IsolationLevel};
