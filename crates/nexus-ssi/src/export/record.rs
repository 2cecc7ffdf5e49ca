//! Exported edge records and the record shape they are checked against.

use std::fmt;

use nexus_common::constants::CONFLICT_RECORD_FIELDS;
use nexus_common::types::{ProcessId, TxnId};
use serde::{Deserialize, Serialize};

use crate::error::{SsiError, SsiResult};
use crate::graph::TransactionNode;

/// One rw-conflict as seen from the exported transaction's neighborhood.
///
/// Transaction IDs are `None` for transactions that have not been assigned
/// one yet. Process IDs are always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Transaction ID of the reader.
    pub source_txn_id: Option<TxnId>,
    /// Process of the reader.
    pub source_pid: ProcessId,
    /// Transaction ID of the writer.
    pub target_txn_id: Option<TxnId>,
    /// Process of the writer.
    pub target_pid: ProcessId,
}

impl EdgeRecord {
    /// Builds the record of an edge from its two endpoints.
    ///
    /// The endpoints come from a snapshot and may have been destroyed since
    /// it was taken. Process IDs never change, so the record still names
    /// them correctly; transaction IDs are read now.
    pub(crate) fn from_endpoints(source: &TransactionNode, target: &TransactionNode) -> Self {
        Self {
            source_txn_id: source.txn_id(),
            source_pid: source.pid(),
            target_txn_id: target.txn_id(),
            target_pid: target.pid(),
        }
    }
}

impl fmt::Display for EdgeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn txn(id: Option<TxnId>) -> String {
            id.map_or_else(|| "NULL".to_string(), |id| id.to_string())
        }
        write!(
            f,
            "({}, {}, {}, {})",
            txn(self.source_txn_id),
            self.source_pid,
            txn(self.target_txn_id),
            self.target_pid
        )
    }
}

/// Type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Transaction identifier.
    TxnId,
    /// Process identifier.
    ProcessId,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::TxnId => write!(f, "txn_id"),
            FieldType::ProcessId => write!(f, "pid"),
        }
    }
}

/// One field of a record shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Column name. Not compared when checking compatibility.
    pub name: String,
    /// Field type.
    pub field_type: FieldType,
    /// Whether the consumer accepts absent values.
    pub nullable: bool,
}

impl FieldSpec {
    /// Creates a field.
    pub fn new(name: impl Into<String>, field_type: FieldType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable,
        }
    }
}

/// The record layout a consumer expects to receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordShape {
    fields: Vec<FieldSpec>,
}

impl RecordShape {
    /// Creates a shape from its fields.
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// The shape of [`EdgeRecord`].
    pub fn edge_record() -> Self {
        Self::new(vec![
            FieldSpec::new("source_txn_id", FieldType::TxnId, true),
            FieldSpec::new("source_pid", FieldType::ProcessId, false),
            FieldSpec::new("target_txn_id", FieldType::TxnId, true),
            FieldSpec::new("target_pid", FieldType::ProcessId, false),
        ])
    }

    /// Returns the fields.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the shape has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns true if [`EdgeRecord`]s can be delivered in this shape.
    ///
    /// Field types must match position by position, and transaction ID
    /// fields must accept absent values.
    pub fn is_compatible(&self) -> bool {
        let expected = Self::edge_record();
        self.len() == CONFLICT_RECORD_FIELDS
            && self
                .fields
                .iter()
                .zip(expected.fields.iter())
                .all(|(actual, expected)| {
                    actual.field_type == expected.field_type
                        && (actual.nullable || !expected.nullable)
                })
    }

    /// Checks compatibility, producing a shape mismatch error.
    pub(crate) fn check(&self) -> SsiResult<()> {
        if self.is_compatible() {
            Ok(())
        } else {
            Err(SsiError::ShapeMismatch {
                expected: Self::edge_record().to_string(),
                actual: self.to_string(),
            })
        }
    }
}

impl Default for RecordShape {
    fn default() -> Self {
        Self::edge_record()
    }
}

impl fmt::Display for RecordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", field.name, field.field_type)?;
            if field.nullable {
                write!(f, "?")?;
            }
        }
        write!(f, ")")
    }
}
