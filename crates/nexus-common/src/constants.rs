//! System-wide constants for NexusDB.
//!
//! This module defines constants used across the transaction components.

// =============================================================================
// Transaction Constants
// =============================================================================

/// Maximum number of concurrent transactions.
pub const MAX_CONCURRENT_TRANSACTIONS: usize = 65536;

// =============================================================================
// Serializable Isolation Constants
// =============================================================================

/// Default number of transactions tracked for rw-conflict detection.
///
/// Committed serializable transactions may outlive their session while
/// other transactions still need them for conflict analysis, so this is
/// sized independently of the session count.
pub const DEFAULT_TRACKED_TRANSACTIONS: usize = 1024;

/// Average number of rw-conflict slots reserved per tracked transaction.
pub const DEFAULT_CONFLICTS_PER_TRANSACTION: usize = 5;

/// Number of columns in an exported rw-conflict record
/// (source txn, source pid, target txn, target pid).
pub const CONFLICT_RECORD_FIELDS: usize = 4;
