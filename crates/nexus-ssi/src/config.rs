//! Conflict graph configuration.
//!
//! This module provides the sizing options for the rw-conflict graph.

use serde::{Deserialize, Serialize};

use nexus_common::constants::{
    DEFAULT_CONFLICTS_PER_TRANSACTION, DEFAULT_TRACKED_TRANSACTIONS, MAX_CONCURRENT_TRANSACTIONS,
};

/// Configuration for the rw-conflict graph.
///
/// Both pools are fixed-size: once a limit is reached, registration or
/// conflict recording fails with a capacity error instead of growing.
///
/// # Example
///
/// ```rust
/// use nexus_ssi::ConflictGraphConfig;
///
/// let config = ConflictGraphConfig::default().with_max_nodes(128);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictGraphConfig {
    /// Maximum number of live transaction nodes.
    /// Default: 1024
    pub max_nodes: usize,

    /// Maximum number of live rw-conflict edges across the whole graph.
    /// Default: `max_nodes * 5`
    pub max_conflicts: usize,
}

impl Default for ConflictGraphConfig {
    fn default() -> Self {
        Self {
            max_nodes: DEFAULT_TRACKED_TRANSACTIONS,
            max_conflicts: DEFAULT_TRACKED_TRANSACTIONS * DEFAULT_CONFLICTS_PER_TRANSACTION,
        }
    }
}

impl ConflictGraphConfig {
    /// Creates a configuration sized for the given number of tracked transactions.
    #[must_use]
    pub fn for_transactions(max_nodes: usize) -> Self {
        Self {
            max_nodes,
            max_conflicts: max_nodes.saturating_mul(DEFAULT_CONFLICTS_PER_TRANSACTION),
        }
    }

    /// Creates a minimal configuration for testing.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_nodes: 64,
            max_conflicts: 256,
        }
    }

    /// Sets the maximum number of live nodes.
    #[must_use]
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    /// Sets the maximum number of live conflicts.
    #[must_use]
    pub fn with_max_conflicts(mut self, max_conflicts: usize) -> Self {
        self.max_conflicts = max_conflicts;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_nodes == 0 {
            return Err("max_nodes must be positive".to_string());
        }

        if self.max_nodes > MAX_CONCURRENT_TRANSACTIONS {
            return Err(format!(
                "max_nodes must be at most {MAX_CONCURRENT_TRANSACTIONS}"
            ));
        }

        if self.max_conflicts == 0 {
            return Err("max_conflicts must be positive".to_string());
        }

        Ok(())
    }
}
