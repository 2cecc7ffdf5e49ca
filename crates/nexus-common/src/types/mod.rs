//! Type definitions for NexusDB.
//!
//! This module contains the identifier types shared across the database.

mod ids;

pub use ids::{ProcessId, TxnId};
