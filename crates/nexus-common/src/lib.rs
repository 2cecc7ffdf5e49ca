//! # nexus-common
//!
//! Common types, errors, and utilities for NexusDB.
//!
//! This crate provides the foundational types and abstractions shared by
//! the NexusDB transaction components. It includes:
//!
//! - **Types**: Core identifiers (`TxnId`, `ProcessId`)
//! - **Errors**: Unified error handling with `NexusError` and stable `ErrorCode`s
//! - **Constants**: System-wide limits for transaction tracking
//!
//! ## Example
//!
//! ```rust
//! use nexus_common::types::{ProcessId, TxnId};
//! use nexus_common::error::NexusResult;
//!
//! fn example() -> NexusResult<()> {
//!     let txn_id = TxnId::new(1);
//!     let pid = ProcessId::new(4242);
//!     assert!(txn_id.is_valid());
//!     assert_eq!(pid.as_i32(), 4242);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use error::{ErrorCode, NexusError, NexusResult};
pub use types::{ProcessId, TxnId};
