//! Core ledger data structures
//!
//! This crate provides the data model shared by every peer:
//! - Basic types (Hash, Address, Amount, etc.)
//! - Signed transactions and mined blocks
//! - The replicated `Ledger` and its wallet-balance fold

pub mod block;
pub mod error;
pub mod ledger;
pub mod transaction;
pub mod types;

// Re-export commonly used types
pub use block::*;
pub use error::*;
pub use ledger::*;
pub use transaction::*;
pub use types::*;
