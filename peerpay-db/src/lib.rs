//! Ledger storage layer
//!
//! This crate persists the replicated ledger and answers the wallet and
//! pool queries the protocol handlers need.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{DbError, DbResult};
pub use file::FileLedgerStore;
pub use memory::MemoryLedgerStore;
pub use traits::{LedgerStore, SharedLedgerStore};
