//! Handlers for the three application protocols

pub mod ledger;
pub mod signal;
pub mod transaction;
