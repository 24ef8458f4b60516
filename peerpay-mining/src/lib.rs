//! Block mining
//!
//! This crate provides the proof-of-work search and the coordinator that
//! runs it as a single cancellable job off the async event loop.

pub mod coordinator;
pub mod error;
pub mod pow;

pub use coordinator::{MiningCoordinator, MiningOutcome, MiningStart, MiningState};
pub use error::{MiningError, MiningResult};
pub use pow::ProofOfWork;
