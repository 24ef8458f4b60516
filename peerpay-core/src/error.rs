//! Error types for the core crate

use thiserror::Error;

/// Core ledger errors
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid amount: {0}")]
    InvalidAmount(u64),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Stale block: expected parent {expected}, ledger tip is {actual}")]
    StaleBlock { expected: String, actual: String },

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Bincode error: {0}")]
    Bincode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
