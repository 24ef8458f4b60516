//! Ledger store error types

use peerpay_core::CoreError;
use thiserror::Error;

/// Ledger store error type
#[derive(Error, Debug)]
pub enum DbError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Ledger rule violation raised while applying a change
    #[error("Ledger error: {0}")]
    Ledger(#[from] CoreError),
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

/// Result type for ledger store operations
pub type DbResult<T> = Result<T, DbError>;
