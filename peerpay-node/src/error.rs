//! Node error types

use peerpay_core::CoreError;
use peerpay_db::DbError;
use peerpay_mining::MiningError;
use peerpay_network::NetworkError;
use thiserror::Error;

pub type NodeResult<T> = Result<T, NodeError>;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Ledger store error: {0}")]
    Store(#[from] DbError),

    #[error("Mining error: {0}")]
    Mining(#[from] MiningError),

    #[error("Ledger error: {0}")]
    Core(#[from] CoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for NodeError {
    fn from(e: config::ConfigError) -> Self {
        NodeError::Config(e.to_string())
    }
}
