//! Network error types

use thiserror::Error;

pub type NetworkResult<T> = Result<T, NetworkError>;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Libp2p transport error: {0}")]
    Transport(#[from] libp2p::TransportError<std::io::Error>),

    #[error("Peer connection error: {0}")]
    Connection(String),

    #[error("Message of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Network timeout")]
    Timeout,

    #[error("Protocol not supported: {0}")]
    UnsupportedProtocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Overlay is not running")]
    OverlayStopped,
}
