//! Application protocols spoken over the overlay
//!
//! Every message travels on its own substream negotiated for exactly one of
//! the three protocol ids below. The request is the JSON payload read to end
//! of stream; the response is a single ack byte.

use crate::{NetworkError, NetworkResult};
use async_trait::async_trait;
use futures::prelude::*;
use libp2p::request_response;
use libp2p::StreamProtocol;
use peerpay_core::{Ledger, Transaction};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// Protocol identifiers
pub mod protocols {
    pub const SIGNAL: &str = "/peerpay/signal/1.0.0";
    pub const LEDGER: &str = "/peerpay/ledger/1.0.0";
    pub const TRANSACTION: &str = "/peerpay/transaction/1.0.0";
}

/// Message size limits
pub mod limits {
    /// Signaling blobs (SDP offers and ICE candidates)
    pub const MAX_SIGNAL_SIZE: usize = 64 * 1024;
    pub const MAX_TRANSACTION_SIZE: usize = 16 * 1024;
    /// Full ledger snapshot
    pub const MAX_LEDGER_SIZE: usize = 8 * 1024 * 1024;
}

const ACK: u8 = 0x01;

/// The closed set of application protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolId {
    Signal,
    Ledger,
    Transaction,
}

impl ProtocolId {
    pub const ALL: [ProtocolId; 3] = [
        ProtocolId::Signal,
        ProtocolId::Ledger,
        ProtocolId::Transaction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolId::Signal => protocols::SIGNAL,
            ProtocolId::Ledger => protocols::LEDGER,
            ProtocolId::Transaction => protocols::TRANSACTION,
        }
    }

    pub fn stream_protocol(&self) -> StreamProtocol {
        StreamProtocol::new(self.as_str())
    }

    /// Map a negotiated identifier back to its protocol
    pub fn parse(id: &str) -> NetworkResult<Self> {
        match id {
            protocols::SIGNAL => Ok(ProtocolId::Signal),
            protocols::LEDGER => Ok(ProtocolId::Ledger),
            protocols::TRANSACTION => Ok(ProtocolId::Transaction),
            other => Err(NetworkError::UnsupportedProtocol(other.to_string())),
        }
    }

    pub fn max_message_size(&self) -> usize {
        match self {
            ProtocolId::Signal => limits::MAX_SIGNAL_SIZE,
            ProtocolId::Ledger => limits::MAX_LEDGER_SIZE,
            ProtocolId::Transaction => limits::MAX_TRANSACTION_SIZE,
        }
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when `protocols` contains every application protocol id
pub fn is_eligible<I, S>(protocols: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = [false; 3];
    for protocol in protocols {
        if let Ok(id) = ProtocolId::parse(protocol.as_ref()) {
            seen[id as usize] = true;
        }
    }
    seen.iter().all(|s| *s)
}

/// Opaque realtime-communication signal. Only its size and JSON
/// well-formedness are checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalPayload(serde_json::Value);

impl SignalPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

/// A decoded application message
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Signal(SignalPayload),
    Transaction(Box<Transaction>),
    Ledger(Box<Ledger>),
}

impl WireMessage {
    /// The protocol this message must travel on
    pub fn protocol(&self) -> ProtocolId {
        match self {
            WireMessage::Signal(_) => ProtocolId::Signal,
            WireMessage::Transaction(_) => ProtocolId::Transaction,
            WireMessage::Ledger(_) => ProtocolId::Ledger,
        }
    }

    /// Serialize the payload and enforce the protocol's size limit
    pub fn encode(&self) -> NetworkResult<Vec<u8>> {
        let bytes = match self {
            WireMessage::Signal(signal) => serde_json::to_vec(signal)?,
            WireMessage::Transaction(tx) => serde_json::to_vec(tx)?,
            WireMessage::Ledger(ledger) => serde_json::to_vec(ledger)?,
        };
        check_size(self.protocol(), bytes.len())?;
        Ok(bytes)
    }

    /// Decode a payload received on `protocol`
    pub fn decode(protocol: ProtocolId, bytes: &[u8]) -> NetworkResult<Self> {
        check_size(protocol, bytes.len())?;
        let message = match protocol {
            ProtocolId::Signal => WireMessage::Signal(serde_json::from_slice(bytes)?),
            ProtocolId::Transaction => {
                WireMessage::Transaction(Box::new(serde_json::from_slice(bytes)?))
            }
            ProtocolId::Ledger => WireMessage::Ledger(Box::new(serde_json::from_slice(bytes)?)),
        };
        Ok(message)
    }
}

fn check_size(protocol: ProtocolId, size: usize) -> NetworkResult<()> {
    let limit = protocol.max_message_size();
    if size > limit {
        return Err(NetworkError::MessageTooLarge { size, limit });
    }
    Ok(())
}

/// Receipt for a delivered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

/// Request-response codec shared by the three protocol behaviours
#[derive(Debug, Clone, Copy, Default)]
pub struct WireCodec;

fn invalid_data(e: impl fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

#[async_trait]
impl request_response::Codec for WireCodec {
    type Protocol = StreamProtocol;
    type Request = WireMessage;
    type Response = Ack;

    async fn read_request<T>(&mut self, protocol: &StreamProtocol, io: &mut T) -> io::Result<WireMessage>
    where
        T: AsyncRead + Unpin + Send,
    {
        let id = ProtocolId::parse(protocol.as_ref()).map_err(invalid_data)?;
        let limit = id.max_message_size();

        let mut bytes = Vec::new();
        io.take(limit as u64 + 1).read_to_end(&mut bytes).await?;
        if bytes.len() > limit {
            return Err(invalid_data(NetworkError::MessageTooLarge {
                size: bytes.len(),
                limit,
            }));
        }

        WireMessage::decode(id, &bytes).map_err(invalid_data)
    }

    async fn read_response<T>(&mut self, _protocol: &StreamProtocol, io: &mut T) -> io::Result<Ack>
    where
        T: AsyncRead + Unpin + Send,
    {
        let mut byte = [0u8; 1];
        io.read_exact(&mut byte).await?;
        if byte[0] != ACK {
            return Err(invalid_data(format!("unexpected ack byte {:#04x}", byte[0])));
        }
        Ok(Ack)
    }

    async fn write_request<T>(
        &mut self,
        protocol: &StreamProtocol,
        io: &mut T,
        request: WireMessage,
    ) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        let id = ProtocolId::parse(protocol.as_ref()).map_err(invalid_data)?;
        if request.protocol() != id {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} message on {} stream", request.protocol(), id),
            ));
        }

        let bytes = request.encode().map_err(invalid_data)?;
        io.write_all(&bytes).await?;
        io.close().await
    }

    async fn write_response<T>(&mut self, _protocol: &StreamProtocol, io: &mut T, _response: Ack) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        io.write_all(&[ACK]).await?;
        io.close().await
    }
}
