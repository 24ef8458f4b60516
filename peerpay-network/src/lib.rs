//! Peer overlay for peerpay
//!
//! This crate provides the P2P layer: node identity, the libp2p transport
//! (TCP, relay circuits, hole punching), peer capability tracking, and the
//! three application protocols carried over request-response streams.

pub mod behaviour;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod identity;
pub mod messenger;
pub mod overlay;
pub mod peer;
pub mod protocol;
pub mod transport;

pub use config::NetworkConfig;
pub use error::{NetworkError, NetworkResult};
pub use identity::PeerIdentity;
pub use messenger::PeerMessenger;
pub use overlay::{Overlay, OverlayEvent, OverlayHandle};
pub use peer::{PeerInfo, PeerManager};
pub use protocol::{ProtocolId, SignalPayload, WireMessage};

/// Re-export commonly used types
pub use libp2p::{Multiaddr, PeerId};
