//! Network configuration

use libp2p::multiaddr::Protocol;
use libp2p::Multiaddr;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Node's listening addresses
    pub listen_addresses: Vec<Multiaddr>,

    /// Rendezvous relay, including its `/p2p/<id>` suffix
    pub relay_address: Option<Multiaddr>,

    /// Bootstrap nodes to connect to
    pub bootstrap_nodes: Vec<Multiaddr>,

    /// Path to store node identity keypair
    pub keystore_path: PathBuf,

    /// Maximum number of peer connections
    pub max_peers: usize,

    /// Transport upgrade timeout
    pub connection_timeout_secs: u64,

    /// Bound on one outbound message, negotiation included
    pub stream_timeout_secs: u64,

    /// How long an idle connection is kept open
    pub idle_connection_timeout_secs: u64,

    /// Capacity of the overlay event channel
    pub event_buffer: usize,

    /// Protocol version announced over identify
    pub protocol_version: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addresses: vec![Multiaddr::empty()
                .with(Protocol::Ip4([0, 0, 0, 0].into()))
                .with(Protocol::Tcp(4001))],
            relay_address: None,
            bootstrap_nodes: Vec::new(),
            keystore_path: PathBuf::from("./data/peer_key"),
            max_peers: 50,
            connection_timeout_secs: 10,
            stream_timeout_secs: 10,
            idle_connection_timeout_secs: 60,
            event_buffer: 256,
            protocol_version: "/peerpay/0.1.0".to_string(),
        }
    }
}

impl NetworkConfig {
    /// Create a new network configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set listening addresses
    pub fn with_listen_addresses(mut self, addresses: Vec<Multiaddr>) -> Self {
        self.listen_addresses = addresses;
        self
    }

    /// Set the rendezvous relay
    pub fn with_relay_address(mut self, relay: Multiaddr) -> Self {
        self.relay_address = Some(relay);
        self
    }

    /// Add bootstrap nodes
    pub fn with_bootstrap_nodes(mut self, nodes: Vec<Multiaddr>) -> Self {
        self.bootstrap_nodes = nodes;
        self
    }

    /// Set keystore path
    pub fn with_keystore_path(mut self, path: PathBuf) -> Self {
        self.keystore_path = path;
        self
    }

    /// Set maximum peers
    pub fn with_max_peers(mut self, max_peers: usize) -> Self {
        self.max_peers = max_peers;
        self
    }

    /// Set the per-message timeout
    pub fn with_stream_timeout_secs(mut self, secs: u64) -> Self {
        self.stream_timeout_secs = secs;
        self
    }

    pub fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer;
        self
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }

    pub fn idle_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_connection_timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addresses.is_empty() {
            return Err("At least one listen address must be specified".to_string());
        }

        if self.max_peers == 0 {
            return Err("Maximum peers must be greater than 0".to_string());
        }

        if self.connection_timeout_secs == 0 || self.stream_timeout_secs == 0 {
            return Err("Timeouts must be greater than 0".to_string());
        }

        if self.event_buffer == 0 {
            return Err("Event buffer must be greater than 0".to_string());
        }

        if let Some(relay) = &self.relay_address {
            if crate::bootstrap::peer_id_of(relay).is_none() {
                return Err(format!("Relay address {} must end in /p2p/<peer id>", relay));
            }
        }

        Ok(())
    }
}
