//! Bootstrap and relay address helpers

use libp2p::multiaddr::Protocol;
use libp2p::{Multiaddr, PeerId};
use std::str::FromStr;

/// Parse bootstrap nodes from command line arguments
pub fn from_strings(nodes: Vec<String>) -> Result<Vec<Multiaddr>, String> {
    nodes
        .into_iter()
        .map(|s| Multiaddr::from_str(&s).map_err(|e| format!("Invalid multiaddr '{}': {}", s, e)))
        .collect()
}

/// Peer id named by the trailing `/p2p/<id>` component, if any
pub fn peer_id_of(addr: &Multiaddr) -> Option<PeerId> {
    match addr.iter().last() {
        Some(Protocol::P2p(peer_id)) => Some(peer_id),
        _ => None,
    }
}

/// Address to listen on for connections relayed through `relay`
pub fn relay_circuit_address(relay: &Multiaddr) -> Multiaddr {
    relay.clone().with(Protocol::P2pCircuit)
}

/// Whether `addr` goes through a relay
pub fn is_relayed(addr: &Multiaddr) -> bool {
    addr.iter().any(|p| matches!(p, Protocol::P2pCircuit))
}
