//! Connected peers and the protocols they advertise

use crate::protocol::ProtocolId;
use libp2p::{Multiaddr, PeerId};
use peerpay_core::now_millis;
use std::collections::HashMap;

/// What we know about one connected peer
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub peer_id: PeerId,
    /// Remote addresses of the open connections
    pub addresses: Vec<Multiaddr>,
    /// Protocols declared over identify; empty until identified
    pub protocols: Vec<String>,
    pub connected_at: u64,
    pub last_seen: u64,
}

impl PeerInfo {
    pub fn new(peer_id: PeerId) -> Self {
        let now = now_millis();
        Self {
            peer_id,
            addresses: Vec::new(),
            protocols: Vec::new(),
            connected_at: now,
            last_seen: now,
        }
    }

    /// Add an address for this peer
    pub fn add_address(&mut self, addr: Multiaddr) {
        if !self.addresses.contains(&addr) {
            self.addresses.push(addr);
        }
    }

    /// Replace the advertised protocol list
    pub fn set_protocols(&mut self, protocols: Vec<String>) {
        self.protocols = protocols;
        self.update_last_seen();
    }

    pub fn update_last_seen(&mut self) {
        self.last_seen = now_millis();
    }

    /// A peer is a broadcast target only if it speaks every application
    /// protocol
    pub fn is_eligible(&self) -> bool {
        crate::protocol::is_eligible(&self.protocols)
    }

    pub fn supports(&self, protocol: ProtocolId) -> bool {
        self.protocols.iter().any(|p| p == protocol.as_str())
    }
}

/// Authoritative connected-peer set. Owned by the overlay task.
#[derive(Debug)]
pub struct PeerManager {
    peers: HashMap<PeerId, PeerInfo>,
    max_peers: usize,
}

impl PeerManager {
    /// Create a new peer manager
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: HashMap::new(),
            max_peers,
        }
    }

    /// Record an open connection. Returns true when this is the peer's first
    /// connection.
    pub fn mark_connected(&mut self, peer_id: PeerId, address: Multiaddr) -> bool {
        let mut first = false;
        let info = self.peers.entry(peer_id).or_insert_with(|| {
            first = true;
            PeerInfo::new(peer_id)
        });
        info.add_address(address);
        info.update_last_seen();
        first
    }

    /// Forget a peer whose last connection closed
    pub fn mark_disconnected(&mut self, peer_id: &PeerId) -> Option<PeerInfo> {
        self.peers.remove(peer_id)
    }

    /// Store identify results. Returns the peer's eligibility, or None if the
    /// peer is not connected.
    pub fn set_protocols(&mut self, peer_id: &PeerId, protocols: Vec<String>) -> Option<bool> {
        let info = self.peers.get_mut(peer_id)?;
        info.set_protocols(protocols);
        Some(info.is_eligible())
    }

    /// Get peer information
    pub fn get_peer(&self, peer_id: &PeerId) -> Option<&PeerInfo> {
        self.peers.get(peer_id)
    }

    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    pub fn eligible_peers(&self) -> Vec<PeerId> {
        self.peers
            .values()
            .filter(|peer| peer.is_eligible())
            .map(|peer| peer.peer_id)
            .collect()
    }

    /// Get current peer count
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Check if we can accept more peers
    pub fn can_accept_more_peers(&self) -> bool {
        self.peer_count() < self.max_peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_protocols() -> Vec<String> {
        ProtocolId::ALL.iter().map(|p| p.as_str().to_string()).collect()
    }

    #[test]
    fn test_connect_transitions_once() {
        let mut manager = PeerManager::new(50);
        let peer_id = PeerId::random();
        let addr: Multiaddr = "/ip4/127.0.0.1/tcp/4001".parse().unwrap();

        assert!(manager.mark_connected(peer_id, addr.clone()));
        assert!(!manager.mark_connected(peer_id, addr.clone()));
        assert_eq!(manager.peer_count(), 1);
        assert_eq!(manager.get_peer(&peer_id).unwrap().addresses, vec![addr]);

        assert!(manager.mark_disconnected(&peer_id).is_some());
        assert!(manager.mark_disconnected(&peer_id).is_none());
        assert_eq!(manager.peer_count(), 0);
    }

    #[test]
    fn test_eligibility_requires_every_protocol() {
        let mut manager = PeerManager::new(50);
        let full = PeerId::random();
        let partial = PeerId::random();
        let unidentified = PeerId::random();
        let addr: Multiaddr = "/ip4/127.0.0.1/tcp/4001".parse().unwrap();

        for peer in [full, partial, unidentified] {
            manager.mark_connected(peer, addr.clone());
        }

        let mut protocols = all_protocols();
        protocols.push("/ipfs/ping/1.0.0".to_string());
        assert_eq!(manager.set_protocols(&full, protocols), Some(true));

        let mut missing_one = all_protocols();
        missing_one.retain(|p| p != ProtocolId::Ledger.as_str());
        assert_eq!(manager.set_protocols(&partial, missing_one), Some(false));
        assert!(manager.get_peer(&partial).unwrap().supports(ProtocolId::Signal));

        assert_eq!(manager.eligible_peers(), vec![full]);
        assert_eq!(manager.connected_peers().len(), 3);
    }

    #[test]
    fn test_identify_for_unknown_peer_is_ignored() {
        let mut manager = PeerManager::new(50);
        assert_eq!(manager.set_protocols(&PeerId::random(), all_protocols()), None);
        assert!(manager.eligible_peers().is_empty());
    }

    #[test]
    fn test_peer_limit() {
        let mut manager = PeerManager::new(1);
        assert!(manager.can_accept_more_peers());
        manager.mark_connected(PeerId::random(), Multiaddr::empty());
        assert!(!manager.can_accept_more_peers());
    }
}
