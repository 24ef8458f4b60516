//! Peer identity and key management

use crate::{NetworkError, NetworkResult};
use libp2p::{identity::Keypair, PeerId};
use peerpay_core::Address;
use std::fs;
use std::path::Path;

/// Stable identity of this process: an ed25519 keypair and the peer id
/// derived from its public half
#[derive(Debug, Clone)]
pub struct PeerIdentity {
    /// The node's keypair
    keypair: Keypair,
    /// The derived peer ID
    peer_id: PeerId,
}

impl PeerIdentity {
    /// Generate a new random identity
    pub fn generate() -> Self {
        let keypair = Keypair::generate_ed25519();
        let peer_id = PeerId::from(&keypair.public());

        Self { keypair, peer_id }
    }

    /// Load identity from keystore file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> NetworkResult<Self> {
        let data = fs::read(path.as_ref()).map_err(NetworkError::Io)?;

        let keypair = Keypair::from_protobuf_encoding(&data)
            .map_err(|e| NetworkError::Identity(format!("Failed to decode keypair: {}", e)))?;

        let peer_id = PeerId::from(&keypair.public());

        Ok(Self { keypair, peer_id })
    }

    /// Save identity to keystore file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> NetworkResult<()> {
        // Create directory if it doesn't exist
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let encoded = self
            .keypair
            .to_protobuf_encoding()
            .map_err(|e| NetworkError::Identity(format!("Failed to encode keypair: {}", e)))?;

        fs::write(path.as_ref(), encoded)?;
        Ok(())
    }

    /// Load the identity at `path`, generating and persisting one on first
    /// run. An existing but unreadable keystore is an error, never silently
    /// replaced.
    pub fn load_or_generate<P: AsRef<Path>>(path: P) -> NetworkResult<Self> {
        if path.as_ref().exists() {
            let identity = Self::load_from_file(&path)?;
            tracing::info!("Loaded existing peer identity: {}", identity.peer_id);
            return Ok(identity);
        }

        tracing::info!("Generating new peer identity");
        let identity = Self::generate();
        identity.save_to_file(&path)?;
        tracing::info!("Saved new peer identity: {}", identity.peer_id);
        Ok(identity)
    }

    /// Get the keypair
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Get the peer ID
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Wallet address of this identity
    pub fn address(&self) -> Address {
        Address::from(self.peer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generate_identity() {
        let identity = PeerIdentity::generate();
        let peer_id = identity.peer_id();

        // Peer ID should be deterministic from keypair
        let keypair = identity.keypair();
        let expected_peer_id = PeerId::from(&keypair.public());
        assert_eq!(peer_id, expected_peer_id);
        assert_eq!(identity.address().to_peer_id().unwrap(), peer_id);
    }

    #[test]
    fn test_save_and_load_identity() {
        let temp_dir = tempdir().unwrap();
        let keystore_path = temp_dir.path().join("peer_key");

        let original_identity = PeerIdentity::generate();
        original_identity.save_to_file(&keystore_path).unwrap();

        let loaded_identity = PeerIdentity::load_from_file(&keystore_path).unwrap();
        assert_eq!(original_identity.peer_id(), loaded_identity.peer_id());
    }

    #[test]
    fn test_load_or_generate() {
        let temp_dir = tempdir().unwrap();
        let keystore_path = temp_dir.path().join("keys").join("peer_key");

        // First call should generate new identity
        let identity1 = PeerIdentity::load_or_generate(&keystore_path).unwrap();
        assert!(keystore_path.exists());
        let written = fs::read(&keystore_path).unwrap();

        // Second call should load existing identity without rewriting it
        let identity2 = PeerIdentity::load_or_generate(&keystore_path).unwrap();
        assert_eq!(identity1.peer_id(), identity2.peer_id());
        assert_eq!(fs::read(&keystore_path).unwrap(), written);
    }

    #[test]
    fn test_corrupt_keystore_is_not_replaced() {
        let temp_dir = tempdir().unwrap();
        let keystore_path = temp_dir.path().join("peer_key");
        fs::write(&keystore_path, b"garbage").unwrap();

        let result = PeerIdentity::load_or_generate(&keystore_path);
        assert!(matches!(result, Err(NetworkError::Identity(_))));
        assert_eq!(fs::read(&keystore_path).unwrap(), b"garbage");
    }
}
