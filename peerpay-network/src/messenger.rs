//! Outbound seam used by the broadcast fan-out

use crate::overlay::OverlayHandle;
use crate::protocol::WireMessage;
use crate::NetworkResult;
use async_trait::async_trait;
use libp2p::PeerId;

/// Anything that can list broadcast targets and deliver one message to one
/// peer. Implemented by the overlay handle; tests wire nodes together with
/// an in-process implementation.
#[async_trait]
pub trait PeerMessenger: Send + Sync {
    /// Connected peers that speak every application protocol
    async fn eligible_peers(&self) -> NetworkResult<Vec<PeerId>>;

    /// Deliver `message` to `peer` once
    async fn send(&self, peer: PeerId, message: WireMessage) -> NetworkResult<()>;
}

#[async_trait]
impl PeerMessenger for OverlayHandle {
    async fn eligible_peers(&self) -> NetworkResult<Vec<PeerId>> {
        OverlayHandle::eligible_peers(self).await
    }

    async fn send(&self, peer: PeerId, message: WireMessage) -> NetworkResult<()> {
        OverlayHandle::send(self, peer, message).await
    }
}
