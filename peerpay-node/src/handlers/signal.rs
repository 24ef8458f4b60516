//! Signaling relay: opaque realtime-communication blobs between peers

use crate::context::NodeContext;
use crate::ui::UiEvent;
use peerpay_network::{NetworkResult, PeerId, PeerMessenger, SignalPayload, WireMessage};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Hand a signal from `from` to the local UI
pub fn handle(ctx: &NodeContext, from: PeerId, payload: SignalPayload) {
    debug!("Relaying signal from {} to the UI", from);
    ctx.ui.emit(UiEvent::Rtc {
        id: from.to_string(),
        signal: payload.into_value(),
    });
}

/// Send a UI signal to exactly the peer `to`. Returns None when `to` is not
/// a peer id.
pub fn relay(
    ctx: &NodeContext,
    to: &str,
    signal: serde_json::Value,
) -> Option<JoinHandle<NetworkResult<()>>> {
    let peer: PeerId = match to.parse() {
        Ok(peer) => peer,
        Err(e) => {
            warn!("Dropping signal for invalid peer id '{}': {}", to, e);
            return None;
        }
    };

    let messenger = ctx.messenger.clone();
    Some(tokio::spawn(async move {
        let result = messenger
            .send(peer, WireMessage::Signal(SignalPayload::new(signal)))
            .await;
        if let Err(e) = &result {
            warn!("Could not negotiate signal stream with {}: {}", peer, e);
        }
        result
    }))
}
