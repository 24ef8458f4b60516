//! Protocol router: dispatch of inbound application messages

use crate::context::NodeContext;
use crate::handlers::{ledger, signal, transaction};
use crate::NodeResult;
use peerpay_network::{PeerId, ProtocolId, WireMessage};
use tracing::warn;

/// Hand a decoded message to its handler
pub fn route(ctx: &mut NodeContext, from: PeerId, message: WireMessage) -> NodeResult<()> {
    match message {
        WireMessage::Signal(payload) => {
            signal::handle(ctx, from, payload);
            Ok(())
        }
        WireMessage::Transaction(tx) => transaction::handle_inbound(ctx, from, *tx).map(|_| ()),
        WireMessage::Ledger(snapshot) => ledger::handle_inbound(ctx, from, *snapshot),
    }
}

/// Decode-then-route path for raw payloads that did not come through the
/// overlay codec, which already negotiates the protocol and decodes. Unknown
/// protocols and malformed payloads are logged and dropped.
pub fn route_raw(
    ctx: &mut NodeContext,
    from: PeerId,
    protocol: &str,
    payload: &[u8],
) -> NodeResult<()> {
    let id = match ProtocolId::parse(protocol) {
        Ok(id) => id,
        Err(e) => {
            warn!("Dropping stream from {}: {}", from, e);
            return Ok(());
        }
    };

    match WireMessage::decode(id, payload) {
        Ok(message) => route(ctx, from, message),
        Err(e) => {
            warn!("Dropping malformed {} payload from {}: {}", id, from, e);
            Ok(())
        }
    }
}
