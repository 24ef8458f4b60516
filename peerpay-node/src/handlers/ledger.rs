//! Ledger broadcast: wholesale replacement, last writer wins

use crate::broadcast::{broadcast, BroadcastReport};
use crate::context::NodeContext;
use crate::NodeResult;
use peerpay_core::Ledger;
use peerpay_network::{PeerId, WireMessage};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Adopt a ledger received from `from`, superseding any running mining job
pub fn handle_inbound(ctx: &mut NodeContext, from: PeerId, ledger: Ledger) -> NodeResult<()> {
    if ctx.mining.cancel() {
        info!("Ledger from {} supersedes the running mining job", from);
    }

    if let Err(e) = ledger.verify() {
        warn!("Ledger from {} does not verify ({}), adopting it anyway", from, e);
    }

    let (height, pending) = (ledger.height(), ledger.unconfirmed.len());
    let mut snapshot = Some(ledger);
    ctx.store.modify(&mut |current| {
        if let Some(snapshot) = snapshot.take() {
            current.replace(snapshot);
        }
        Ok(())
    })?;
    info!(
        "Adopted ledger from {} ({} blocks, {} pending)",
        from, height, pending
    );

    ctx.emit_wallet_if_changed()
}

/// Broadcast `ledger` to every eligible peer
pub fn broadcast_ledger(ctx: &NodeContext, ledger: Ledger) -> JoinHandle<BroadcastReport> {
    broadcast(ctx.messenger.clone(), WireMessage::Ledger(Box::new(ledger)))
}
