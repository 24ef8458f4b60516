//! Transaction broadcast: inbound pool updates and local transfers

use crate::broadcast::{broadcast, BroadcastReport};
use crate::context::NodeContext;
use crate::NodeResult;
use peerpay_core::{Address, Amount, Sender, Transaction};
use peerpay_db::DbError;
use peerpay_network::{PeerId, WireMessage};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Verify and pool a transaction received from `from`. Invalid and duplicate
/// transactions are dropped; returns whether it was pooled.
pub fn handle_inbound(ctx: &mut NodeContext, from: PeerId, tx: Transaction) -> NodeResult<bool> {
    match ctx.store.add_transaction(tx) {
        Ok(_) => {
            info!("Pooled transaction from {}", from);
            ctx.emit_wallet_if_changed()?;
            Ok(true)
        }
        Err(DbError::Ledger(e)) => {
            warn!("Dropped transaction from {}: {}", from, e);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Why a local transfer was refused
fn validate_request(ctx: &NodeContext, receiver: &str, amount: Amount) -> Result<Address, String> {
    if amount == 0 {
        return Err("Amount must be greater than zero".to_string());
    }
    let receiver: PeerId = receiver
        .parse()
        .map_err(|_| format!("Invalid receiver address: {}", receiver))?;
    let receiver = Address::from(receiver);
    if receiver == ctx.address {
        return Err("Cannot send a transaction to yourself".to_string());
    }
    Ok(receiver)
}

/// Sign, pool and broadcast a transfer from the local identity. Returns the
/// fan-out handle, or None when the request was refused.
pub fn create(
    ctx: &mut NodeContext,
    receiver: &str,
    amount: Amount,
) -> NodeResult<Option<JoinHandle<BroadcastReport>>> {
    let receiver = match validate_request(ctx, receiver, amount) {
        Ok(receiver) => receiver,
        Err(reason) => {
            warn!("Refused local transaction: {}", reason);
            ctx.ui.notify(reason);
            return Ok(None);
        }
    };

    let keypair = ctx.identity.keypair();
    let mut tx = Transaction::new(Sender::from_keypair(keypair), receiver, amount);
    tx.sign(keypair)?;

    ctx.store.add_transaction(tx.clone())?;
    let balance = ctx.emit_wallet()?;
    info!(
        "Sent {} to {} (balance now {})",
        amount, tx.receiver, balance
    );

    Ok(Some(broadcast(
        ctx.messenger.clone(),
        WireMessage::Transaction(Box::new(tx)),
    )))
}
