//! State shared by the router and the protocol handlers

use crate::broadcast::SharedMessenger;
use crate::ui::{UiEvent, UiSink};
use crate::NodeResult;
use peerpay_core::{Address, Balance};
use peerpay_db::SharedLedgerStore;
use peerpay_mining::MiningCoordinator;
use peerpay_network::PeerIdentity;

/// Everything a handler may touch. Owned by the control loop, so handlers
/// run one at a time in arrival order.
pub struct NodeContext {
    pub identity: PeerIdentity,
    pub address: Address,
    pub store: SharedLedgerStore,
    pub mining: MiningCoordinator,
    pub ui: UiSink,
    pub messenger: SharedMessenger,
    last_wallet: Option<Balance>,
}

impl NodeContext {
    pub fn new(
        identity: PeerIdentity,
        store: SharedLedgerStore,
        messenger: SharedMessenger,
        ui: UiSink,
    ) -> Self {
        Self {
            address: identity.address(),
            identity,
            mining: MiningCoordinator::new(store.clone()),
            store,
            ui,
            messenger,
            last_wallet: None,
        }
    }

    /// Local balance, confirmed and pending
    pub fn wallet(&self) -> NodeResult<Balance> {
        Ok(self.store.get_wallet(&self.address)?)
    }

    /// Push the local balance to the UI
    pub fn emit_wallet(&mut self) -> NodeResult<Balance> {
        let balance = self.wallet()?;
        self.last_wallet = Some(balance);
        self.ui.emit(UiEvent::Wallet { balance });
        Ok(balance)
    }

    /// Push the local balance only if it differs from the last one pushed
    pub fn emit_wallet_if_changed(&mut self) -> NodeResult<()> {
        let balance = self.wallet()?;
        if self.last_wallet != Some(balance) {
            self.last_wallet = Some(balance);
            self.ui.emit(UiEvent::Wallet { balance });
        }
        Ok(())
    }
}
