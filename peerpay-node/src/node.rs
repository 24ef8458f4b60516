//! Node control loop
//!
//! One task owns every core mutation. It consumes overlay events, UI
//! commands and mining outcomes in arrival order.

use crate::broadcast::BroadcastReport;
use crate::context::NodeContext;
use crate::handlers::{ledger, signal, transaction};
use crate::router;
use crate::ui::{notifications, UiCommand, UiEvent};
use crate::NodeResult;
use peerpay_mining::{MiningOutcome, MiningStart};
use peerpay_network::{OverlayEvent, PeerMessenger};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct Node {
    ctx: NodeContext,
}

impl Node {
    pub fn new(ctx: NodeContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut NodeContext {
        &mut self.ctx
    }

    /// Run until the UI input closes or the process is interrupted
    pub async fn run(
        mut self,
        mut overlay_events: mpsc::Receiver<OverlayEvent>,
        mut ui_commands: mpsc::Receiver<UiCommand>,
    ) -> NodeResult<()> {
        info!("Node {} running", self.ctx.address);
        self.ctx.emit_wallet()?;
        self.emit_peers().await;

        loop {
            tokio::select! {
                Some(event) = overlay_events.recv() => {
                    if let Err(e) = self.handle_overlay_event(event).await {
                        warn!("Failed to handle overlay event: {}", e);
                    }
                }
                command = ui_commands.recv() => match command {
                    Some(command) => {
                        if let Err(e) = self.handle_ui_command(command).await {
                            warn!("Failed to handle UI command: {}", e);
                        }
                    }
                    None => {
                        info!("UI input closed, shutting down");
                        break;
                    }
                },
                outcome = self.ctx.mining.next_outcome() => {
                    if let Err(e) = self.handle_mining_outcome(outcome) {
                        warn!("Failed to finish mining job: {}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down");
                    break;
                }
            }
        }

        if self.ctx.mining.cancel() {
            info!("Stopped the running mining job");
        }
        Ok(())
    }

    pub async fn handle_overlay_event(&mut self, event: OverlayEvent) -> NodeResult<()> {
        match event {
            OverlayEvent::PeerConnected(peer) => {
                self.ctx.ui.emit(UiEvent::PeerConnect {
                    id: peer.to_string(),
                });
            }
            OverlayEvent::PeerDisconnected(peer) => {
                self.ctx.ui.emit(UiEvent::PeerDisconnect {
                    id: peer.to_string(),
                });
            }
            OverlayEvent::PeerIdentified { peer, eligible } => {
                debug!("Peer {} identified (eligible: {})", peer, eligible);
                if eligible {
                    self.emit_peers().await;
                }
            }
            OverlayEvent::Inbound { peer, message } => router::route(&mut self.ctx, peer, message)?,
            OverlayEvent::NewListenAddress(address) => debug!("Reachable at {}", address),
        }
        Ok(())
    }

    pub async fn handle_ui_command(&mut self, command: UiCommand) -> NodeResult<()> {
        match command {
            UiCommand::Transaction { receiver, amount } => {
                transaction::create(&mut self.ctx, &receiver, amount)?;
            }
            UiCommand::Mine => {
                self.start_mining()?;
            }
            UiCommand::Rtc { id, signal } => {
                signal::relay(&self.ctx, &id, signal);
            }
            UiCommand::Peers => self.emit_peers().await,
        }
        Ok(())
    }

    /// Start a mining job for the local identity and tell the UI
    pub fn start_mining(&mut self) -> NodeResult<MiningStart> {
        let start = self.ctx.mining.start(self.ctx.address.clone())?;
        let message = match start {
            MiningStart::Started => notifications::MINING_STARTED,
            MiningStart::NothingToMine => notifications::NOTHING_TO_MINE,
            MiningStart::AlreadyMining => notifications::ALREADY_MINING,
        };
        self.ctx.ui.notify(message);
        Ok(start)
    }

    /// Report a finished job. A mined block was committed when the outcome
    /// was collected; the ledger from that commit is broadcast.
    pub fn handle_mining_outcome(
        &mut self,
        outcome: MiningOutcome,
    ) -> NodeResult<Option<JoinHandle<BroadcastReport>>> {
        match outcome {
            MiningOutcome::Succeeded { block, ledger: mined } => {
                info!("Block #{} mined, broadcasting ledger", block.index);
                self.ctx.ui.notify(notifications::BLOCK_MINED);
                self.ctx.emit_wallet()?;
                Ok(Some(ledger::broadcast_ledger(&self.ctx, mined)))
            }
            MiningOutcome::Cancelled => {
                self.ctx.ui.notify(notifications::MINING_STOPPED);
                Ok(None)
            }
            MiningOutcome::Failed(reason) => {
                warn!("Mining failed: {}", reason);
                self.ctx.ui.notify(format!("Mining failed: {}", reason));
                Ok(None)
            }
        }
    }

    async fn emit_peers(&self) {
        match self.ctx.messenger.eligible_peers().await {
            Ok(peers) => self.ctx.ui.emit(UiEvent::Peers {
                peers: peers.iter().map(|p| p.to_string()).collect(),
            }),
            Err(e) => warn!("Could not list peers: {}", e),
        }
    }
}
