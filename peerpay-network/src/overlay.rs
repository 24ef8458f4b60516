//! Overlay service: owns the swarm on its own task and talks to the rest of
//! the node through a command handle and a bounded event channel

use crate::behaviour::{OverlayBehaviour, OverlayBehaviourEvent};
use crate::bootstrap::{peer_id_of, relay_circuit_address};
use crate::identity::PeerIdentity;
use crate::peer::PeerManager;
use crate::protocol::{Ack, ProtocolId, WireMessage};
use crate::transport::build_transport;
use crate::{NetworkConfig, NetworkError, NetworkResult};
use futures::StreamExt;
use libp2p::{
    identify, relay,
    request_response::{self, OutboundFailure, OutboundRequestId, ResponseChannel},
    swarm::{self, SwarmEvent},
    Multiaddr, PeerId, Swarm,
};
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Notifications from the overlay, delivered in arrival order
#[derive(Debug, Clone)]
pub enum OverlayEvent {
    /// First connection to a peer opened
    PeerConnected(PeerId),
    /// Last connection to a peer closed
    PeerDisconnected(PeerId),
    /// A peer declared its protocols
    PeerIdentified { peer: PeerId, eligible: bool },
    /// A decoded message arrived on one of the application protocols
    Inbound { peer: PeerId, message: WireMessage },
    /// A new local listen address became active
    NewListenAddress(Multiaddr),
}

#[derive(Debug)]
pub enum OverlayCommand {
    /// Deliver one message on a fresh substream
    Send {
        peer: PeerId,
        message: WireMessage,
        response: oneshot::Sender<NetworkResult<()>>,
    },
    ConnectedPeers {
        response: oneshot::Sender<Vec<PeerId>>,
    },
    EligiblePeers {
        response: oneshot::Sender<Vec<PeerId>>,
    },
    ListenAddresses {
        response: oneshot::Sender<Vec<Multiaddr>>,
    },
    Dial {
        address: Multiaddr,
        response: oneshot::Sender<NetworkResult<()>>,
    },
}

/// Cloneable handle to the running overlay
#[derive(Debug, Clone)]
pub struct OverlayHandle {
    local_peer_id: PeerId,
    tx: mpsc::UnboundedSender<OverlayCommand>,
}

impl OverlayHandle {
    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    /// Send `message` to `peer`. Resolves once the peer acknowledged it or
    /// the attempt failed; never retried.
    pub async fn send(&self, peer: PeerId, message: WireMessage) -> NetworkResult<()> {
        self.request(|response| OverlayCommand::Send {
            peer,
            message,
            response,
        })
        .await?
    }

    /// Peers with at least one open connection
    pub async fn connected_peers(&self) -> NetworkResult<Vec<PeerId>> {
        self.request(|response| OverlayCommand::ConnectedPeers { response })
            .await
    }

    /// Connected peers that advertise every application protocol
    pub async fn eligible_peers(&self) -> NetworkResult<Vec<PeerId>> {
        self.request(|response| OverlayCommand::EligiblePeers { response })
            .await
    }

    pub async fn listen_addresses(&self) -> NetworkResult<Vec<Multiaddr>> {
        self.request(|response| OverlayCommand::ListenAddresses { response })
            .await
    }

    pub async fn dial(&self, address: Multiaddr) -> NetworkResult<()> {
        self.request(|response| OverlayCommand::Dial { address, response })
            .await?
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> OverlayCommand,
    ) -> NetworkResult<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(command(response_tx))
            .map_err(|_| NetworkError::OverlayStopped)?;
        response_rx.await.map_err(|_| NetworkError::OverlayStopped)
    }
}

/// Ack owed to a remote sender once its message reaches the event channel
struct PendingAck {
    protocol: ProtocolId,
    peer: PeerId,
    channel: ResponseChannel<Ack>,
}

/// Event waiting for room in the event channel
struct QueuedEvent {
    event: OverlayEvent,
    ack: Option<PendingAck>,
}

/// The swarm task
pub struct Overlay {
    swarm: Swarm<OverlayBehaviour>,
    commands: mpsc::UnboundedReceiver<OverlayCommand>,
    events: mpsc::Sender<OverlayEvent>,
    backlog: VecDeque<QueuedEvent>,
    backlog_limit: usize,
    peers: PeerManager,
    pending: HashMap<(ProtocolId, OutboundRequestId), oneshot::Sender<NetworkResult<()>>>,
}

impl Overlay {
    /// Build the swarm, start listening, dial the relay and bootstrap peers
    /// and spawn the swarm task. Must be called inside a tokio runtime.
    pub fn start(
        identity: &PeerIdentity,
        config: &NetworkConfig,
    ) -> NetworkResult<(OverlayHandle, mpsc::Receiver<OverlayEvent>)> {
        config.validate().map_err(NetworkError::Config)?;

        let keypair = identity.keypair();
        let local_peer_id = identity.peer_id();

        let (relay_transport, relay_client) = relay::client::new(local_peer_id);
        let transport = build_transport(keypair, relay_transport, config)?;
        let behaviour = OverlayBehaviour::new(keypair, relay_client, config);
        let mut swarm = Swarm::new(
            transport,
            behaviour,
            local_peer_id,
            swarm::Config::with_tokio_executor()
                .with_idle_connection_timeout(config.idle_connection_timeout()),
        );

        for address in &config.listen_addresses {
            swarm.listen_on(address.clone())?;
        }

        if let Some(relay) = &config.relay_address {
            if let Some(relay_peer) = peer_id_of(relay) {
                swarm.add_peer_address(relay_peer, relay.clone());
            }
            let circuit = relay_circuit_address(relay);
            info!("Listening through relay {}", circuit);
            swarm.listen_on(circuit)?;
        }

        for node in &config.bootstrap_nodes {
            if let Err(e) = swarm.dial(node.clone()) {
                warn!("Failed to dial bootstrap node {}: {}", node, e);
            }
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer);

        let overlay = Overlay {
            swarm,
            commands: command_rx,
            events: event_tx,
            backlog: VecDeque::new(),
            backlog_limit: config.event_buffer,
            peers: PeerManager::new(config.max_peers),
            pending: HashMap::new(),
        };
        tokio::spawn(overlay.run());

        info!("Overlay started as {}", local_peer_id);

        Ok((
            OverlayHandle {
                local_peer_id,
                tx: command_tx,
            },
            event_rx,
        ))
    }

    async fn run(mut self) {
        loop {
            let events = self.events.clone();
            tokio::select! {
                // Stop reading the network while the backlog is full
                event = self.swarm.select_next_some(), if self.backlog.len() < self.backlog_limit => {
                    self.handle_swarm_event(event)
                }
                permit = events.reserve(), if !self.backlog.is_empty() => match permit {
                    Ok(permit) => {
                        if let Some(queued) = self.backlog.pop_front() {
                            permit.send(queued.event);
                            self.acknowledge(queued.ack);
                        }
                    }
                    Err(_) => {
                        debug!("Overlay event receiver closed, discarding {} events", self.backlog.len());
                        self.backlog.clear();
                    }
                },
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        info!("All overlay handles dropped, stopping swarm");
                        break;
                    }
                },
            }
        }
    }

    fn emit(&mut self, event: OverlayEvent) {
        self.enqueue(event, None);
    }

    /// Hand `event` to the control loop in order. `ack` is sent once the event
    /// is in the channel.
    fn enqueue(&mut self, event: OverlayEvent, ack: Option<PendingAck>) {
        if !self.backlog.is_empty() {
            self.backlog.push_back(QueuedEvent { event, ack });
            return;
        }

        match self.events.try_send(event) {
            Ok(()) => self.acknowledge(ack),
            Err(TrySendError::Full(event)) => {
                debug!("Overlay event channel full, queueing");
                self.backlog.push_back(QueuedEvent { event, ack });
            }
            Err(TrySendError::Closed(_)) => debug!("Overlay event receiver closed"),
        }
    }

    fn acknowledge(&mut self, ack: Option<PendingAck>) {
        let Some(PendingAck {
            protocol,
            peer,
            channel,
        }) = ack
        else {
            return;
        };
        if self
            .swarm
            .behaviour_mut()
            .protocol_mut(protocol)
            .send_response(channel, Ack)
            .is_err()
        {
            debug!("{} stream from {} closed before ack", protocol, peer);
        }
    }

    fn handle_command(&mut self, command: OverlayCommand) {
        match command {
            OverlayCommand::Send {
                peer,
                message,
                response,
            } => {
                let protocol = message.protocol();
                let request_id = self
                    .swarm
                    .behaviour_mut()
                    .protocol_mut(protocol)
                    .send_request(&peer, message);
                self.pending.insert((protocol, request_id), response);
            }
            OverlayCommand::ConnectedPeers { response } => {
                let _ = response.send(self.peers.connected_peers());
            }
            OverlayCommand::EligiblePeers { response } => {
                let _ = response.send(self.peers.eligible_peers());
            }
            OverlayCommand::ListenAddresses { response } => {
                let _ = response.send(self.swarm.listeners().cloned().collect());
            }
            OverlayCommand::Dial { address, response } => {
                let result = self
                    .swarm
                    .dial(address)
                    .map_err(|e| NetworkError::Connection(e.to_string()));
                let _ = response.send(result);
            }
        }
    }

    fn handle_swarm_event(&mut self, event: SwarmEvent<OverlayBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(
                    "Listening on {}/p2p/{}",
                    address,
                    self.swarm.local_peer_id()
                );
                self.emit(OverlayEvent::NewListenAddress(address));
            }
            SwarmEvent::ConnectionEstablished {
                peer_id,
                endpoint,
                num_established,
                ..
            } => {
                if num_established.get() > 1 {
                    return;
                }
                if !self.peers.can_accept_more_peers() {
                    warn!("Peer limit reached, disconnecting {}", peer_id);
                    let _ = self.swarm.disconnect_peer_id(peer_id);
                    return;
                }
                if self
                    .peers
                    .mark_connected(peer_id, endpoint.get_remote_address().clone())
                {
                    info!("Connected to peer {}", peer_id);
                    self.emit(OverlayEvent::PeerConnected(peer_id));
                }
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                num_established,
                ..
            } => {
                if num_established == 0 && self.peers.mark_disconnected(&peer_id).is_some() {
                    info!("Disconnected from peer {}", peer_id);
                    self.emit(OverlayEvent::PeerDisconnected(peer_id));
                }
            }
            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                warn!("Outgoing connection to {:?} failed: {}", peer_id, error);
            }
            SwarmEvent::Behaviour(event) => self.handle_behaviour_event(event),
            other => debug!("Swarm event: {:?}", other),
        }
    }

    fn handle_behaviour_event(&mut self, event: OverlayBehaviourEvent) {
        match event {
            OverlayBehaviourEvent::Identify(identify::Event::Received { peer_id, info, .. }) => {
                for address in info.listen_addrs {
                    self.swarm.add_peer_address(peer_id, address);
                }
                let protocols = info.protocols.iter().map(|p| p.to_string()).collect();
                if let Some(eligible) = self.peers.set_protocols(&peer_id, protocols) {
                    debug!("Identified {} (eligible: {})", peer_id, eligible);
                    self.emit(OverlayEvent::PeerIdentified {
                        peer: peer_id,
                        eligible,
                    });
                }
            }
            OverlayBehaviourEvent::Identify(other) => debug!("Identify: {:?}", other),
            OverlayBehaviourEvent::RelayClient(
                relay::client::Event::ReservationReqAccepted { relay_peer_id, .. },
            ) => {
                info!("Relay reservation accepted by {}", relay_peer_id);
            }
            OverlayBehaviourEvent::RelayClient(other) => debug!("Relay: {:?}", other),
            OverlayBehaviourEvent::Dcutr(event) => debug!("Hole punching: {:?}", event),
            OverlayBehaviourEvent::Ping(_) => {}
            OverlayBehaviourEvent::Signal(event) => {
                self.handle_protocol_event(ProtocolId::Signal, event)
            }
            OverlayBehaviourEvent::Ledger(event) => {
                self.handle_protocol_event(ProtocolId::Ledger, event)
            }
            OverlayBehaviourEvent::Transaction(event) => {
                self.handle_protocol_event(ProtocolId::Transaction, event)
            }
        }
    }

    fn handle_protocol_event(
        &mut self,
        protocol: ProtocolId,
        event: request_response::Event<WireMessage, Ack>,
    ) {
        match event {
            request_response::Event::Message { peer, message, .. } => match message {
                request_response::Message::Request {
                    request, channel, ..
                } => {
                    debug!("Received {} message from {}", protocol, peer);
                    self.enqueue(
                        OverlayEvent::Inbound {
                            peer,
                            message: request,
                        },
                        Some(PendingAck {
                            protocol,
                            peer,
                            channel,
                        }),
                    );
                }
                request_response::Message::Response { request_id, .. } => {
                    if let Some(response) = self.pending.remove(&(protocol, request_id)) {
                        let _ = response.send(Ok(()));
                    }
                }
            },
            request_response::Event::OutboundFailure {
                peer,
                request_id,
                error,
                ..
            } => {
                let error = match error {
                    OutboundFailure::Timeout => NetworkError::Timeout,
                    OutboundFailure::UnsupportedProtocols => {
                        NetworkError::UnsupportedProtocol(protocol.to_string())
                    }
                    other => NetworkError::Connection(format!("{}: {}", peer, other)),
                };
                if let Some(response) = self.pending.remove(&(protocol, request_id)) {
                    let _ = response.send(Err(error));
                }
            }
            request_response::Event::InboundFailure { peer, error, .. } => {
                warn!("Dropped {} stream from {}: {}", protocol, peer, error);
            }
            request_response::Event::ResponseSent { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SignalPayload;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::time::timeout;

    fn local_config(dir: &std::path::Path) -> NetworkConfig {
        NetworkConfig::new()
            .with_listen_addresses(vec!["/ip4/127.0.0.1/tcp/0".parse().unwrap()])
            .with_keystore_path(dir.join("peer_key"))
            .with_stream_timeout_secs(5)
    }

    async fn next_matching<F>(events: &mut mpsc::Receiver<OverlayEvent>, mut pred: F) -> OverlayEvent
    where
        F: FnMut(&OverlayEvent) -> bool,
    {
        timeout(Duration::from_secs(10), async {
            loop {
                let event = events.recv().await.expect("overlay stopped");
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for overlay event")
    }

    #[tokio::test]
    async fn test_two_overlays_exchange_signal() {
        let dir = tempdir().unwrap();
        let alice_identity = PeerIdentity::generate();
        let bob_identity = PeerIdentity::generate();

        let (alice, mut alice_events) =
            Overlay::start(&alice_identity, &local_config(&dir.path().join("a"))).unwrap();
        let (bob, mut bob_events) =
            Overlay::start(&bob_identity, &local_config(&dir.path().join("b"))).unwrap();

        let alice_addr = match next_matching(&mut alice_events, |e| {
            matches!(e, OverlayEvent::NewListenAddress(_))
        })
        .await
        {
            OverlayEvent::NewListenAddress(addr) => addr,
            _ => unreachable!(),
        };

        bob.dial(alice_addr).await.unwrap();

        next_matching(&mut bob_events, |e| {
            matches!(e, OverlayEvent::PeerIdentified { eligible: true, .. })
        })
        .await;
        assert_eq!(bob.eligible_peers().await.unwrap(), vec![alice.local_peer_id()]);

        let signal = WireMessage::Signal(SignalPayload::new(json!({ "candidate": "c1" })));
        bob.send(alice.local_peer_id(), signal.clone()).await.unwrap();

        match next_matching(&mut alice_events, |e| matches!(e, OverlayEvent::Inbound { .. })).await {
            OverlayEvent::Inbound { peer, message } => {
                assert_eq!(peer, bob.local_peer_id());
                assert_eq!(message, signal);
            }
            _ => unreachable!(),
        }
        assert_eq!(alice.connected_peers().await.unwrap(), vec![bob.local_peer_id()]);
    }

    #[tokio::test]
    async fn test_full_event_channel_holds_messages_and_acks() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let dir = tempdir().unwrap();
        let alice_config = local_config(&dir.path().join("a")).with_event_buffer(4);
        let (alice, mut alice_events) =
            Overlay::start(&PeerIdentity::generate(), &alice_config).unwrap();
        let (bob, mut bob_events) =
            Overlay::start(&PeerIdentity::generate(), &local_config(&dir.path().join("b")))
                .unwrap();

        let alice_addr = match next_matching(&mut alice_events, |e| {
            matches!(e, OverlayEvent::NewListenAddress(_))
        })
        .await
        {
            OverlayEvent::NewListenAddress(addr) => addr,
            _ => unreachable!(),
        };
        bob.dial(alice_addr).await.unwrap();
        next_matching(&mut bob_events, |e| {
            matches!(e, OverlayEvent::PeerIdentified { eligible: true, .. })
        })
        .await;

        // Alice's control loop is not draining while these arrive
        let acked = Arc::new(AtomicUsize::new(0));
        let sends: Vec<_> = (0..6)
            .map(|i| {
                let bob = bob.clone();
                let acked = acked.clone();
                let to = alice.local_peer_id();
                tokio::spawn(async move {
                    let signal = WireMessage::Signal(SignalPayload::new(json!({ "seq": i })));
                    let result = bob.send(to, signal).await;
                    if result.is_ok() {
                        acked.fetch_add(1, Ordering::SeqCst);
                    }
                    result
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(acked.load(Ordering::SeqCst) < 6);

        let mut inbound = 0;
        while inbound < 6 {
            next_matching(&mut alice_events, |e| matches!(e, OverlayEvent::Inbound { .. })).await;
            inbound += 1;
        }

        for send in sends {
            send.await.unwrap().unwrap();
        }
        assert_eq!(acked.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer_fails() {
        let dir = tempdir().unwrap();
        let (handle, _events) =
            Overlay::start(&PeerIdentity::generate(), &local_config(dir.path())).unwrap();

        let signal = WireMessage::Signal(SignalPayload::new(json!({})));
        let result = handle.send(PeerId::random(), signal).await;
        assert!(matches!(result, Err(NetworkError::Connection(_))));
    }
}
