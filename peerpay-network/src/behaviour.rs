//! Composite swarm behaviour

use crate::protocol::{ProtocolId, WireCodec};
use crate::NetworkConfig;
use libp2p::{
    dcutr, identify, identity::Keypair, ping, relay,
    request_response::{self, ProtocolSupport},
    swarm::NetworkBehaviour,
};

/// Relay client, hole punching, identify and ping, plus one request-response
/// behaviour per application protocol so each send negotiates exactly one id
#[derive(NetworkBehaviour)]
pub struct OverlayBehaviour {
    pub relay_client: relay::client::Behaviour,
    pub dcutr: dcutr::Behaviour,
    pub identify: identify::Behaviour,
    pub ping: ping::Behaviour,
    pub signal: request_response::Behaviour<WireCodec>,
    pub ledger: request_response::Behaviour<WireCodec>,
    pub transaction: request_response::Behaviour<WireCodec>,
}

impl OverlayBehaviour {
    pub fn new(
        keypair: &Keypair,
        relay_client: relay::client::Behaviour,
        config: &NetworkConfig,
    ) -> Self {
        let local_peer_id = keypair.public().to_peer_id();
        let identify_config =
            identify::Config::new(config.protocol_version.clone(), keypair.public())
                .with_agent_version(format!("peerpay/{}", env!("CARGO_PKG_VERSION")));
        let request_config =
            request_response::Config::default().with_request_timeout(config.stream_timeout());

        Self {
            relay_client,
            dcutr: dcutr::Behaviour::new(local_peer_id),
            identify: identify::Behaviour::new(identify_config),
            ping: ping::Behaviour::new(ping::Config::new()),
            signal: protocol_behaviour(ProtocolId::Signal, request_config.clone()),
            ledger: protocol_behaviour(ProtocolId::Ledger, request_config.clone()),
            transaction: protocol_behaviour(ProtocolId::Transaction, request_config),
        }
    }

    /// The request-response behaviour registered for `protocol`
    pub fn protocol_mut(
        &mut self,
        protocol: ProtocolId,
    ) -> &mut request_response::Behaviour<WireCodec> {
        match protocol {
            ProtocolId::Signal => &mut self.signal,
            ProtocolId::Ledger => &mut self.ledger,
            ProtocolId::Transaction => &mut self.transaction,
        }
    }
}

fn protocol_behaviour(
    protocol: ProtocolId,
    config: request_response::Config,
) -> request_response::Behaviour<WireCodec> {
    request_response::Behaviour::with_codec(
        WireCodec,
        [(protocol.stream_protocol(), ProtocolSupport::Full)],
        config,
    )
}
