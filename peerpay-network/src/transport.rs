//! Network transport layer configuration

use crate::{NetworkConfig, NetworkError, NetworkResult};
use libp2p::{
    core::{muxing::StreamMuxerBox, transport::Boxed, upgrade::Version, Transport},
    dns,
    identity::Keypair,
    noise::Config as NoiseConfig,
    relay,
    tcp::{self, Config as TcpConfig},
    yamux::Config as YamuxConfig,
    PeerId,
};

/// Build the libp2p transport stack: relayed circuits or direct TCP (with
/// DNS), both secured with noise and multiplexed with yamux
pub fn build_transport(
    keypair: &Keypair,
    relay_transport: relay::client::Transport,
    config: &NetworkConfig,
) -> NetworkResult<Boxed<(PeerId, StreamMuxerBox)>> {
    // TCP transport with custom configuration
    let tcp_config = TcpConfig::new().nodelay(true);

    let tcp_transport = tcp::tokio::Transport::new(tcp_config);
    // DNS resolution for domain names in multiaddrs
    let dns_transport = dns::tokio::Transport::system(tcp_transport)
        .map_err(|e| NetworkError::Config(format!("DNS transport error: {}", e)))?;
    // Noise encryption for secure communication
    let noise_config = NoiseConfig::new(keypair)
        .map_err(|e| NetworkError::Config(format!("Noise config error: {}", e)))?;

    // Yamux multiplexing for multiple streams over single connection
    let yamux_config = YamuxConfig::default();

    // Circuit addresses go to the relay client, everything else to TCP
    let transport = relay_transport
        .or_transport(dns_transport)
        .upgrade(Version::V1Lazy)
        .authenticate(noise_config)
        .multiplex(yamux_config)
        .timeout(config.connection_timeout())
        .boxed();

    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_transport() {
        let keypair = Keypair::generate_ed25519();
        let (relay_transport, _behaviour) = relay::client::new(keypair.public().to_peer_id());
        let config = NetworkConfig::default();

        let result = build_transport(&keypair, relay_transport, &config);
        assert!(result.is_ok());
    }
}
