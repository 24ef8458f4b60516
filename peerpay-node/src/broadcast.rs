//! Failure-isolated fan-out to every eligible peer

use peerpay_network::{PeerMessenger, WireMessage};
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

/// Shared outbound messenger
pub type SharedMessenger = Arc<dyn PeerMessenger>;

/// Tally of one fan-out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Send `message` to every eligible peer on a spawned task, one independent
/// send per peer. Failures are logged per peer and never stop the others.
pub fn broadcast(messenger: SharedMessenger, message: WireMessage) -> JoinHandle<BroadcastReport> {
    tokio::spawn(async move {
        let protocol = message.protocol();
        let peers = match messenger.eligible_peers().await {
            Ok(peers) => peers,
            Err(e) => {
                warn!("Could not list peers for {} broadcast: {}", protocol, e);
                return BroadcastReport::default();
            }
        };

        let mut sends = JoinSet::new();
        for peer in peers {
            let messenger = messenger.clone();
            let message = message.clone();
            sends.spawn(async move { (peer, messenger.send(peer, message).await) });
        }

        let mut report = BroadcastReport::default();
        while let Some(joined) = sends.join_next().await {
            report.attempted += 1;
            match joined {
                Ok((peer, Ok(()))) => {
                    report.delivered += 1;
                    debug!("Delivered {} message to {}", protocol, peer);
                }
                Ok((peer, Err(e))) => {
                    report.failed += 1;
                    warn!("Could not negotiate {} stream with {}: {}", protocol, peer, e);
                }
                Err(e) => {
                    report.failed += 1;
                    warn!("{} send task failed: {}", protocol, e);
                }
            }
        }

        debug!(
            "{} broadcast: {}/{} delivered",
            protocol, report.delivered, report.attempted
        );
        report
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use peerpay_network::{NetworkError, NetworkResult, PeerId, SignalPayload};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Delivers to `good`, fails on `bad`, hangs on `slow`
    struct ScriptedMessenger {
        good: PeerId,
        bad: PeerId,
        slow: PeerId,
        delivered: Mutex<Vec<PeerId>>,
    }

    #[async_trait]
    impl PeerMessenger for ScriptedMessenger {
        async fn eligible_peers(&self) -> NetworkResult<Vec<PeerId>> {
            Ok(vec![self.slow, self.bad, self.good])
        }

        async fn send(&self, peer: PeerId, _message: WireMessage) -> NetworkResult<()> {
            if peer == self.bad {
                return Err(NetworkError::UnsupportedProtocol("/peerpay/ledger/1.0.0".into()));
            }
            if peer == self.slow {
                tokio::time::sleep(Duration::from_millis(200)).await;
                return Err(NetworkError::Timeout);
            }
            self.delivered.lock().unwrap().push(peer);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_fan_out() {
        let messenger = Arc::new(ScriptedMessenger {
            good: PeerId::random(),
            bad: PeerId::random(),
            slow: PeerId::random(),
            delivered: Mutex::new(Vec::new()),
        });
        let message = WireMessage::Signal(SignalPayload::new(serde_json::json!({})));

        let report = broadcast(messenger.clone(), message).await.unwrap();

        assert_eq!(
            report,
            BroadcastReport {
                attempted: 3,
                delivered: 1,
                failed: 2
            }
        );
        assert_eq!(*messenger.delivered.lock().unwrap(), vec![messenger.good]);
    }

    #[tokio::test]
    async fn test_no_peers_is_a_no_op() {
        struct Lonely;

        #[async_trait]
        impl PeerMessenger for Lonely {
            async fn eligible_peers(&self) -> NetworkResult<Vec<PeerId>> {
                Ok(Vec::new())
            }

            async fn send(&self, _peer: PeerId, _message: WireMessage) -> NetworkResult<()> {
                panic!("nobody to send to");
            }
        }

        let message = WireMessage::Signal(SignalPayload::new(serde_json::json!({})));
        let report = broadcast(Arc::new(Lonely), message).await.unwrap();
        assert_eq!(report, BroadcastReport::default());
    }
}
