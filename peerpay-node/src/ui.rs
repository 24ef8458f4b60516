//! Local UI channel
//!
//! Events and commands are JSON objects tagged by `type`, one per line:
//! events are written to stdout and commands are read from stdin.

use peerpay_core::{Amount, Balance};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Notification texts shown to the user
pub mod notifications {
    pub const NOTHING_TO_MINE: &str = "No transactions to mine";
    pub const ALREADY_MINING: &str = "Mining already in progress";
    pub const MINING_STARTED: &str = "Mining in progress";
    pub const BLOCK_MINED: &str = "Block has been successfully mined!";
    pub const MINING_STOPPED: &str = "Mining stopped";
}

/// Events pushed to the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum UiEvent {
    #[serde(rename = "peer:connect")]
    PeerConnect { id: String },
    #[serde(rename = "peer:disconnect")]
    PeerDisconnect { id: String },
    /// Current broadcast targets
    #[serde(rename = "peers")]
    Peers { peers: Vec<String> },
    /// Local wallet balance
    #[serde(rename = "wallet")]
    Wallet { balance: Balance },
    #[serde(rename = "notification")]
    Notification { message: String },
    /// Signal relayed from peer `id`
    #[serde(rename = "rtc")]
    Rtc { id: String, signal: serde_json::Value },
}

/// Commands issued by the UI
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UiCommand {
    Transaction { receiver: String, amount: Amount },
    Mine,
    /// Relay `signal` to peer `id`
    Rtc { id: String, signal: serde_json::Value },
    Peers,
}

impl UiCommand {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Sending side of the UI event stream
#[derive(Debug, Clone)]
pub struct UiSink {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl UiSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            debug!("UI event dropped: no UI attached");
        }
    }

    pub fn notify(&self, message: impl Into<String>) {
        self.emit(UiEvent::Notification {
            message: message.into(),
        });
    }
}

/// Write each event as one JSON line until the event stream ends
pub async fn write_events<W>(mut writer: W, mut events: mpsc::UnboundedReceiver<UiEvent>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = events.recv().await {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!("Could not encode UI event {:?}: {}", event, e);
                continue;
            }
        };
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Forward each well-formed command line until input ends or the node stops
/// listening. Malformed lines are logged and skipped.
pub async fn read_commands<R>(reader: R, commands: mpsc::Sender<UiCommand>) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match UiCommand::parse(line) {
            Ok(command) => {
                if commands.send(command).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("Ignoring malformed UI command: {}", e),
        }
    }
    Ok(())
}

/// Attach the UI channel to this process's stdin and stdout
pub fn spawn_stdio_bridge(
    events: mpsc::UnboundedReceiver<UiEvent>,
    commands: mpsc::Sender<UiCommand>,
) -> (JoinHandle<()>, JoinHandle<()>) {
    let writer = tokio::spawn(async move {
        if let Err(e) = write_events(tokio::io::stdout(), events).await {
            warn!("UI output closed: {}", e);
        }
    });
    let reader = tokio::spawn(async move {
        if let Err(e) = read_commands(BufReader::new(tokio::io::stdin()), commands).await {
            warn!("UI input closed: {}", e);
        }
    });
    (writer, reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_json(event: &UiEvent) -> Value {
        serde_json::from_str(&serde_json::to_string(event).unwrap()).unwrap()
    }

    #[test]
    fn test_event_encoding() {
        assert_eq!(
            to_json(&UiEvent::PeerConnect { id: "QmA".to_string() }),
            json!({ "type": "peer:connect", "id": "QmA" })
        );
        assert_eq!(
            to_json(&UiEvent::Wallet { balance: -30 }),
            json!({ "type": "wallet", "balance": -30 })
        );
        assert_eq!(
            to_json(&UiEvent::Rtc {
                id: "QmB".to_string(),
                signal: json!({ "sdp": "v=0" })
            }),
            json!({ "type": "rtc", "id": "QmB", "signal": { "sdp": "v=0" } })
        );
    }

    #[test]
    fn test_command_decoding() {
        assert_eq!(
            UiCommand::parse(r#"{"type":"transaction","receiver":"QmB","amount":30}"#).unwrap(),
            UiCommand::Transaction {
                receiver: "QmB".to_string(),
                amount: 30
            }
        );
        assert_eq!(UiCommand::parse(r#"{"type":"mine"}"#).unwrap(), UiCommand::Mine);
        assert_eq!(UiCommand::parse(r#"{"type":"peers"}"#).unwrap(), UiCommand::Peers);
        assert!(UiCommand::parse(r#"{"type":"transaction","receiver":"QmB","amount":-1}"#).is_err());
        assert!(UiCommand::parse(r#"{"type":"reboot"}"#).is_err());
    }

    #[tokio::test]
    async fn test_read_commands_skips_garbage() {
        let input = b"{\"type\":\"mine\"}\nnot json\n\n{\"type\":\"peers\"}\n";
        let (tx, mut rx) = mpsc::channel(8);

        read_commands(&input[..], tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(UiCommand::Mine));
        assert_eq!(rx.recv().await, Some(UiCommand::Peers));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_write_events_as_lines() {
        let (sink, events) = UiSink::new();
        sink.notify(notifications::MINING_STARTED);
        sink.emit(UiEvent::Peers { peers: vec![] });
        drop(sink);

        let mut output = Vec::new();
        write_events(&mut output, events).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![
                json!({ "type": "notification", "message": "Mining in progress" }),
                json!({ "type": "peers", "peers": [] }),
            ]
        );
    }
}
