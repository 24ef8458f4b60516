//! peerpay node
//!
//! Wires the overlay, the ledger store and the mining coordinator into one
//! control loop, and bridges it to a local UI over JSON lines.

pub mod broadcast;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod node;
pub mod router;
pub mod ui;

pub use broadcast::{broadcast, BroadcastReport, SharedMessenger};
pub use cli::Cli;
pub use config::NodeConfig;
pub use context::NodeContext;
pub use error::{NodeError, NodeResult};
pub use node::Node;
pub use ui::{UiCommand, UiEvent, UiSink};
