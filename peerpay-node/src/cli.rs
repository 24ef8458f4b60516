//! Command line interface

use crate::NodeConfig;
use clap::Parser;
use peerpay_network::Multiaddr;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "peerpay", version, about = "Peer-to-peer payments node")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, short, env = "PEERPAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for the ledger file and the peer identity
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Listen multiaddr (repeatable)
    #[arg(long = "listen")]
    pub listen: Vec<Multiaddr>,

    /// Rendezvous relay multiaddr, ending in /p2p/<peer id>
    #[arg(long)]
    pub relay: Option<Multiaddr>,

    /// Bootstrap peer multiaddr (repeatable)
    #[arg(long = "bootstrap")]
    pub bootstrap: Vec<Multiaddr>,

    /// Log filter, e.g. "info" or "peerpay_network=debug"
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    pub print_default_config: bool,
}

impl Cli {
    /// Apply flags on top of the loaded configuration
    pub fn apply(&self, mut config: NodeConfig) -> NodeConfig {
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir.clone());
        }
        if !self.listen.is_empty() {
            config.network.listen_addresses = self.listen.clone();
        }
        if let Some(relay) = &self.relay {
            config.network.relay_address = Some(relay.clone());
        }
        if !self.bootstrap.is_empty() {
            config.network.bootstrap_nodes = self.bootstrap.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.json = true;
        }
        config
    }
}
