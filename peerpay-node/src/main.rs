use anyhow::Context;
use clap::Parser;
use peerpay_db::FileLedgerStore;
use peerpay_network::{Overlay, PeerIdentity};
use peerpay_node::logging::init_logging;
use peerpay_node::ui::spawn_stdio_bridge;
use peerpay_node::{Cli, Node, NodeConfig, NodeContext, UiSink};
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_default_config {
        print!("{}", toml::to_string_pretty(&NodeConfig::default())?);
        return Ok(());
    }

    let config = NodeConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let config = cli.apply(config);
    config.validate().map_err(anyhow::Error::msg)?;

    init_logging(&config.logging)?;

    let identity = PeerIdentity::load_or_generate(&config.network.keystore_path)
        .context("Failed to load or create the peer identity")?;

    let store = FileLedgerStore::open(
        config.storage.ledger_path(),
        config.mining.difficulty,
        config.mining.reward,
    )
    .context("Failed to open the ledger store")?;

    let (overlay, overlay_events) =
        Overlay::start(&identity, &config.network).context("Failed to start the overlay")?;

    let (ui, ui_events) = UiSink::new();
    let (command_tx, command_rx) = mpsc::channel(64);
    spawn_stdio_bridge(ui_events, command_tx);

    let ctx = NodeContext::new(identity, Arc::new(store), Arc::new(overlay), ui);
    Node::new(ctx).run(overlay_events, command_rx).await?;

    Ok(())
}
