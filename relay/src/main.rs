use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use broker_bridge::BrokerBridge;
use relay_hub::{initial_store, HubHandle, RelayHub};
use relay_server::RelayServer;
use tracing::{error, info, warn};

mod config;
mod logging;

use config::Config;

/// How long to wait for the hub to drain after the producers stop
const HUB_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Wire the store, hub, broker bridge and server together and run until
/// interrupted
async fn run(config: Config) -> Result<()> {
    let store = initial_store();
    let (hub_handle, inbox) = HubHandle::channel(config.hub.queue_capacity, store.reader());

    // The bridge feeds the hub through its handle; the hub publishes through
    // the bridge's handle. Both exist before either task starts.
    let bridge = BrokerBridge::spawn(config.broker.clone(), hub_handle.clone())
        .context("Failed to start broker bridge")?;

    let hub = RelayHub::new(
        store,
        config.topics.clone(),
        Arc::new(bridge.publisher()),
        &config.hub,
    );
    let hub_task = hub.spawn(inbox);

    let server = RelayServer::start(config.server.clone(), hub_handle)
        .await
        .context("Failed to start relay server")?;
    info!("Relay ready at {} (WebSocket at /ws)", server.base_url());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    if let Err(e) = server.shutdown().await {
        warn!("Relay server did not stop cleanly: {}", e);
    }
    if let Err(e) = bridge.shutdown().await {
        warn!("Broker bridge did not stop cleanly: {}", e);
    }

    // Open WebSocket sessions still hold hub handles
    let abort = hub_task.abort_handle();
    if tokio::time::timeout(HUB_DRAIN_TIMEOUT, hub_task).await.is_err() {
        info!("Closing remaining client sessions");
        abort.abort();
    }

    info!("Relay stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from command line and environment
    let config = Config::load().context("Failed to load configuration")?;

    logging::init_logging(config.log_format, &config.log_level)
        .context("Failed to initialize logging")?;

    config.print_summary();

    if let Err(e) = run(config).await {
        error!("Relay failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
