//! `bluealsa-daemon`: the binary that ties the core engine to a running
//! system — loads configuration, wires a `BlueZBackend`, and drives the
//! transport manager until asked to stop.

mod backend;

use std::sync::Arc;

use anyhow::{Context, Result};
use bluealsa_config::Config;
use bluealsa_core::TransportManager;
use tracing::info;

use backend::DbusBackend;

#[tokio::main]
async fn main() -> Result<()> {
    // ========== Phase 1: logging ==========
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // ========== Phase 2: configuration ==========
    let config = Config::load_or_default(None).context("loading configuration")?;
    info!(socket = %config.control_socket.display(), "configuration loaded");
    info!(
        a2dp_source = config.profiles.a2dp_source,
        a2dp_sink = config.profiles.a2dp_sink,
        hfp_ag = config.profiles.hfp_ag,
        hsp_ag = config.profiles.hsp_ag,
        "advertised profiles"
    );

    // ========== Phase 3: backend + transport manager ==========
    // `backend` is the handle a device-discovery layer would pass to
    // `manager.spawn` per connecting device; wiring that discovery (BlueZ
    // `InterfacesAdded`, SDP, RFCOMM AT) is out of scope here, so the
    // manager never actually gets a transport to spawn in this build.
    let _backend: Arc<dyn bluealsa_core::transport::BlueZBackend> = Arc::new(DbusBackend::new());
    let manager = Arc::new(TransportManager::new());

    info!("bluealsa-daemon ready, waiting for shutdown signal");

    // ========== Phase 4: run until shutdown ==========
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutdown signal received, releasing managed transports");

    manager.release_all().await;

    info!("bluealsa-daemon stopped");
    Ok(())
}
