//! Fleet Importer Controller
//!
//! Imports externally discovered clusters into the hub:
//! - Sources (dynamic API watch, inventory polling) discover candidate clusters
//! - The reconciler obtains credentials and installs the fleet agent on each target
//! - The outcome is recorded as an `Imported` condition on the hub-side
//!   `ManagedClusterIntent` resource

mod backoff;
mod bootstrap;
mod config;
mod controller;
mod error;
mod kubeconfig;
mod manifest;
mod queue;
mod reconciler;
mod source;

use crate::config::ImporterConfig;
use crate::controller::Controller;
use crate::error::ControllerError;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    info!("Starting Fleet Importer Controller");

    // Load configuration from environment variables
    let config = ImporterConfig::from_env()?;

    info!("Configuration:");
    info!("  Hub API server: {}", config.hub_api_server);
    info!(
        "  Bootstrap SA: {}/{}",
        config.bootstrap_sa_namespace, config.bootstrap_sa_name
    );
    info!("  Inventory URL: {}", config.inventory_url);
    info!("  Agent namespace: {}", config.agent_namespace);
    info!("  Workers: {}", config.workers);

    // Initialize and run controller
    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
