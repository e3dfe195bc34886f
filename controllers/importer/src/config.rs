//! Importer configuration.
//!
//! All configuration is read from environment variables, mirroring the
//! flags of the deployment manifests. Required variables produce an
//! `InvalidConfig` error at startup.

use crate::error::ControllerError;
use std::env;
use std::time::Duration;

const DEFAULT_AGENT_NAMESPACE: &str = "fleet-agent";
const DEFAULT_AGENT_NAME: &str = "fleet-agent";
const DEFAULT_REGISTRY: &str = "ghcr.io/microscaler/fleet";
const DEFAULT_BUNDLE_VERSION: &str = "latest";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 600;
const DEFAULT_WORKERS: usize = 2;

/// Runtime configuration for the importer controller.
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    /// External URL of the hub API server, embedded in bootstrap kubeconfigs
    pub hub_api_server: String,
    /// Hub CA bundle (PEM); when absent the issuer falls back to the
    /// cluster-info lookup
    pub hub_ca: Option<Vec<u8>>,
    /// Namespace of the bootstrap service account
    pub bootstrap_sa_namespace: String,
    /// Name of the bootstrap service account
    pub bootstrap_sa_name: String,
    /// Base URL of the external cluster inventory API
    pub inventory_url: String,
    /// Access token for the inventory API
    pub inventory_token: String,
    /// Namespace the agent is installed into on target clusters
    pub agent_namespace: String,
    /// Name of the agent custom resource
    pub agent_name: String,
    /// Image registry for agent components
    pub registry: String,
    /// Image version for agent components
    pub bundle_version: String,
    /// Inventory poll interval
    pub poll_interval: Duration,
    /// Reconcile worker count
    pub workers: usize,
}

impl ImporterConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        let hub_api_server = require("HUB_API_SERVER")?;
        let hub_ca = match env::var("HUB_CA_FILE") {
            Ok(path) => Some(std::fs::read(&path).map_err(|e| {
                ControllerError::InvalidConfig(format!("failed to read HUB_CA_FILE {path}: {e}"))
            })?),
            Err(_) => None,
        };
        let (bootstrap_sa_namespace, bootstrap_sa_name) = parse_sa_ref(&require("BOOTSTRAP_SA")?)?;
        let inventory_url = require("INVENTORY_API_URL")?;
        let inventory_token = require("INVENTORY_TOKEN")?;

        let poll_interval_secs = match env::var("POLL_INTERVAL_SECS") {
            Ok(v) => v.parse::<u64>().map_err(|_| {
                ControllerError::InvalidConfig(format!("POLL_INTERVAL_SECS is not a number: {v}"))
            })?,
            Err(_) => DEFAULT_POLL_INTERVAL_SECS,
        };
        let workers = match env::var("WORKERS") {
            Ok(v) => v.parse::<usize>().map_err(|_| {
                ControllerError::InvalidConfig(format!("WORKERS is not a number: {v}"))
            })?,
            Err(_) => DEFAULT_WORKERS,
        };

        Ok(Self {
            hub_api_server,
            hub_ca,
            bootstrap_sa_namespace,
            bootstrap_sa_name,
            inventory_url,
            inventory_token,
            agent_namespace: env::var("AGENT_NAMESPACE")
                .unwrap_or_else(|_| DEFAULT_AGENT_NAMESPACE.to_string()),
            agent_name: env::var("AGENT_NAME").unwrap_or_else(|_| DEFAULT_AGENT_NAME.to_string()),
            registry: env::var("AGENT_IMAGE_REGISTRY")
                .unwrap_or_else(|_| DEFAULT_REGISTRY.to_string()),
            bundle_version: env::var("AGENT_BUNDLE_VERSION")
                .unwrap_or_else(|_| DEFAULT_BUNDLE_VERSION.to_string()),
            poll_interval: Duration::from_secs(poll_interval_secs),
            workers,
        })
    }
}

fn require(name: &str) -> Result<String, ControllerError> {
    env::var(name).map_err(|_| {
        ControllerError::InvalidConfig(format!("{name} environment variable is required"))
    })
}

/// Parse a `namespace/name` service account reference.
fn parse_sa_ref(value: &str) -> Result<(String, String), ControllerError> {
    match value.split_once('/') {
        Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
            Ok((namespace.to_string(), name.to_string()))
        }
        _ => Err(ControllerError::InvalidConfig(format!(
            "BOOTSTRAP_SA must be formatted as namespace/name, got {value}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sa_ref_accepts_namespace_name() {
        let (ns, name) = parse_sa_ref("fleet-system/bootstrap-sa").unwrap();
        assert_eq!(ns, "fleet-system");
        assert_eq!(name, "bootstrap-sa");
    }

    #[test]
    fn parse_sa_ref_rejects_bare_name() {
        assert!(parse_sa_ref("bootstrap-sa").is_err());
        assert!(parse_sa_ref("/bootstrap-sa").is_err());
        assert!(parse_sa_ref("fleet-system/").is_err());
    }
}
