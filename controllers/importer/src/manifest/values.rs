//! Import template values.
//!
//! Everything the rendered agent manifests vary on, assembled once per
//! sync from the controller configuration plus the per-cluster bootstrap
//! credential.

use crate::config::ImporterConfig;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Values substituted into the agent manifest set.
#[derive(Debug, Clone)]
pub struct ImportValues {
    /// Name the cluster registers under on the hub
    pub cluster_name: String,
    /// Namespace the agent is installed into
    pub agent_namespace: String,
    /// Name of the FleetAgent custom resource
    pub agent_name: String,
    /// Base64-armored bootstrap kubeconfig for the hub
    pub bootstrap_kubeconfig: String,
    /// Image registry for agent components
    pub registry: String,
    /// Operator image version
    pub operator_version: String,
    /// Registration agent image version
    pub registration_version: String,
    /// Work agent image version
    pub work_version: String,
    /// Feature gates for the registration agent
    pub registration_feature_gates: Vec<String>,
    /// Feature gates for the work agent
    pub work_feature_gates: Vec<String>,
}

impl ImportValues {
    pub fn new(config: &ImporterConfig, cluster_name: &str, bootstrap_kubeconfig: &[u8]) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            agent_namespace: config.agent_namespace.clone(),
            agent_name: config.agent_name.clone(),
            bootstrap_kubeconfig: BASE64.encode(bootstrap_kubeconfig),
            registry: config.registry.clone(),
            operator_version: config.bundle_version.clone(),
            registration_version: config.bundle_version.clone(),
            work_version: config.bundle_version.clone(),
            registration_feature_gates: Vec::new(),
            work_feature_gates: Vec::new(),
        }
    }

    pub fn operator_image(&self) -> String {
        format!("{}/fleet-agent-operator:{}", self.registry, self.operator_version)
    }

    pub fn registration_image(&self) -> String {
        format!("{}/fleet-registration:{}", self.registry, self.registration_version)
    }

    pub fn work_image(&self) -> String {
        format!("{}/fleet-work:{}", self.registry, self.work_version)
    }
}
