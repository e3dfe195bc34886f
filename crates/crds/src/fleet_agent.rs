//! FleetAgent CRD
//!
//! Target-side custom resource that drives the agent operator installed on
//! an imported cluster. The importer registers this CRD on the target and
//! then applies a single cluster-scoped FleetAgent instance.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "fleet.microscaler.io",
    version = "v1alpha1",
    kind = "FleetAgent"
)]
#[serde(rename_all = "camelCase")]
pub struct FleetAgentSpec {
    /// Name this cluster registers under on the hub
    pub cluster_name: String,

    /// Namespace the agent components run in
    pub namespace: String,

    /// Registration agent image
    pub registration_image: String,

    /// Work agent image
    pub work_image: String,

    /// Feature gates passed to the registration agent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registration_feature_gates: Vec<String>,

    /// Feature gates passed to the work agent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub work_feature_gates: Vec<String>,
}
