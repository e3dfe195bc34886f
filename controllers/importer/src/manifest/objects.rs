//! Rendered agent manifests.
//!
//! The fixed, ordered set of objects installed on a target cluster, plus
//! the two objects managed through the get-then-update path (the operator
//! Deployment and the FleetAgent custom resource).

use crate::manifest::values::ImportValues;
use crds::{FleetAgent, FleetAgentSpec};
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::GroupVersionKind;
use kube::CustomResourceExt;
use serde_json::{json, Value};

const OPERATOR_NAME: &str = "fleet-agent-operator";
const BOOTSTRAP_SECRET_NAME: &str = "bootstrap-hub-kubeconfig";

/// One object to be applied to the target, with enough addressing to pick
/// the right dynamic API and cache slot.
#[derive(Debug, Clone)]
pub struct RenderedManifest {
    pub gvk: GroupVersionKind,
    pub namespace: Option<String>,
    pub name: String,
    pub value: Value,
}

impl RenderedManifest {
    fn new(value: Value) -> Self {
        let api_version = value["apiVersion"].as_str().unwrap_or_default();
        let (group, version) = match api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", api_version),
        };
        Self {
            gvk: GroupVersionKind::gvk(
                group,
                version,
                value["kind"].as_str().unwrap_or_default(),
            ),
            namespace: value["metadata"]["namespace"].as_str().map(String::from),
            name: value["metadata"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            value,
        }
    }

    /// Identity key used by the change-detection cache. Scoped by the
    /// target cluster: the same rendered object applied to two clusters
    /// must occupy two cache slots, or the second cluster's applies would
    /// be skipped as stale hits.
    pub fn cache_key(&self, cluster: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            cluster,
            self.gvk.kind,
            self.namespace.as_deref().unwrap_or(""),
            self.name
        )
    }
}

/// The ordered manifest set applied before the operator Deployment and the
/// FleetAgent resource. Order matters: the CRD and namespace must exist
/// before anything that lives in them.
pub fn render_static_manifests(values: &ImportValues) -> Result<Vec<RenderedManifest>, serde_json::Error> {
    Ok(vec![
        RenderedManifest::new(serde_json::to_value(FleetAgent::crd())?),
        RenderedManifest::new(render_namespace(values)),
        RenderedManifest::new(render_service_account(values)),
        RenderedManifest::new(render_cluster_role()),
        RenderedManifest::new(render_cluster_role_binding(values)),
        RenderedManifest::new(render_bootstrap_secret(values)),
    ])
}

fn render_namespace(values: &ImportValues) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": { "name": values.agent_namespace }
    })
}

fn render_service_account(values: &ImportValues) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "ServiceAccount",
        "metadata": {
            "name": OPERATOR_NAME,
            "namespace": values.agent_namespace
        }
    })
}

fn render_cluster_role() -> Value {
    json!({
        "apiVersion": "rbac.authorization.k8s.io/v1",
        "kind": "ClusterRole",
        "metadata": { "name": OPERATOR_NAME },
        "rules": [
            {
                "apiGroups": ["*"],
                "resources": ["*"],
                "verbs": ["*"]
            },
            {
                "nonResourceURLs": ["*"],
                "verbs": ["*"]
            }
        ]
    })
}

fn render_cluster_role_binding(values: &ImportValues) -> Value {
    json!({
        "apiVersion": "rbac.authorization.k8s.io/v1",
        "kind": "ClusterRoleBinding",
        "metadata": { "name": OPERATOR_NAME },
        "roleRef": {
            "apiGroup": "rbac.authorization.k8s.io",
            "kind": "ClusterRole",
            "name": OPERATOR_NAME
        },
        "subjects": [{
            "kind": "ServiceAccount",
            "name": OPERATOR_NAME,
            "namespace": values.agent_namespace
        }]
    })
}

fn render_bootstrap_secret(values: &ImportValues) -> Value {
    // bootstrap_kubeconfig is already base64-armored, exactly what the
    // Secret wire format carries under data
    json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": {
            "name": BOOTSTRAP_SECRET_NAME,
            "namespace": values.agent_namespace
        },
        "type": "Opaque",
        "data": { "kubeconfig": values.bootstrap_kubeconfig }
    })
}

/// The agent operator Deployment, managed through get-then-update.
pub fn render_operator_deployment(values: &ImportValues) -> Result<Deployment, serde_json::Error> {
    serde_json::from_value(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": OPERATOR_NAME,
            "namespace": values.agent_namespace,
            "labels": { "app": OPERATOR_NAME }
        },
        "spec": {
            "replicas": 1,
            "selector": { "matchLabels": { "app": OPERATOR_NAME } },
            "template": {
                "metadata": { "labels": { "app": OPERATOR_NAME } },
                "spec": {
                    "serviceAccountName": OPERATOR_NAME,
                    "containers": [{
                        "name": OPERATOR_NAME,
                        "image": values.operator_image(),
                        "args": ["/fleet", "agent-operator"],
                        "securityContext": {
                            "allowPrivilegeEscalation": false,
                            "readOnlyRootFilesystem": true,
                            "runAsNonRoot": true
                        }
                    }]
                }
            }
        }
    }))
}

/// The cluster-scoped FleetAgent resource, managed through get-then-update.
pub fn render_fleet_agent(values: &ImportValues) -> FleetAgent {
    FleetAgent::new(
        &values.agent_name,
        FleetAgentSpec {
            cluster_name: values.cluster_name.clone(),
            namespace: values.agent_namespace.clone(),
            registration_image: values.registration_image(),
            work_image: values.work_image(),
            registration_feature_gates: values.registration_feature_gates.clone(),
            work_feature_gates: values.work_feature_gates.clone(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImporterConfig;
    use std::time::Duration;

    fn test_config() -> ImporterConfig {
        ImporterConfig {
            hub_api_server: "https://hub.example.com:6443".to_string(),
            hub_ca: None,
            bootstrap_sa_namespace: "fleet-system".to_string(),
            bootstrap_sa_name: "bootstrap-sa".to_string(),
            inventory_url: "https://inventory.example.com".to_string(),
            inventory_token: "token".to_string(),
            agent_namespace: "fleet-agent".to_string(),
            agent_name: "fleet-agent".to_string(),
            registry: "ghcr.io/microscaler/fleet".to_string(),
            bundle_version: "v0.3.0".to_string(),
            poll_interval: Duration::from_secs(600),
            workers: 2,
        }
    }

    #[test]
    fn static_manifests_are_ordered_crd_and_namespace_first() {
        let values = ImportValues::new(&test_config(), "prod-east", b"kubeconfig");
        let manifests = render_static_manifests(&values).unwrap();

        let kinds: Vec<&str> = manifests.iter().map(|m| m.gvk.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                "CustomResourceDefinition",
                "Namespace",
                "ServiceAccount",
                "ClusterRole",
                "ClusterRoleBinding",
                "Secret"
            ]
        );
    }

    #[test]
    fn bootstrap_secret_carries_armored_kubeconfig() {
        let values = ImportValues::new(&test_config(), "prod-east", b"apiVersion: v1");
        let manifests = render_static_manifests(&values).unwrap();

        let secret = manifests.iter().find(|m| m.gvk.kind == "Secret").unwrap();
        assert_eq!(secret.namespace.as_deref(), Some("fleet-agent"));
        assert_eq!(
            secret.value["data"]["kubeconfig"],
            values.bootstrap_kubeconfig
        );
    }

    #[test]
    fn cache_keys_are_unique_within_the_set() {
        let values = ImportValues::new(&test_config(), "prod-east", b"kubeconfig");
        let manifests = render_static_manifests(&values).unwrap();

        let mut keys: Vec<String> = manifests
            .iter()
            .map(|m| m.cache_key(&values.cluster_name))
            .collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), manifests.len());
    }

    #[test]
    fn cache_keys_isolate_target_clusters() {
        use crate::manifest::cache::ResourceCache;

        // The static objects render byte-identically for every target, so
        // one cluster's applies must never satisfy another's cache lookups.
        let cache = ResourceCache::new();
        let first = ImportValues::new(&test_config(), "cluster-a", b"kubeconfig");
        let second = ImportValues::new(&test_config(), "cluster-b", b"kubeconfig");

        for manifest in render_static_manifests(&first).unwrap() {
            cache.store(&manifest.cache_key(&first.cluster_name), &manifest.value);
        }

        let skipped: Vec<String> = render_static_manifests(&second)
            .unwrap()
            .iter()
            .filter(|m| cache.hit(&m.cache_key(&second.cluster_name), &m.value))
            .map(|m| m.cache_key(&second.cluster_name))
            .collect();
        assert!(
            skipped.is_empty(),
            "objects skipped on the second cluster: {skipped:?}"
        );

        // Re-applying to the first cluster still hits
        for manifest in render_static_manifests(&first).unwrap() {
            assert!(cache.hit(&manifest.cache_key(&first.cluster_name), &manifest.value));
        }
    }

    #[test]
    fn deployment_uses_versioned_operator_image() {
        let values = ImportValues::new(&test_config(), "prod-east", b"kubeconfig");
        let deployment = render_operator_deployment(&values).unwrap();

        let image = deployment.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0]
            .image
            .clone();
        assert_eq!(
            image.as_deref(),
            Some("ghcr.io/microscaler/fleet/fleet-agent-operator:v0.3.0")
        );
    }

    #[test]
    fn fleet_agent_spec_points_at_the_cluster() {
        let values = ImportValues::new(&test_config(), "prod-east", b"kubeconfig");
        let agent = render_fleet_agent(&values);

        assert_eq!(agent.spec.cluster_name, "prod-east");
        assert_eq!(agent.spec.namespace, "fleet-agent");
        assert_eq!(
            agent.spec.registration_image,
            "ghcr.io/microscaler/fleet/fleet-registration:v0.3.0"
        );
    }
}
