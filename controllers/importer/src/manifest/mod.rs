//! Idempotent agent-manifest application.
//!
//! Applies the rendered agent manifest set to a target cluster reached
//! through a freshly acquired credential. Static objects go through
//! server-side apply guarded by a content-hash cache; the operator
//! Deployment and the FleetAgent resource use a get-then-update path so an
//! unchanged spec never touches the target.

pub mod cache;
pub mod objects;
pub mod values;

pub use cache::ResourceCache;
pub use values::ImportValues;

use crate::error::ControllerError;
use crate::source::TargetCredential;
use crds::FleetAgent;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, ApiResource, DynamicObject, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, ResourceExt};
use objects::{render_fleet_agent, render_operator_deployment, render_static_manifests};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const FIELD_MANAGER: &str = "fleet-importer";

/// Failure to apply one object of the manifest set.
#[derive(Debug, Error)]
#[error("{object}: {source}")]
pub struct ApplyError {
    /// `kind/namespace/name` of the failing object
    pub object: String,
    #[source]
    pub source: kube::Error,
}

/// Aggregate of all per-object failures from one apply pass. Objects that
/// applied cleanly stay applied; the batch never short-circuits.
#[derive(Debug, Default)]
pub struct ApplyErrors {
    errors: Vec<ApplyError>,
}

impl ApplyErrors {
    fn push(&mut self, object: String, source: kube::Error) {
        self.errors.push(ApplyError { object, source });
    }

    pub fn errors(&self) -> &[ApplyError] {
        &self.errors
    }

    fn into_result(self) -> Result<(), ApplyErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ApplyErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to apply {} object(s): ", self.errors.len())?;
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApplyErrors {}

/// Applies the agent manifest set to target clusters.
pub struct ImportApplier {
    cache: Arc<ResourceCache>,
}

impl ImportApplier {
    pub fn new(cache: Arc<ResourceCache>) -> Self {
        Self { cache }
    }

    /// Install or update the agent on the target cluster.
    pub async fn apply(
        &self,
        credential: &TargetCredential,
        values: &ImportValues,
    ) -> Result<(), ControllerError> {
        let client = target_client(credential).await?;

        self.ensure_namespace(&client, &values.agent_namespace)
            .await?;

        let mut failures = ApplyErrors::default();

        for manifest in render_static_manifests(values)? {
            let key = manifest.cache_key(&values.cluster_name);
            if self.cache.hit(&key, &manifest.value) {
                debug!("Skipping unchanged object {}", key);
                continue;
            }
            let resource = ApiResource::from_gvk(&manifest.gvk);
            let api: Api<DynamicObject> = match &manifest.namespace {
                Some(ns) => Api::namespaced_with(client.clone(), ns, &resource),
                None => Api::all_with(client.clone(), &resource),
            };
            let patch = PatchParams::apply(FIELD_MANAGER).force();
            match api
                .patch(&manifest.name, &patch, &Patch::Apply(&manifest.value))
                .await
            {
                Ok(_) => {
                    debug!("Applied {}", key);
                    self.cache.store(&key, &manifest.value);
                }
                Err(e) => failures.push(key, e),
            }
        }

        let deployment = render_operator_deployment(values)?;
        if let Err((object, e)) = apply_deployment(&client, &values.agent_namespace, deployment).await {
            failures.push(object, e);
        }
        if let Err((object, e)) = apply_fleet_agent(&client, values).await {
            failures.push(object, e);
        }

        failures.into_result()?;
        info!(
            "Applied agent manifests for cluster {} to namespace {}",
            values.cluster_name, values.agent_namespace
        );
        Ok(())
    }

    /// Create the agent namespace if it does not exist. Another applier may
    /// win the race; AlreadyExists is success.
    async fn ensure_namespace(&self, client: &Client, name: &str) -> Result<(), ControllerError> {
        let api: Api<Namespace> = Api::all(client.clone());
        if api.get_opt(name).await?.is_some() {
            return Ok(());
        }
        let namespace = Namespace {
            metadata: kube::api::ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        match api.create(&PostParams::default(), &namespace).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Build a client for the target cluster from raw kubeconfig bytes.
async fn target_client(credential: &TargetCredential) -> Result<Client, ControllerError> {
    let yaml = std::str::from_utf8(credential.kubeconfig())
        .map_err(|e| ControllerError::MalformedCredential(format!("kubeconfig is not UTF-8: {e}")))?;
    let kubeconfig = Kubeconfig::from_yaml(yaml)
        .map_err(|e| ControllerError::MalformedCredential(e.to_string()))?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| ControllerError::MalformedCredential(e.to_string()))?;
    Ok(Client::try_from(config)?)
}

/// Get-then-update for the operator Deployment: create on absence, update
/// only when the desired spec differs.
async fn apply_deployment(
    client: &Client,
    namespace: &str,
    desired: Deployment,
) -> Result<(), (String, kube::Error)> {
    let name = desired.name_any();
    let object = format!("Deployment/{namespace}/{name}");
    let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);

    let run = async {
        match api.get_opt(&name).await? {
            None => {
                api.create(&PostParams::default(), &desired).await?;
                info!("Created {}", object);
            }
            Some(mut existing) => {
                if specs_equal(&existing.spec, &desired.spec) {
                    return Ok(());
                }
                existing.spec = desired.spec.clone();
                api.replace(&name, &PostParams::default(), &existing).await?;
                info!("Updated {}", object);
            }
        }
        Ok::<(), kube::Error>(())
    };
    run.await.map_err(|e| (object, e))
}

/// Get-then-update for the cluster-scoped FleetAgent resource.
async fn apply_fleet_agent(
    client: &Client,
    values: &ImportValues,
) -> Result<(), (String, kube::Error)> {
    let desired = render_fleet_agent(values);
    let name = desired.name_any();
    let object = format!("FleetAgent//{name}");
    let api: Api<FleetAgent> = Api::all(client.clone());

    let run = async {
        match api.get_opt(&name).await? {
            None => {
                api.create(&PostParams::default(), &desired).await?;
                info!("Created {}", object);
            }
            Some(mut existing) => {
                if existing.spec == desired.spec {
                    return Ok(());
                }
                existing.spec = desired.spec.clone();
                api.replace(&name, &PostParams::default(), &existing).await?;
                info!("Updated {}", object);
            }
        }
        Ok::<(), kube::Error>(())
    };
    run.await.map_err(|e| (object, e))
}

/// Semantic spec comparison through the serialized form, so defaulted
/// server-side fields do not count as drift.
fn specs_equal<T: serde::Serialize>(current: &T, desired: &T) -> bool {
    serde_json::to_value(current).ok() == serde_json::to_value(desired).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn forbidden() -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "forbidden".to_string(),
            reason: "Forbidden".to_string(),
            code: 403,
        })
    }

    #[test]
    fn apply_errors_aggregate_every_failing_object() {
        let mut failures = ApplyErrors::default();
        failures.push(
            "ServiceAccount/fleet-agent/fleet-agent-operator".to_string(),
            forbidden(),
        );
        failures.push(
            "Secret/fleet-agent/bootstrap-hub-kubeconfig".to_string(),
            forbidden(),
        );

        let err = failures.into_result().unwrap_err();
        assert_eq!(err.errors().len(), 2);
        let message = err.to_string();
        assert!(message.contains("failed to apply 2 object(s)"));
        assert!(message.contains("ServiceAccount/fleet-agent/fleet-agent-operator"));
        assert!(message.contains("Secret/fleet-agent/bootstrap-hub-kubeconfig"));
    }

    #[test]
    fn empty_apply_errors_is_success() {
        assert!(ApplyErrors::default().into_result().is_ok());
    }
}
