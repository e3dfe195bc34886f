//! Bootstrap credential issuer.
//!
//! Mints a fresh hub-scoped bootstrap kubeconfig per reconciliation: a
//! ServiceAccount token obtained through the TokenRequest subresource,
//! packaged together with the hub API endpoint and CA material. Nothing is
//! cached across syncs.

use crate::error::ControllerError;
use crate::kubeconfig::{self, ContextNames, KubeConfig};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use k8s_openapi::api::authentication::v1::{TokenRequest, TokenRequestSpec};
use k8s_openapi::api::core::v1::{ConfigMap, ServiceAccount};
use kube::api::PostParams;
use kube::{Api, Client};
use tracing::debug;

/// Token lifetime requested for bootstrap credentials (one year).
const TOKEN_EXPIRATION_SECONDS: i64 = 8640 * 3600;

const BOOTSTRAP_NAMES: ContextNames<'_> = ContextNames {
    cluster: "hub",
    user: "bootstrap",
    context: "bootstrap",
};

/// Static configuration for bootstrap credential issuance.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// External URL of the hub API server
    pub hub_api_server: String,
    /// Hub CA bundle (PEM); when None, falls back to the cluster-info lookup
    pub ca: Option<Vec<u8>>,
    /// Namespace of the bootstrap service account
    pub sa_namespace: String,
    /// Name of the bootstrap service account
    pub sa_name: String,
}

/// Issues bootstrap kubeconfigs against the hub.
pub struct TokenBootstrapper {
    config: BootstrapConfig,
    client: Client,
}

impl TokenBootstrapper {
    pub fn new(config: BootstrapConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// Build the bootstrap kubeconfig as YAML bytes.
    pub async fn kubeconfig_raw(&self) -> Result<Vec<u8>, ControllerError> {
        let config = self.kubeconfig().await?;
        let yaml = serde_yaml::to_string(&config)?;
        Ok(yaml.into_bytes())
    }

    /// Build the bootstrap kubeconfig: fresh SA token + hub endpoint + CA.
    pub async fn kubeconfig(&self) -> Result<KubeConfig, ControllerError> {
        let sa_api: Api<ServiceAccount> =
            Api::namespaced(self.client.clone(), &self.config.sa_namespace);

        let request = TokenRequest {
            spec: TokenRequestSpec {
                expiration_seconds: Some(TOKEN_EXPIRATION_SECONDS),
                ..Default::default()
            },
            ..Default::default()
        };
        let issued = sa_api
            .create_token_request(&self.config.sa_name, &PostParams::default(), &request)
            .await?;
        let token = issued
            .status
            .map(|s| s.token)
            .ok_or_else(|| {
                ControllerError::Bootstrap(format!(
                    "token request for service account {}/{} returned no status",
                    self.config.sa_namespace, self.config.sa_name
                ))
            })?;

        let ca_data = match &self.config.ca {
            Some(pem) => Some(BASE64.encode(pem)),
            None => self.hub_ca_data().await?,
        };

        Ok(kubeconfig::token_kubeconfig(
            BOOTSTRAP_NAMES,
            &self.config.hub_api_server,
            &token,
            ca_data,
            false,
            Some("default"),
        ))
    }

    /// Look up the hub CA when none was configured: the cluster-info
    /// ConfigMap first, then kube-root-ca.crt. Both may legitimately be
    /// absent (cluster-info can exist with no CA data).
    async fn hub_ca_data(&self) -> Result<Option<String>, ControllerError> {
        let cm_api: Api<ConfigMap> = Api::namespaced(self.client.clone(), "kube-public");

        if let Some(cm) = cm_api.get_opt("cluster-info").await? {
            let embedded = cm.data.as_ref().and_then(|d| d.get("kubeconfig"));
            if let Some(raw) = embedded {
                let parsed: KubeConfig = serde_yaml::from_str(raw)?;
                if parsed.clusters.len() != 1 {
                    return Err(ControllerError::Bootstrap(
                        "can not find the cluster in the cluster-info".to_string(),
                    ));
                }
                return Ok(parsed.clusters[0].cluster.certificate_authority_data.clone());
            }
        }

        debug!("cluster-info not usable, falling back to kube-root-ca.crt");
        match cm_api.get_opt("kube-root-ca.crt").await? {
            Some(cm) => Ok(cm
                .data
                .as_ref()
                .and_then(|d| d.get("ca.crt"))
                .map(|pem| BASE64.encode(pem.as_bytes()))),
            None => Ok(None),
        }
    }
}
