//! Polling inventory source.
//!
//! Discovers clusters by querying the external inventory API on a fixed
//! interval. Newly seen clusters are recorded in an in-memory index
//! (first write wins) and announced to the reconcile queue exactly once.
//! When the inventory refuses to hand out managed credentials, a one-time
//! break-glass administrative identity is provisioned and cached for the
//! life of the process.

use crate::error::ControllerError;
use crate::kubeconfig::{self, ContextNames};
use crate::source::token::TokenIssuer;
use crate::source::{ClusterSource, TargetCredential, WorkKey};
use inventory_client::{ClusterEntry, IdentityProvider, InventoryApi, InventoryError};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const SOURCE_NAME: &str = "inventory";
const DEFAULT_FILTER: &str = "product.id='rosa'";
const ADMIN_USERNAME: &str = "fleet-bootstrap-admin";
const ADMIN_GROUP: &str = "cluster-admins";
const PASSWORD_LENGTH: usize = 20;

const BREAK_GLASS_NAMES: ContextNames<'_> = ContextNames {
    cluster: "default-cluster",
    user: "default-auth",
    context: "default-context",
};

/// A cluster discovered from the inventory, with its credential cached on
/// the record itself.
#[derive(Debug, Clone)]
pub struct DiscoveredCluster {
    /// External identifier in the inventory
    pub id: String,
    /// Display name; doubles as the intent name on the hub
    pub name: String,
    /// Raw kubeconfig for the target cluster
    pub kubeconfig: String,
}

/// Provisioned break-glass identity, cached per external cluster id.
#[derive(Debug, Clone)]
struct AdminIdentity {
    username: String,
    password: String,
}

/// Source that polls the external cluster inventory.
pub struct InventoryClusterSource {
    api: Arc<dyn InventoryApi>,
    tokens: Arc<dyn TokenIssuer>,
    queue: UnboundedSender<WorkKey>,
    filter: String,
    interval: Duration,
    discovered: Mutex<HashMap<String, DiscoveredCluster>>,
    admins: Mutex<HashMap<String, AdminIdentity>>,
    synced: AtomicBool,
}

impl InventoryClusterSource {
    pub fn new(
        api: Arc<dyn InventoryApi>,
        tokens: Arc<dyn TokenIssuer>,
        queue: UnboundedSender<WorkKey>,
        interval: Duration,
    ) -> Self {
        Self {
            api,
            tokens,
            queue,
            filter: DEFAULT_FILTER.to_string(),
            interval,
            discovered: Mutex::new(HashMap::new()),
            admins: Mutex::new(HashMap::new()),
            synced: AtomicBool::new(false),
        }
    }

    /// One discovery pass over the inventory.
    pub async fn poll(&self) {
        let entries = match self.api.list_clusters(&self.filter).await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Failed to list inventory clusters: {}", e);
                return;
            }
        };
        debug!("Inventory poll returned {} clusters", entries.len());

        for entry in entries {
            let already_known = self
                .discovered
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(&entry.name);
            if already_known {
                continue;
            }

            let kubeconfig = match self.cluster_kubeconfig(&entry).await {
                Ok(kubeconfig) => kubeconfig,
                Err(e) => {
                    // One bad inventory entry never aborts the batch
                    warn!("Skipping cluster {} ({}): {}", entry.name, entry.id, e);
                    continue;
                }
            };

            // First write wins: the cached kubeconfig is never refreshed,
            // even if the underlying credential later rotates.
            self.discovered
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(
                    entry.name.clone(),
                    DiscoveredCluster {
                        id: entry.id.clone(),
                        name: entry.name.clone(),
                        kubeconfig,
                    },
                );

            info!("Discovered cluster {} ({})", entry.name, entry.id);
            let key = WorkKey::new(SOURCE_NAME, "", &entry.name);
            if self.queue.send(key).is_err() {
                warn!("Reconcile queue is gone, dropping discovery announcement");
            }
        }

        self.synced.store(true, Ordering::SeqCst);
    }

    /// Obtain a kubeconfig for one inventory entry: managed credentials
    /// first, break-glass provisioning when the inventory answers Forbidden.
    async fn cluster_kubeconfig(&self, entry: &ClusterEntry) -> Result<String, ControllerError> {
        match self.api.get_credentials(&entry.id).await {
            Ok(credentials) => Ok(credentials.kubeconfig),
            Err(InventoryError::Forbidden(reason)) => {
                debug!(
                    "Managed credentials forbidden for cluster {} ({}), provisioning break-glass admin",
                    entry.id, reason
                );
                self.break_glass_kubeconfig(entry).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn break_glass_kubeconfig(&self, entry: &ClusterEntry) -> Result<String, ControllerError> {
        let api_url = entry
            .api
            .as_ref()
            .map(|a| a.url.clone())
            .ok_or_else(|| {
                ControllerError::MalformedCredential(format!(
                    "cluster {} reports no API endpoint",
                    entry.id
                ))
            })?;

        let admin = self.admin_identity(&entry.id).await?;
        let token = self
            .tokens
            .request_token(&api_url, &admin.username, &admin.password)
            .await?;

        let config = kubeconfig::token_kubeconfig(
            BREAK_GLASS_NAMES,
            &api_url,
            &token,
            None,
            true,
            Some("default"),
        );
        Ok(serde_yaml::to_string(&config)?)
    }

    /// Return the cached admin identity for a cluster, provisioning one on
    /// first use.
    ///
    /// Provisioning makes two non-idempotent remote calls (group add,
    /// identity-provider add) with no verification step; a retry after a
    /// partial failure may double-provision. At-least-once semantics are
    /// accepted here, the cache prevents re-runs after success.
    async fn admin_identity(&self, cluster_id: &str) -> Result<AdminIdentity, ControllerError> {
        let cached = self
            .admins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(cluster_id)
            .cloned();
        if let Some(admin) = cached {
            return Ok(admin);
        }

        let admin = AdminIdentity {
            username: ADMIN_USERNAME.to_string(),
            password: generate_password(PASSWORD_LENGTH),
        };

        self.api
            .add_group_member(cluster_id, ADMIN_GROUP, &admin.username)
            .await?;
        self.api
            .add_identity_provider(
                cluster_id,
                &IdentityProvider::htpasswd(ADMIN_USERNAME, &admin.username, &admin.password),
            )
            .await?;

        info!("Provisioned break-glass admin for cluster {}", cluster_id);
        self.admins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cluster_id.to_string(), admin.clone());
        Ok(admin)
    }
}

fn generate_password(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[async_trait::async_trait]
impl ClusterSource for InventoryClusterSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn credential(&self, key: &WorkKey) -> Result<TargetCredential, ControllerError> {
        self.discovered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key.name)
            .map(|cluster| TargetCredential::new(cluster.kubeconfig.clone().into_bytes()))
            .ok_or_else(|| {
                ControllerError::CredentialNotFound(format!(
                    "cluster {} is not known to source {}",
                    key.name, SOURCE_NAME
                ))
            })
    }

    async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Inventory source stopping");
                    return;
                }
                _ = ticker.tick() => self.poll().await,
            }
        }
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }
}
