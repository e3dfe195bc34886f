//! Mock inventory client for unit testing
//!
//! In-memory implementation of `InventoryApi` that can be configured to
//! return managed credentials, refuse them with Forbidden, or fail with a
//! generic API error, per cluster. Records provisioning calls so tests can
//! assert how often the break-glass path ran.

use crate::error::InventoryError;
use crate::inventory_trait::InventoryApi;
use crate::models::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Mock inventory client for testing
#[derive(Clone, Default)]
pub struct MockInventoryClient {
    clusters: Arc<Mutex<Vec<ClusterEntry>>>,
    credentials: Arc<Mutex<HashMap<String, String>>>,
    forbidden: Arc<Mutex<HashSet<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    group_adds: Arc<Mutex<HashMap<String, u32>>>,
    idp_adds: Arc<Mutex<HashMap<String, u32>>>,
}

impl MockInventoryClient {
    /// Create an empty mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cluster in the mock inventory (for test setup)
    pub fn add_cluster(&self, entry: ClusterEntry) {
        self.clusters.lock().unwrap().push(entry);
    }

    /// Set the managed kubeconfig returned for a cluster (for test setup)
    pub fn set_credentials(&self, cluster_id: &str, kubeconfig: &str) {
        self.credentials
            .lock()
            .unwrap()
            .insert(cluster_id.to_string(), kubeconfig.to_string());
    }

    /// Make `get_credentials` answer Forbidden for a cluster (for test setup)
    pub fn set_forbidden(&self, cluster_id: &str) {
        self.forbidden.lock().unwrap().insert(cluster_id.to_string());
    }

    /// Make `get_credentials` fail with a generic API error (for test setup)
    pub fn set_failing(&self, cluster_id: &str) {
        self.failing.lock().unwrap().insert(cluster_id.to_string());
    }

    /// Number of group-membership additions recorded for a cluster
    pub fn group_add_count(&self, cluster_id: &str) -> u32 {
        *self.group_adds.lock().unwrap().get(cluster_id).unwrap_or(&0)
    }

    /// Number of identity-provider additions recorded for a cluster
    pub fn idp_add_count(&self, cluster_id: &str) -> u32 {
        *self.idp_adds.lock().unwrap().get(cluster_id).unwrap_or(&0)
    }
}

#[async_trait::async_trait]
impl InventoryApi for MockInventoryClient {
    async fn list_clusters(&self, _search: &str) -> Result<Vec<ClusterEntry>, InventoryError> {
        Ok(self.clusters.lock().unwrap().clone())
    }

    async fn get_credentials(&self, cluster_id: &str) -> Result<ClusterCredentials, InventoryError> {
        if self.failing.lock().unwrap().contains(cluster_id) {
            return Err(InventoryError::Api(format!(
                "injected failure for cluster {cluster_id}"
            )));
        }
        if self.forbidden.lock().unwrap().contains(cluster_id) {
            return Err(InventoryError::Forbidden(format!(
                "credentials are not available for cluster {cluster_id}"
            )));
        }
        self.credentials
            .lock()
            .unwrap()
            .get(cluster_id)
            .map(|kubeconfig| ClusterCredentials {
                kubeconfig: kubeconfig.clone(),
            })
            .ok_or_else(|| {
                InventoryError::NotFound(format!("no credentials for cluster {cluster_id}"))
            })
    }

    async fn add_group_member(
        &self,
        cluster_id: &str,
        _group: &str,
        _user: &str,
    ) -> Result<(), InventoryError> {
        *self
            .group_adds
            .lock()
            .unwrap()
            .entry(cluster_id.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn add_identity_provider(
        &self,
        cluster_id: &str,
        _provider: &IdentityProvider,
    ) -> Result<(), InventoryError> {
        *self
            .idp_adds
            .lock()
            .unwrap()
            .entry(cluster_id.to_string())
            .or_insert(0) += 1;
        Ok(())
    }
}
