//! InventoryApi trait for mocking
//!
//! Abstracts the inventory client so the importer's source can be unit
//! tested without a live inventory service. The concrete client implements
//! this trait; tests use the mock behind the `test-util` feature.

use crate::error::InventoryError;
use crate::models::*;

/// Operations the importer needs from the inventory service.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait InventoryApi: Send + Sync {
    /// List clusters matching a filter predicate (e.g. `product.id='rosa'`),
    /// fetching every page.
    async fn list_clusters(&self, search: &str) -> Result<Vec<ClusterEntry>, InventoryError>;

    /// Fetch managed credentials for a cluster.
    ///
    /// Returns `InventoryError::Forbidden` when the service refuses to hand
    /// out credentials for this cluster configuration.
    async fn get_credentials(&self, cluster_id: &str) -> Result<ClusterCredentials, InventoryError>;

    /// Add a user to one of the cluster's groups (e.g. `cluster-admins`).
    async fn add_group_member(
        &self,
        cluster_id: &str,
        group: &str,
        user: &str,
    ) -> Result<(), InventoryError>;

    /// Attach an identity provider to the cluster.
    async fn add_identity_provider(
        &self,
        cluster_id: &str,
        provider: &IdentityProvider,
    ) -> Result<(), InventoryError>;
}
