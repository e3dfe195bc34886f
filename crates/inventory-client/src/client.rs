//! Inventory API client
//!
//! Implements the inventory REST API used by the importer:
//! `/api/clusters_mgmt/v1/clusters` and its credential, group, and
//! identity-provider subresources.

use crate::error::InventoryError;
use crate::inventory_trait::InventoryApi;
use crate::models::*;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

const CLUSTERS_PATH: &str = "/api/clusters_mgmt/v1/clusters";
const PAGE_SIZE: u64 = 100;

/// Inventory API client
pub struct InventoryClient {
    client: Client,
    base_url: String,
    token: String,
}

impl InventoryClient {
    /// Create a new inventory client
    ///
    /// # Arguments
    /// * `base_url` - Inventory base URL (e.g., "https://api.inventory.example.com")
    /// * `token` - Access token for authentication
    pub fn new(base_url: String, token: String) -> Result<Self, InventoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(InventoryError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn error_for(
        context: &str,
        response: reqwest::Response,
    ) -> InventoryError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::FORBIDDEN => {
                InventoryError::Forbidden(format!("{context}: {status} - {body}"))
            }
            StatusCode::NOT_FOUND => {
                InventoryError::NotFound(format!("{context}: {status} - {body}"))
            }
            _ => InventoryError::Api(format!("{context}: {status} - {body}")),
        }
    }
}

#[async_trait::async_trait]
impl InventoryApi for InventoryClient {
    async fn list_clusters(&self, search: &str) -> Result<Vec<ClusterEntry>, InventoryError> {
        let mut all = Vec::new();
        let mut page = 1u64;

        loop {
            let url = format!(
                "{}{}?search={}&page={}&size={}",
                self.base_url,
                CLUSTERS_PATH,
                urlencoding::encode(search),
                page,
                PAGE_SIZE,
            );
            debug!("Listing inventory clusters, page {}", page);

            let response = self
                .client
                .get(&url)
                .header("Authorization", self.auth_header())
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(InventoryError::Http)?;

            if !response.status().is_success() {
                return Err(Self::error_for("failed to list clusters", response).await);
            }

            let listing: ClusterListPage = response.json().await.map_err(InventoryError::Http)?;
            let fetched = listing.items.len() as u64;
            all.extend(listing.items);

            if page * PAGE_SIZE >= listing.total || fetched == 0 {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    async fn get_credentials(&self, cluster_id: &str) -> Result<ClusterCredentials, InventoryError> {
        let url = format!("{}{}/{}/credentials", self.base_url, CLUSTERS_PATH, cluster_id);
        debug!("Fetching managed credentials for cluster {}", cluster_id);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(InventoryError::Http)?;

        if !response.status().is_success() {
            let context = format!("failed to get credentials for cluster {cluster_id}");
            return Err(Self::error_for(&context, response).await);
        }

        let credentials: ClusterCredentials =
            response.json().await.map_err(InventoryError::Http)?;
        Ok(credentials)
    }

    async fn add_group_member(
        &self,
        cluster_id: &str,
        group: &str,
        user: &str,
    ) -> Result<(), InventoryError> {
        let url = format!(
            "{}{}/{}/groups/{}/users",
            self.base_url, CLUSTERS_PATH, cluster_id, group
        );
        debug!("Adding user {} to group {} on cluster {}", user, group, cluster_id);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .json(&GroupMember { id: user.to_string() })
            .send()
            .await
            .map_err(InventoryError::Http)?;

        if !response.status().is_success() {
            let context = format!("failed to add user {user} to group {group} on cluster {cluster_id}");
            return Err(Self::error_for(&context, response).await);
        }

        Ok(())
    }

    async fn add_identity_provider(
        &self,
        cluster_id: &str,
        provider: &IdentityProvider,
    ) -> Result<(), InventoryError> {
        let url = format!(
            "{}{}/{}/identity_providers",
            self.base_url, CLUSTERS_PATH, cluster_id
        );
        debug!("Adding identity provider {} to cluster {}", provider.name, cluster_id);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .json(provider)
            .send()
            .await
            .map_err(InventoryError::Http)?;

        if !response.status().is_success() {
            let context = format!(
                "failed to add identity provider {} to cluster {cluster_id}",
                provider.name
            );
            return Err(Self::error_for(&context, response).await);
        }

        Ok(())
    }
}
