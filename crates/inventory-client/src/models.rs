//! Inventory API data models
//!
//! Serde models for the subset of the inventory API the importer uses:
//! cluster listings, managed credentials, group membership, and htpasswd
//! identity providers.

use serde::{Deserialize, Serialize};

/// Paginated list response wrapper from the inventory API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterListPage {
    pub page: u64,
    pub size: u64,
    pub total: u64,
    #[serde(default)]
    pub items: Vec<ClusterEntry>,
}

/// A cluster as reported by the inventory service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterEntry {
    /// Stable external identifier
    pub id: String,

    /// Display name, unique within the inventory
    pub name: String,

    /// Product reference used in list filters (e.g. product.id='rosa')
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductRef>,

    /// API endpoint of the cluster itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiEndpoint>,

    /// Lifecycle state reported by the inventory (e.g. "ready")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub url: String,
}

/// Managed credentials for a cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterCredentials {
    /// Raw kubeconfig granting administrative access
    pub kubeconfig: String,
}

/// A user added to a cluster group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: String,
}

/// An htpasswd user carried inside an identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtpasswdUser {
    pub username: String,
    pub password: String,
}

/// An htpasswd identity provider definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtpasswdIdentityProvider {
    #[serde(default)]
    pub users: Vec<HtpasswdUser>,
}

/// An identity provider attached to a cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityProvider {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub htpasswd: Option<HtpasswdIdentityProvider>,
}

impl IdentityProvider {
    /// Build an htpasswd identity provider with a single user.
    pub fn htpasswd(name: &str, username: &str, password: &str) -> Self {
        Self {
            name: name.to_string(),
            type_: "HTPasswdIdentityProvider".to_string(),
            htpasswd: Some(HtpasswdIdentityProvider {
                users: vec![HtpasswdUser {
                    username: username.to_string(),
                    password: password.to_string(),
                }],
            }),
        }
    }
}
