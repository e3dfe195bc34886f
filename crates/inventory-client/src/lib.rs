//! Cluster Inventory REST API Client
//!
//! A Rust client for the external cluster inventory service the fleet
//! importer discovers clusters from. Provides type-safe models and methods
//! for listing clusters, fetching managed credentials, and provisioning
//! break-glass administrative identities.
//!
//! # Example
//!
//! ```no_run
//! use inventory_client::{InventoryApi, InventoryClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = InventoryClient::new(
//!     "https://api.inventory.example.com".to_string(),
//!     "your-access-token".to_string(),
//! )?;
//!
//! // List clusters matching a filter predicate
//! let clusters = client.list_clusters("product.id='rosa'").await?;
//!
//! // Fetch managed credentials for one of them
//! let creds = client.get_credentials(&clusters[0].id).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod inventory_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::InventoryClient;
pub use error::InventoryError;
pub use inventory_trait::InventoryApi;
pub use models::*;
#[cfg(feature = "test-util")]
pub use mock::MockInventoryClient;
