//! Controller-specific error types.
//!
//! This module defines the error taxonomy of the importer. `InvalidKey` and
//! `UnknownSource` are permanent (logged and dropped by the queue),
//! `CredentialNotFound` resolves once discovery catches up, and the remote
//! call variants are retriable with backoff.

use crate::manifest::ApplyErrors;
use inventory_client::InventoryError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Fleet Importer Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Work key does not encode a source/namespace/name triple
    #[error("invalid work key: {0}")]
    InvalidKey(String),

    /// Work key names a source that is not registered
    #[error("source {0} does not exist")]
    UnknownSource(String),

    /// The cluster is not (yet) known to its source
    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    /// Credential material exists but is unusable
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Inventory API error
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Bootstrap credential issuance failed
    #[error("bootstrap credential error: {0}")]
    Bootstrap(String),

    /// Token request against a target cluster failed
    #[error("token request failed: {0}")]
    TokenRequest(String),

    /// One or more manifest objects failed to apply
    #[error(transparent)]
    Apply(#[from] ApplyErrors),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ControllerError {
    /// Permanent errors are dropped by the queue instead of retried;
    /// they only resolve through operator action (fixing a key or
    /// registering the missing source).
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ControllerError::InvalidKey(_) | ControllerError::UnknownSource(_)
        )
    }
}
