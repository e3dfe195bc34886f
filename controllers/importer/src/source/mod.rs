//! Pluggable cluster sources.
//!
//! A source discovers candidate clusters and hands out a target-cluster
//! credential per discovery. Discoveries are announced by sending
//! source-prefixed `WorkKey`s into the reconcile queue. Two variants:
//! a dynamic-API watch source and a polling inventory source; they share
//! no state and differ completely in discovery mechanism.

pub mod dynamic;
pub mod inventory;
#[cfg(test)]
mod inventory_test;
pub mod key;
pub mod token;

pub use key::WorkKey;

use crate::error::ControllerError;
use tokio_util::sync::CancellationToken;

/// An access descriptor sufficient to administer a target cluster:
/// raw kubeconfig bytes. Consumed once by the manifest applier.
#[derive(Clone)]
pub struct TargetCredential {
    kubeconfig: Vec<u8>,
}

impl TargetCredential {
    pub fn new(kubeconfig: Vec<u8>) -> Self {
        Self { kubeconfig }
    }

    pub fn kubeconfig(&self) -> &[u8] {
        &self.kubeconfig
    }
}

impl std::fmt::Debug for TargetCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log credential material
        f.debug_struct("TargetCredential").finish_non_exhaustive()
    }
}

/// Discovery + credential lookup + lifecycle capability of a source.
#[async_trait::async_trait]
pub trait ClusterSource: Send + Sync {
    /// Registered name; every key this source emits is prefixed with it.
    fn name(&self) -> &str;

    /// Look up the credential for a discovered cluster.
    ///
    /// Returns `CredentialNotFound` (not a generic error) when the cluster
    /// is not currently known, so the reconciler can distinguish
    /// "discovery has not caught up" from hard failures. Safe to call
    /// concurrently with discovery.
    async fn credential(&self, key: &WorkKey) -> Result<TargetCredential, ControllerError>;

    /// Run the background discovery process until `shutdown` fires.
    async fn run(&self, shutdown: CancellationToken);

    /// Whether at least one full discovery pass has completed.
    fn has_synced(&self) -> bool;
}
