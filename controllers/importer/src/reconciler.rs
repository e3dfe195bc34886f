//! Per-key import reconciliation.
//!
//! One sync drives a single cluster from "discovered" to "agent installed
//! and recorded on the hub". The sequence is strict: the hub intent is
//! consulted first (an already-imported cluster costs nothing further),
//! credentials are acquired next, and only then does anything touch the
//! target. Credential-acquisition failures return early without a status
//! write; apply failures are recorded on the intent.

use crate::bootstrap::TokenBootstrapper;
use crate::config::ImporterConfig;
use crate::error::ControllerError;
use crate::manifest::{ImportApplier, ImportValues};
use crate::source::{ClusterSource, WorkKey};
use crds::{
    is_condition_true, set_condition, IntentCondition, ManagedClusterIntent,
    ManagedClusterIntentStatus, CONDITION_IMPORTED, REASON_IMPORT_ERROR, REASON_IMPORT_SUCCEED,
};
use kube::api::{Api, Patch, PatchParams};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Reconciler {
    sources: HashMap<String, Arc<dyn ClusterSource>>,
    intents: Api<ManagedClusterIntent>,
    bootstrapper: TokenBootstrapper,
    applier: ImportApplier,
    config: ImporterConfig,
}

impl Reconciler {
    pub fn new(
        sources: HashMap<String, Arc<dyn ClusterSource>>,
        intents: Api<ManagedClusterIntent>,
        bootstrapper: TokenBootstrapper,
        applier: ImportApplier,
        config: ImporterConfig,
    ) -> Self {
        Self {
            sources,
            intents,
            bootstrapper,
            applier,
            config,
        }
    }

    /// Run one import attempt for an encoded work key.
    pub async fn sync(&self, raw_key: &str) -> Result<(), ControllerError> {
        let key: WorkKey = raw_key.parse()?;
        let source = self
            .sources
            .get(&key.source)
            .ok_or_else(|| ControllerError::UnknownSource(key.source.clone()))?;

        // 404 on the intent is tolerated: discovery may run ahead of
        // intent creation, and the import itself does not depend on it.
        let intent = self.intents.get_opt(&key.name).await?;

        // An imported cluster costs nothing further: no credential
        // acquisition, no target call, no status write
        if already_imported(intent.as_ref()) {
            debug!("Cluster {} is already imported, nothing to do", key.name);
            return Ok(());
        }

        let bootstrap_kubeconfig = self.bootstrapper.kubeconfig_raw().await?;
        let credential = source.credential(&key).await?;

        let values = ImportValues::new(&self.config, &key.name, &bootstrap_kubeconfig);
        let outcome = self.applier.apply(&credential, &values).await;

        match &outcome {
            Ok(()) => info!("Imported cluster {} from source {}", key.name, key.source),
            Err(e) => warn!("Import of cluster {} failed: {}", key.name, e),
        }

        if let Some(intent) = intent {
            // A failed status write outranks the import error: the retry
            // has to reconverge the recorded state either way.
            self.write_imported_condition(&intent, outcome_condition(&outcome))
                .await?;
        }
        outcome
    }

    /// Record the import outcome on the intent with a single status patch.
    async fn write_imported_condition(
        &self,
        intent: &ManagedClusterIntent,
        condition: IntentCondition,
    ) -> Result<(), ControllerError> {
        let mut conditions = intent
            .status
            .clone()
            .unwrap_or_else(|| ManagedClusterIntentStatus { conditions: vec![] })
            .conditions;
        set_condition(&mut conditions, condition);

        let name = intent
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| ControllerError::InvalidConfig("intent has no name".to_string()))?;
        let patch = json!({ "status": { "conditions": conditions } });
        self.intents
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl crate::queue::SyncHandler for Reconciler {
    async fn sync(&self, key: &str) -> Result<(), ControllerError> {
        Reconciler::sync(self, key).await
    }
}

/// True when the intent already records a successful import. A missing
/// intent or status is treated as not imported.
fn already_imported(intent: Option<&ManagedClusterIntent>) -> bool {
    intent
        .and_then(|i| i.status.as_ref())
        .is_some_and(|s| is_condition_true(&s.conditions, CONDITION_IMPORTED))
}

/// Condition recorded on the intent for one finished import attempt.
fn outcome_condition(outcome: &Result<(), ControllerError>) -> IntentCondition {
    match outcome {
        Ok(()) => IntentCondition::new(
            CONDITION_IMPORTED,
            true,
            REASON_IMPORT_SUCCEED,
            "Import succeeded",
        ),
        Err(e) => IntentCondition::new(CONDITION_IMPORTED, false, REASON_IMPORT_ERROR, &e.to_string()),
    }
}
