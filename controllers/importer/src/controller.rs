//! Controller wiring and lifecycle.
//!
//! Assembles the sources, the credential issuer, the applier, and the
//! reconcile queue, then runs them until ctrl-c. Work keys reach the queue
//! two ways: source discovery, and a hub-side watch on
//! `ManagedClusterIntent` that routes change events back to the owning
//! source.

use crate::bootstrap::{BootstrapConfig, TokenBootstrapper};
use crate::config::ImporterConfig;
use crate::error::ControllerError;
use crate::manifest::{ImportApplier, ResourceCache};
use crate::queue::QueueRunner;
use crate::reconciler::Reconciler;
use crate::source::dynamic::DynamicApiSource;
use crate::source::inventory::InventoryClusterSource;
use crate::source::token::OauthTokenIssuer;
use crate::source::{ClusterSource, WorkKey};
use crds::ManagedClusterIntent;
use futures::StreamExt;
use inventory_client::InventoryClient;
use kube::api::{Api, GroupVersionKind};
use kube::{Client, ResourceExt};
use kube_runtime::watcher;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DYNAMIC_SOURCE_NAME: &str = "cluster-api";

pub struct Controller {
    client: Client,
    sources: Vec<Arc<dyn ClusterSource>>,
    reconciler: Arc<Reconciler>,
    workers: usize,
    tx: UnboundedSender<WorkKey>,
    rx: UnboundedReceiver<WorkKey>,
}

impl Controller {
    pub async fn new(config: ImporterConfig) -> Result<Self, ControllerError> {
        let client = Client::try_default().await?;
        let (tx, rx) = mpsc::unbounded_channel();

        let dynamic: Arc<dyn ClusterSource> = Arc::new(DynamicApiSource::new(
            DYNAMIC_SOURCE_NAME,
            client.clone(),
            GroupVersionKind::gvk("cluster.x-k8s.io", "v1beta1", "Cluster"),
            tx.clone(),
        ));

        let inventory_api =
            InventoryClient::new(config.inventory_url.clone(), config.inventory_token.clone())?;
        let inventory: Arc<dyn ClusterSource> = Arc::new(InventoryClusterSource::new(
            Arc::new(inventory_api),
            Arc::new(OauthTokenIssuer::new()?),
            tx.clone(),
            config.poll_interval,
        ));

        let sources = vec![dynamic, inventory];
        let by_name: HashMap<String, Arc<dyn ClusterSource>> = sources
            .iter()
            .map(|s| (s.name().to_string(), s.clone()))
            .collect();

        let bootstrapper = TokenBootstrapper::new(
            BootstrapConfig {
                hub_api_server: config.hub_api_server.clone(),
                ca: config.hub_ca.clone(),
                sa_namespace: config.bootstrap_sa_namespace.clone(),
                sa_name: config.bootstrap_sa_name.clone(),
            },
            client.clone(),
        );
        let applier = ImportApplier::new(Arc::new(ResourceCache::new()));
        let intents: Api<ManagedClusterIntent> = Api::all(client.clone());
        let workers = config.workers;
        let reconciler = Arc::new(Reconciler::new(
            by_name,
            intents,
            bootstrapper,
            applier,
            config,
        ));

        Ok(Self {
            client,
            sources,
            reconciler,
            workers,
            tx,
            rx,
        })
    }

    /// Run discovery, intent routing, and the reconcile queue until ctrl-c.
    pub async fn run(self) -> Result<(), ControllerError> {
        let shutdown = CancellationToken::new();

        {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Shutdown signal received");
                shutdown.cancel();
            });
        }

        for source in &self.sources {
            let source = source.clone();
            let shutdown = shutdown.clone();
            info!("Starting source {}", source.name());
            tokio::spawn(async move { source.run(shutdown).await });
        }

        {
            let intents: Api<ManagedClusterIntent> = Api::all(self.client.clone());
            let tx = self.tx.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { route_intents(intents, tx, shutdown).await });
        }

        // Workers start only once every source has completed its initial
        // discovery pass; announcements buffer in the channel meanwhile
        wait_for_sources(&self.sources, &shutdown).await;

        QueueRunner::new(self.reconciler, self.workers, self.tx.clone())
            .run(self.rx, shutdown)
            .await;
        Ok(())
    }
}

/// Block until every source reports its initial discovery as complete,
/// or shutdown fires.
async fn wait_for_sources(sources: &[Arc<dyn ClusterSource>], shutdown: &CancellationToken) {
    loop {
        let pending: Vec<&str> = sources
            .iter()
            .filter(|s| !s.has_synced())
            .map(|s| s.name())
            .collect();
        if pending.is_empty() {
            info!("All sources have synced");
            return;
        }
        info!("Waiting for sources to sync: {}", pending.join(", "));
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
        }
    }
}

/// Watch hub intents and re-enqueue their work keys, so an intent edit
/// (or late creation) triggers a fresh import attempt.
async fn route_intents(
    intents: Api<ManagedClusterIntent>,
    tx: UnboundedSender<WorkKey>,
    shutdown: CancellationToken,
) {
    let mut stream = watcher(intents, watcher::Config::default()).boxed();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            event = stream.next() => match event {
                Some(Ok(watcher::Event::Apply(intent) | watcher::Event::InitApply(intent))) => {
                    if let Some(key) = intent_work_key(&intent) {
                        if tx.send(key).is_err() {
                            return;
                        }
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => warn!("Intent watch error: {}", e),
                None => return,
            },
        }
    }
}

/// Map an intent to the work key of the source that discovered it.
///
/// Intents without a `spec.source` are operator-created placeholders and
/// stay unrouted until a source claims them. For sources that discover
/// namespaced objects, `spec.externalId` carries `namespace/name` of the
/// discovered object.
fn intent_work_key(intent: &ManagedClusterIntent) -> Option<WorkKey> {
    let source = intent.spec.source.as_deref()?;
    let name = intent.name_any();
    match intent.spec.external_id.as_deref().and_then(|id| id.split_once('/')) {
        Some((namespace, object_name)) => Some(WorkKey::new(source, namespace, object_name)),
        None => Some(WorkKey::new(source, "", &name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControllerError;
    use crate::source::TargetCredential;
    use crds::ManagedClusterIntentSpec;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubSource {
        name: String,
        synced: AtomicBool,
    }

    impl StubSource {
        fn new(name: &str, synced: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                synced: AtomicBool::new(synced),
            })
        }
    }

    #[async_trait::async_trait]
    impl ClusterSource for StubSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn credential(&self, key: &WorkKey) -> Result<TargetCredential, ControllerError> {
            Err(ControllerError::CredentialNotFound(key.to_string()))
        }

        async fn run(&self, shutdown: CancellationToken) {
            shutdown.cancelled().await;
        }

        fn has_synced(&self) -> bool {
            self.synced.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn startup_waits_until_every_source_has_synced() {
        let fast = StubSource::new("fast", true);
        let slow = StubSource::new("slow", false);
        let sources: Vec<Arc<dyn ClusterSource>> = vec![fast, slow.clone()];
        let shutdown = CancellationToken::new();

        let release = {
            let slow = slow.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                slow.synced.store(true, Ordering::SeqCst);
            })
        };

        let started = tokio::time::Instant::now();
        wait_for_sources(&sources, &shutdown).await;
        assert!(started.elapsed() >= std::time::Duration::from_secs(5));
        release.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_unblocks_the_sync_wait() {
        let never: Vec<Arc<dyn ClusterSource>> = vec![StubSource::new("never", false)];
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        // Must return promptly even though the source never syncs
        wait_for_sources(&never, &shutdown).await;
    }

    fn intent(name: &str, spec: ManagedClusterIntentSpec) -> ManagedClusterIntent {
        let mut intent = ManagedClusterIntent::new(name, spec);
        intent.metadata.name = Some(name.to_string());
        intent
    }

    #[test]
    fn intents_without_source_are_not_routed() {
        let intent = intent("prod-east", ManagedClusterIntentSpec::default());
        assert!(intent_work_key(&intent).is_none());
    }

    #[test]
    fn inventory_intents_route_by_resource_name() {
        let intent = intent(
            "prod-east",
            ManagedClusterIntentSpec {
                source: Some("inventory".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(
            intent_work_key(&intent),
            Some(WorkKey::new("inventory", "", "prod-east"))
        );
    }

    #[test]
    fn namespaced_external_ids_route_to_the_discovered_object() {
        let intent = intent(
            "dev-cluster",
            ManagedClusterIntentSpec {
                source: Some("cluster-api".to_string()),
                external_id: Some("clusters-ns/dev-cluster".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(
            intent_work_key(&intent),
            Some(WorkKey::new("cluster-api", "clusters-ns", "dev-cluster"))
        );
    }
}
