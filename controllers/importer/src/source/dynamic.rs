//! Dynamic-API watch source.
//!
//! Watches an arbitrary group/version/kind on the hub and announces every
//! observed object as a candidate cluster. Credentials are conventional:
//! a Secret named `<cluster>-kubeconfig` in the object's namespace with the
//! kubeconfig under the `value` key.

use crate::error::ControllerError;
use crate::source::{ClusterSource, TargetCredential, WorkKey};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind};
use kube::{Client, ResourceExt};
use kube_runtime::watcher;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const KUBECONFIG_SUFFIX: &str = "-kubeconfig";
const KUBECONFIG_KEY: &str = "value";

/// Source that watches a configurable resource kind on the hub.
pub struct DynamicApiSource {
    source_name: String,
    client: Client,
    resource: ApiResource,
    queue: UnboundedSender<WorkKey>,
    known: Arc<Mutex<HashSet<(String, String)>>>,
    synced: Arc<AtomicBool>,
}

impl DynamicApiSource {
    pub fn new(
        source_name: &str,
        client: Client,
        gvk: GroupVersionKind,
        queue: UnboundedSender<WorkKey>,
    ) -> Self {
        Self {
            source_name: source_name.to_string(),
            client,
            resource: ApiResource::from_gvk(&gvk),
            queue,
            known: Arc::new(Mutex::new(HashSet::new())),
            synced: Arc::new(AtomicBool::new(false)),
        }
    }

    fn work_key(&self, obj: &DynamicObject) -> WorkKey {
        WorkKey::new(
            &self.source_name,
            obj.namespace().as_deref().unwrap_or(""),
            &obj.name_any(),
        )
    }

    fn observe(&self, obj: &DynamicObject) {
        let key = self.work_key(obj);
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((key.namespace.clone(), key.name.clone()));
        if self.queue.send(key).is_err() {
            warn!("Reconcile queue is gone, dropping discovery announcement");
        }
    }

    fn forget(&self, obj: &DynamicObject) {
        let key = self.work_key(obj);
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(key.namespace, key.name));
    }
}

#[async_trait::async_trait]
impl ClusterSource for DynamicApiSource {
    fn name(&self) -> &str {
        &self.source_name
    }

    async fn credential(&self, key: &WorkKey) -> Result<TargetCredential, ControllerError> {
        let is_known = self
            .known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(key.namespace.clone(), key.name.clone()));
        if !is_known {
            return Err(ControllerError::CredentialNotFound(format!(
                "cluster {}/{} is not known to source {}",
                key.namespace, key.name, self.source_name
            )));
        }

        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &key.namespace);
        let secret_name = format!("{}{}", key.name, KUBECONFIG_SUFFIX);
        let secret = secrets.get_opt(&secret_name).await?.ok_or_else(|| {
            ControllerError::CredentialNotFound(format!(
                "secret {}/{} does not exist",
                key.namespace, secret_name
            ))
        })?;

        secret
            .data
            .as_ref()
            .and_then(|d| d.get(KUBECONFIG_KEY))
            .map(|bytes| TargetCredential::new(bytes.0.clone()))
            .ok_or_else(|| {
                ControllerError::MalformedCredential(format!(
                    "secret {}/{} has no {} key",
                    key.namespace, secret_name, KUBECONFIG_KEY
                ))
            })
    }

    async fn run(&self, shutdown: CancellationToken) {
        let api: Api<DynamicObject> =
            Api::all_with(self.client.clone(), &self.resource);
        let mut stream = watcher(api, watcher::Config::default()).boxed();

        info!(
            "Watching {}.{} as source {}",
            self.resource.kind, self.resource.group, self.source_name
        );
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Source {} stopping", self.source_name);
                    return;
                }
                event = stream.next() => match event {
                    Some(Ok(watcher::Event::Apply(obj) | watcher::Event::InitApply(obj))) => {
                        debug!("Observed {} from source {}", obj.name_any(), self.source_name);
                        self.observe(&obj);
                    }
                    Some(Ok(watcher::Event::Delete(obj))) => self.forget(&obj),
                    Some(Ok(watcher::Event::Init)) => {}
                    Some(Ok(watcher::Event::InitDone)) => {
                        self.synced.store(true, Ordering::SeqCst);
                    }
                    Some(Err(e)) => warn!("Watch error on source {}: {}", self.source_name, e),
                    // watcher streams are unbounded; treat end-of-stream as shutdown
                    None => return,
                },
            }
        }
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }
}
