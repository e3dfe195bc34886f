use crate::error::ControllerError;
use crate::source::inventory::InventoryClusterSource;
use crate::source::token::TokenIssuer;
use crate::source::{ClusterSource, WorkKey};
use inventory_client::{ApiEndpoint, ClusterEntry, MockInventoryClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct StaticTokenIssuer;

#[async_trait::async_trait]
impl TokenIssuer for StaticTokenIssuer {
    async fn request_token(
        &self,
        _api_url: &str,
        _username: &str,
        _password: &str,
    ) -> Result<String, ControllerError> {
        Ok("sha256~static-test-token".to_string())
    }
}

fn entry(id: &str, name: &str) -> ClusterEntry {
    ClusterEntry {
        id: id.to_string(),
        name: name.to_string(),
        product: None,
        api: Some(ApiEndpoint {
            url: format!("https://api.{name}.example.com:6443"),
        }),
        state: Some("ready".to_string()),
    }
}

fn source(
    mock: &MockInventoryClient,
) -> (
    InventoryClusterSource,
    mpsc::UnboundedReceiver<WorkKey>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let source = InventoryClusterSource::new(
        Arc::new(mock.clone()),
        Arc::new(StaticTokenIssuer),
        tx,
        Duration::from_secs(600),
    );
    (source, rx)
}

#[tokio::test]
async fn announces_each_cluster_once() {
    let mock = MockInventoryClient::new();
    mock.add_cluster(entry("c1", "prod-east"));
    mock.set_credentials("c1", "apiVersion: v1\nkind: Config\n");
    let (source, mut rx) = source(&mock);

    source.poll().await;
    source.poll().await;

    let key = rx.try_recv().unwrap();
    assert_eq!(key, WorkKey::new("inventory", "", "prod-east"));
    // Second poll must not re-announce
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn one_bad_entry_does_not_abort_the_batch() {
    let mock = MockInventoryClient::new();
    mock.add_cluster(entry("c1", "alpha"));
    mock.add_cluster(entry("c2", "bravo"));
    mock.add_cluster(entry("c3", "charlie"));
    mock.set_credentials("c1", "kubeconfig-alpha");
    mock.set_failing("c2");
    mock.set_credentials("c3", "kubeconfig-charlie");
    let (source, mut rx) = source(&mock);

    source.poll().await;

    let mut announced: Vec<String> = Vec::new();
    while let Ok(key) = rx.try_recv() {
        announced.push(key.name);
    }
    assert_eq!(announced, vec!["alpha", "charlie"]);
    assert!(source
        .credential(&WorkKey::new("inventory", "", "bravo"))
        .await
        .is_err());
}

#[tokio::test]
async fn forbidden_provisions_break_glass_admin_once() {
    let mock = MockInventoryClient::new();
    mock.add_cluster(entry("c1", "restricted"));
    mock.set_forbidden("c1");
    let (source, mut rx) = source(&mock);

    source.poll().await;
    source.poll().await;

    assert_eq!(mock.group_add_count("c1"), 1);
    assert_eq!(mock.idp_add_count("c1"), 1);
    assert_eq!(rx.try_recv().unwrap().name, "restricted");

    let credential = source
        .credential(&WorkKey::new("inventory", "", "restricted"))
        .await
        .unwrap();
    let kubeconfig = String::from_utf8(credential.kubeconfig().to_vec()).unwrap();
    assert!(kubeconfig.contains("sha256~static-test-token"));
    assert!(kubeconfig.contains("insecure-skip-tls-verify: true"));
    assert!(kubeconfig.contains("https://api.restricted.example.com:6443"));
}

#[tokio::test]
async fn admin_identity_is_reused_across_discoveries() {
    let mock = MockInventoryClient::new();
    mock.add_cluster(entry("c1", "restricted"));
    mock.set_forbidden("c1");
    let (source, _rx) = source(&mock);

    source.poll().await;
    // Same external cluster resurfaces under a new name; the admin
    // identity is keyed by id and must not be provisioned again.
    mock.add_cluster(entry("c1", "restricted-renamed"));
    source.poll().await;

    assert_eq!(mock.group_add_count("c1"), 1);
    assert_eq!(mock.idp_add_count("c1"), 1);
}

#[tokio::test]
async fn forbidden_without_api_endpoint_is_skipped() {
    let mock = MockInventoryClient::new();
    let mut no_api = entry("c1", "headless");
    no_api.api = None;
    mock.add_cluster(no_api);
    mock.set_forbidden("c1");
    let (source, mut rx) = source(&mock);

    source.poll().await;

    assert!(rx.try_recv().is_err());
    assert_eq!(mock.group_add_count("c1"), 0);
}

#[tokio::test]
async fn credential_resolves_after_discovery() {
    let mock = MockInventoryClient::new();
    mock.add_cluster(entry("c1", "prod-east"));
    mock.set_credentials("c1", "managed-kubeconfig");
    let (source, _rx) = source(&mock);
    let key = WorkKey::new("inventory", "", "prod-east");

    let before = source.credential(&key).await;
    assert!(matches!(before, Err(ControllerError::CredentialNotFound(_))));
    assert!(!source.has_synced());

    source.poll().await;

    let after = source.credential(&key).await.unwrap();
    assert_eq!(after.kubeconfig(), b"managed-kubeconfig");
    assert!(source.has_synced());
}

#[tokio::test]
async fn first_discovered_credential_wins() {
    let mock = MockInventoryClient::new();
    mock.add_cluster(entry("c1", "prod-east"));
    mock.set_credentials("c1", "original-kubeconfig");
    let (source, _rx) = source(&mock);
    let key = WorkKey::new("inventory", "", "prod-east");

    source.poll().await;
    mock.set_credentials("c1", "rotated-kubeconfig");
    source.poll().await;

    let credential = source.credential(&key).await.unwrap();
    assert_eq!(credential.kubeconfig(), b"original-kubeconfig");
}
