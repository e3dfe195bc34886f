//! Minimal clientcmd-v1 kubeconfig model.
//!
//! Used to synthesize the bootstrap kubeconfig handed to agents and the
//! break-glass kubeconfig built from a provisioned admin token. Modeled by
//! hand because kube's own `Kubeconfig` redacts secrets on serialization;
//! the output stays parseable by `kube::config::Kubeconfig`.

use serde::{Deserialize, Serialize};

/// A clientcmd v1 kubeconfig document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeConfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub clusters: Vec<NamedCluster>,
    pub users: Vec<NamedUser>,
    pub contexts: Vec<NamedContext>,
    #[serde(rename = "current-context")]
    pub current_context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: ClusterEndpoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterEndpoint {
    pub server: String,
    /// Base64-encoded PEM bundle
    #[serde(
        rename = "certificate-authority-data",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_authority_data: Option<String>,
    #[serde(
        rename = "insecure-skip-tls-verify",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub insecure_skip_tls_verify: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedUser {
    pub name: String,
    pub user: UserAuth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: ContextRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRef {
    pub cluster: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Naming for the single cluster/user/context entry of a synthesized config.
#[derive(Debug, Clone, Copy)]
pub struct ContextNames<'a> {
    pub cluster: &'a str,
    pub user: &'a str,
    pub context: &'a str,
}

/// Build a single-context, token-authenticated kubeconfig.
pub fn token_kubeconfig(
    names: ContextNames<'_>,
    server: &str,
    token: &str,
    ca_data: Option<String>,
    insecure_skip_tls_verify: bool,
    namespace: Option<&str>,
) -> KubeConfig {
    KubeConfig {
        api_version: "v1".to_string(),
        kind: "Config".to_string(),
        clusters: vec![NamedCluster {
            name: names.cluster.to_string(),
            cluster: ClusterEndpoint {
                server: server.to_string(),
                certificate_authority_data: ca_data,
                insecure_skip_tls_verify: insecure_skip_tls_verify.then_some(true),
            },
        }],
        users: vec![NamedUser {
            name: names.user.to_string(),
            user: UserAuth {
                token: Some(token.to_string()),
            },
        }],
        contexts: vec![NamedContext {
            name: names.context.to_string(),
            context: ContextRef {
                cluster: names.cluster.to_string(),
                user: names.user.to_string(),
                namespace: namespace.map(|n| n.to_string()),
            },
        }],
        current_context: names.context.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: ContextNames<'_> = ContextNames {
        cluster: "hub",
        user: "bootstrap",
        context: "bootstrap",
    };

    #[test]
    fn token_kubeconfig_serializes_clientcmd_fields() {
        let config = token_kubeconfig(
            NAMES,
            "https://hub.example.com:6443",
            "sekrit",
            Some("Y2EtZGF0YQ==".to_string()),
            false,
            Some("default"),
        );

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("apiVersion: v1"));
        assert!(yaml.contains("server: https://hub.example.com:6443"));
        assert!(yaml.contains("certificate-authority-data: Y2EtZGF0YQ=="));
        assert!(yaml.contains("token: sekrit"));
        assert!(yaml.contains("current-context: bootstrap"));
        assert!(!yaml.contains("insecure-skip-tls-verify"));
    }

    #[test]
    fn token_kubeconfig_is_parseable_by_kube() {
        let config = token_kubeconfig(
            NAMES,
            "https://hub.example.com:6443",
            "sekrit",
            None,
            true,
            None,
        );

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = kube::config::Kubeconfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.current_context.as_deref(), Some("bootstrap"));
        assert_eq!(parsed.clusters.len(), 1);
        assert_eq!(parsed.contexts.len(), 1);
    }

    #[test]
    fn token_kubeconfig_round_trips() {
        let config = token_kubeconfig(
            NAMES,
            "https://api.target.example.com:6443",
            "tok",
            None,
            true,
            Some("default"),
        );

        let yaml = serde_yaml::to_string(&config).unwrap();
        let reparsed: KubeConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(reparsed.clusters[0].cluster.server, config.clusters[0].cluster.server);
        assert_eq!(reparsed.users[0].user.token, config.users[0].user.token);
        assert_eq!(reparsed.clusters[0].cluster.insecure_skip_tls_verify, Some(true));
    }
}
