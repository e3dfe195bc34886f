//! Work-item addressing.
//!
//! A `WorkKey` addresses one import attempt: the owning source plus the
//! discovered cluster's namespace/name. Encoded as `source/namespace/name`;
//! the namespace segment is empty for cluster-scoped discoveries.

use crate::error::ControllerError;
use std::fmt;
use std::str::FromStr;

/// Routable key consumed by the reconcile queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkKey {
    /// Name of the source that owns this key
    pub source: String,
    /// Namespace of the discovered cluster object (may be empty)
    pub namespace: String,
    /// Name of the discovered cluster; doubles as the intent name on the hub
    pub name: String,
}

impl WorkKey {
    pub fn new(source: &str, namespace: &str, name: &str) -> Self {
        Self {
            source: source.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for WorkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.source, self.namespace, self.name)
    }
}

impl FromStr for WorkKey {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(source), Some(namespace), Some(name)) if !source.is_empty() && !name.is_empty() => {
                Ok(WorkKey::new(source, namespace, name))
            }
            _ => Err(ControllerError::InvalidKey(format!(
                "key {s} format is not correct"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_namespaced_keys() {
        let key = WorkKey::new("capi", "clusters-ns", "dev-cluster");
        let parsed: WorkKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn round_trips_cluster_scoped_keys() {
        let key = WorkKey::new("inventory", "", "prod-cluster");
        assert_eq!(key.to_string(), "inventory//prod-cluster");
        let parsed: WorkKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn rejects_keys_without_triple() {
        for bad in ["", "no-separator", "source/name", "/ns/name", "source/ns/"] {
            let result: Result<WorkKey, _> = bad.parse();
            assert!(
                matches!(result, Err(ControllerError::InvalidKey(_))),
                "expected InvalidKey for {bad:?}"
            );
        }
    }

    #[test]
    fn name_may_contain_separators() {
        // splitn keeps trailing separators inside the name segment
        let parsed: WorkKey = "src/ns/name/extra".parse().unwrap();
        assert_eq!(parsed.name, "name/extra");
    }
}
