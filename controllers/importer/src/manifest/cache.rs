//! Apply change-detection cache.
//!
//! Remembers a content hash per applied object so an unchanged manifest
//! never produces a remote call on re-sync. Keyed by
//! `cluster/kind/namespace/name`; shared process-wide across sync loops.

use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, PoisonError};

#[derive(Default)]
pub struct ResourceCache {
    entries: Mutex<HashMap<String, u64>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `value` is identical to the last recorded apply of `key`.
    pub fn hit(&self, key: &str, value: &Value) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            == Some(&content_hash(value))
    }

    /// Record `value` as the last applied content for `key`.
    pub fn store(&self, key: &str, value: &Value) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), content_hash(value));
    }
}

fn content_hash(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.to_string().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_content_is_a_hit() {
        let cache = ResourceCache::new();
        let manifest = json!({"kind": "ServiceAccount", "metadata": {"name": "agent"}});

        assert!(!cache.hit("ServiceAccount/ns/agent", &manifest));
        cache.store("ServiceAccount/ns/agent", &manifest);
        assert!(cache.hit("ServiceAccount/ns/agent", &manifest));
    }

    #[test]
    fn changed_content_is_a_miss() {
        let cache = ResourceCache::new();
        let original = json!({"spec": {"replicas": 1}});
        let changed = json!({"spec": {"replicas": 3}});

        cache.store("Deployment/ns/agent", &original);
        assert!(!cache.hit("Deployment/ns/agent", &changed));
    }

    #[test]
    fn keys_do_not_collide() {
        let cache = ResourceCache::new();
        let manifest = json!({"metadata": {"name": "agent"}});

        cache.store("ServiceAccount/a/agent", &manifest);
        assert!(!cache.hit("ServiceAccount/b/agent", &manifest));
    }
}
