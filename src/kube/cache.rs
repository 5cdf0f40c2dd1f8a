//! Informer-style local store of object snapshots
//!
//! The watch adapter applies every event to this cache before the
//! supervisor enqueues the key, so controllers read the same state the
//! event described without a round trip to the orchestrator.

use crate::error::Result;
use crate::kube::{EventType, ObjectKey, ObjectSnapshot, ObjectSource, WatchEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Thread-safe snapshot store fed by watch events
///
/// Create and update events replace the stored snapshot; delete events
/// remove it, so a subsequent [`ObjectSource::get`] returns `None` and
/// the controller takes its deletion path.
#[derive(Default)]
pub struct SnapshotCache {
    objects: RwLock<HashMap<ObjectKey, ObjectSnapshot>>,
}

impl SnapshotCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one watch event to the cache
    pub fn apply(&self, event: &WatchEvent) {
        let key = event.snapshot.key.clone();
        let mut objects = self.objects.write().expect("snapshot cache poisoned");
        match event.event_type {
            EventType::Create | EventType::Update => {
                debug!(key = %key, event_type = %event.event_type, "Caching object snapshot");
                objects.insert(key, event.snapshot.clone());
            }
            EventType::Delete => {
                debug!(key = %key, "Evicting object snapshot");
                objects.remove(&key);
            }
        }
    }

    /// Number of cached snapshots
    pub fn len(&self) -> usize {
        self.objects.read().expect("snapshot cache poisoned").len()
    }

    /// Whether the cache holds no snapshots
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectSource for SnapshotCache {
    async fn get(&self, key: &ObjectKey) -> Result<Option<ObjectSnapshot>> {
        let objects = self.objects.read().expect("snapshot cache poisoned");
        Ok(objects.get(key).cloned())
    }

    async fn namespace_annotations(&self, namespace: &str) -> Result<HashMap<String, String>> {
        let key = ObjectKey::cluster_scoped(crate::kube::ObjectKind::Namespace, namespace);
        let objects = self.objects.read().expect("snapshot cache poisoned");
        Ok(objects
            .get(&key)
            .map(|snapshot| snapshot.annotations.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::ObjectKind;

    fn deployment_event(event_type: EventType, name: &str) -> WatchEvent {
        WatchEvent {
            event_type,
            snapshot: ObjectSnapshot::new(ObjectKey::namespaced(
                ObjectKind::Deployment,
                "prod",
                name,
            )),
        }
    }

    #[tokio::test]
    async fn test_apply_create_then_get() {
        let cache = SnapshotCache::new();
        cache.apply(&deployment_event(EventType::Create, "web"));

        let key = ObjectKey::namespaced(ObjectKind::Deployment, "prod", "web");
        let snapshot = cache.get(&key).await.unwrap();
        assert!(snapshot.is_some());
        assert_eq!(snapshot.unwrap().key, key);
    }

    #[tokio::test]
    async fn test_apply_update_replaces_snapshot() {
        let cache = SnapshotCache::new();
        cache.apply(&deployment_event(EventType::Create, "web"));

        let key = ObjectKey::namespaced(ObjectKind::Deployment, "prod", "web");
        let mut updated = ObjectSnapshot::new(key.clone());
        updated
            .annotations
            .insert("vigil/owner".to_string(), "team-a".to_string());
        cache.apply(&WatchEvent {
            event_type: EventType::Update,
            snapshot: updated,
        });

        let snapshot = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(
            snapshot.annotations.get("vigil/owner"),
            Some(&"team-a".to_string())
        );
    }

    #[tokio::test]
    async fn test_apply_delete_evicts() {
        let cache = SnapshotCache::new();
        cache.apply(&deployment_event(EventType::Create, "web"));
        cache.apply(&deployment_event(EventType::Delete, "web"));

        let key = ObjectKey::namespaced(ObjectKind::Deployment, "prod", "web");
        assert!(cache.get(&key).await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_namespace_annotations_from_cached_namespace() {
        let cache = SnapshotCache::new();
        let mut snapshot =
            ObjectSnapshot::new(ObjectKey::cluster_scoped(ObjectKind::Namespace, "prod"));
        snapshot
            .annotations
            .insert("team".to_string(), "payments".to_string());
        cache.apply(&WatchEvent {
            event_type: EventType::Create,
            snapshot,
        });

        let annotations = cache.namespace_annotations("prod").await.unwrap();
        assert_eq!(annotations.get("team"), Some(&"payments".to_string()));
    }

    #[tokio::test]
    async fn test_namespace_annotations_unknown_namespace_is_empty() {
        let cache = SnapshotCache::new();
        let annotations = cache.namespace_annotations("missing").await.unwrap();
        assert!(annotations.is_empty());
    }
}
