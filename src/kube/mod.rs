//! Orchestrator-facing types and seams
//!
//! The orchestrator's watch transport is an external collaborator: an
//! adapter delivers [`WatchEvent`]s (at-least-once, in order per key) and
//! this module defines the types those events carry plus the
//! [`ObjectSource`] seam controllers use to read live object state.

pub mod cache;

pub use cache::SnapshotCache;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The closed set of object kinds the agent watches
///
/// Dispatch on kind is a pattern match, never a string comparison, so an
/// unsupported kind is a compile-time error rather than a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// A workload deployment
    Deployment,
    /// A namespace; namespace annotations also drive binding inheritance
    Namespace,
}

impl ObjectKind {
    /// All kinds the supervisor starts a controller for
    pub const ALL: [ObjectKind; 2] = [ObjectKind::Deployment, ObjectKind::Namespace];

    /// The lowercase name used in rule documents and object keys
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Deployment => "deployment",
            ObjectKind::Namespace => "namespace",
        }
    }

    /// Whether objects of this kind live inside a namespace
    ///
    /// Cluster-scoped kinds never inherit monitors through a binding.
    pub fn is_namespaced(&self) -> bool {
        match self {
            ObjectKind::Deployment => true,
            ObjectKind::Namespace => false,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "deployment" => Ok(ObjectKind::Deployment),
            "namespace" => Ok(ObjectKind::Namespace),
            other => Err(format!("unknown object kind '{}'", other)),
        }
    }
}

/// Identity of a watched object: `kind/namespace/name`
///
/// Cluster-scoped objects (namespaces) carry an empty `namespace` field
/// and display as `kind/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Kind of the object
    pub kind: ObjectKind,
    /// Namespace the object lives in, empty for cluster-scoped kinds
    #[serde(default)]
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Build a key for a namespaced object
    pub fn namespaced(
        kind: ObjectKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build a key for a cluster-scoped object (a namespace itself)
    pub fn cluster_scoped(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: String::new(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.kind, self.name)
        } else {
            write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
        }
    }
}

/// The live fields of an object that matching and rendering read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    /// The object's identity
    pub key: ObjectKey,
    /// Object labels
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Object annotations; these drive rule matching
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    /// The object spec as reported by the orchestrator
    #[serde(default)]
    pub spec: serde_json::Value,
}

impl ObjectSnapshot {
    /// Create a snapshot with empty labels, annotations, and spec
    pub fn new(key: ObjectKey) -> Self {
        Self {
            key,
            labels: HashMap::new(),
            annotations: HashMap::new(),
            spec: serde_json::Value::Null,
        }
    }
}

/// Kind of change the orchestrator reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Object was created
    Create,
    /// Object was updated
    Update,
    /// Object was deleted; the snapshot carries its last-known state
    Delete,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Create => f.write_str("create"),
            EventType::Update => f.write_str("update"),
            EventType::Delete => f.write_str("delete"),
        }
    }
}

/// One change notification from the orchestrator watch adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    /// What happened to the object
    pub event_type: EventType,
    /// The object's state at event time (last-known state for deletes)
    pub snapshot: ObjectSnapshot,
}

/// Read access to live object state
///
/// Controllers fetch the object being reconciled and its namespace's
/// annotations through this trait. The in-process implementation is
/// [`SnapshotCache`], an informer-style local store fed by watch events;
/// tests substitute hand-rolled fakes.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Fetch the current snapshot for a key, `None` if the object is gone
    async fn get(&self, key: &ObjectKey) -> Result<Option<ObjectSnapshot>>;

    /// Fetch the annotations of a namespace, empty if it is unknown
    async fn namespace_annotations(&self, namespace: &str) -> Result<HashMap<String, String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_kind_as_str() {
        assert_eq!(ObjectKind::Deployment.as_str(), "deployment");
        assert_eq!(ObjectKind::Namespace.as_str(), "namespace");
    }

    #[test]
    fn test_object_kind_from_str() {
        assert_eq!(
            "deployment".parse::<ObjectKind>().unwrap(),
            ObjectKind::Deployment
        );
        assert_eq!(
            "namespace".parse::<ObjectKind>().unwrap(),
            ObjectKind::Namespace
        );
        assert!("binding".parse::<ObjectKind>().is_err());
    }

    #[test]
    fn test_object_kind_namespaced() {
        assert!(ObjectKind::Deployment.is_namespaced());
        assert!(!ObjectKind::Namespace.is_namespaced());
    }

    #[test]
    fn test_object_key_display_namespaced() {
        let key = ObjectKey::namespaced(ObjectKind::Deployment, "prod", "web");
        assert_eq!(key.to_string(), "deployment/prod/web");
    }

    #[test]
    fn test_object_key_display_cluster_scoped() {
        let key = ObjectKey::cluster_scoped(ObjectKind::Namespace, "prod");
        assert_eq!(key.to_string(), "namespace/prod");
    }

    #[test]
    fn test_object_key_serialization_round_trip() {
        let key = ObjectKey::namespaced(ObjectKind::Deployment, "prod", "web");
        let json = serde_json::to_string(&key).unwrap();
        assert!(json.contains("\"kind\":\"deployment\""));
        let back: ObjectKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_watch_event_deserialization_defaults() {
        let json = r#"{
            "event_type": "update",
            "snapshot": {
                "key": {"kind": "deployment", "namespace": "prod", "name": "web"}
            }
        }"#;
        let event: WatchEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, EventType::Update);
        assert!(event.snapshot.labels.is_empty());
        assert!(event.snapshot.annotations.is_empty());
        assert!(event.snapshot.spec.is_null());
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(EventType::Create.to_string(), "create");
        assert_eq!(EventType::Update.to_string(), "update");
        assert_eq!(EventType::Delete.to_string(), "delete");
    }
}
