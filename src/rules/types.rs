//! Ruleset data model
//!
//! A ruleset document maps object annotations to monitor templates.
//! Documents are YAML with a `cluster_variables` map and a `rulesets`
//! list; multiple sources merge by rule concatenation and right-biased
//! variable merge. The merged [`Ruleset`] is immutable once built and is
//! swapped atomically by the store.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The reserved rule type that matches namespace annotations for
/// binding inheritance rather than an object kind.
pub const BINDING_OBJECT_TYPE: &str = "binding";

/// One required annotation on a matching object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationMatch {
    /// The annotation name
    pub name: String,
    /// The exact value the annotation must carry
    pub value: String,
}

/// Alert thresholds for a monitor
///
/// All fields are optional; absent thresholds are not sent to the
/// backend and compare equal to absent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_recovery: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_recovery: Option<f64>,
}

/// Notification behavior for a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotifyOptions {
    /// Alert when no data is received
    #[serde(default)]
    pub notify_no_data: bool,
    /// Minutes of missing data before a no-data alert
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_data_timeframe: Option<i64>,
    /// Notify on monitor configuration changes
    #[serde(default)]
    pub notify_audit: bool,
    /// Minutes before re-notifying on an unresolved alert
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renotify_interval: Option<i64>,
    /// Seconds to wait before evaluating a new host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_host_delay: Option<i64>,
    /// Seconds to delay evaluation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_delay: Option<i64>,
    /// Hours before an alert auto-resolves
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_h: Option<i64>,
    /// Require a full window of data before evaluating
    #[serde(default)]
    pub require_full_window: bool,
    /// Restrict edits to the creator
    #[serde(default)]
    pub locked: bool,
}

/// An abstract monitor definition
///
/// The text fields (`name`, `query`, `message`, `escalation_message`)
/// may contain `{{ path }}` placeholders resolved against a live object;
/// the structured fields are never templated. After rendering, identity
/// is by the rendered `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorTemplate {
    /// Monitor name, templated; the sync key after rendering
    pub name: String,
    /// Backend monitor type, e.g. "metric alert"
    #[serde(rename = "type", default = "default_monitor_type")]
    pub monitor_type: String,
    /// The alert query, templated
    pub query: String,
    /// Alert message, templated
    #[serde(default)]
    pub message: String,
    /// Escalation message, templated
    #[serde(default)]
    pub escalation_message: String,
    /// Monitor tags; compared as a set, order-insensitive
    #[serde(default)]
    pub tags: Vec<String>,
    /// Alert thresholds
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Notification behavior, flattened into the monitor record
    #[serde(flatten)]
    pub options: NotifyOptions,
}

fn default_monitor_type() -> String {
    "metric alert".to_string()
}

impl Default for MonitorTemplate {
    fn default() -> Self {
        Self {
            name: String::new(),
            monitor_type: default_monitor_type(),
            query: String::new(),
            message: String::new(),
            escalation_message: String::new(),
            tags: Vec::new(),
            thresholds: Thresholds::default(),
            options: NotifyOptions::default(),
        }
    }
}

impl MonitorTemplate {
    /// Append a tag unless it is already present
    pub fn push_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }
}

/// One declared rule: object type + required annotations → monitors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRule {
    /// The object type this rule applies to ("deployment", "namespace",
    /// or the reserved "binding" type)
    #[serde(rename = "type")]
    pub object_type: String,
    /// Annotations an object must all carry, with exact values
    #[serde(default, rename = "match_annotations")]
    pub match_annotations: Vec<AnnotationMatch>,
    /// For binding rules: the object types that inherit the monitors
    #[serde(default, rename = "bound_objects")]
    pub bound_object_types: Vec<String>,
    /// The monitors this rule provisions
    #[serde(default)]
    pub monitors: Vec<MonitorTemplate>,
}

impl MatchRule {
    /// Whether this is a namespace-binding rule
    pub fn is_binding(&self) -> bool {
        self.object_type == BINDING_OBJECT_TYPE
    }
}

/// The on-disk shape of one ruleset source
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RulesetDocument {
    /// Variables exposed to templates under the `cluster.` prefix
    #[serde(default)]
    pub cluster_variables: HashMap<String, String>,
    /// The declared rules, in order
    #[serde(default, rename = "rulesets")]
    pub rules: Vec<MatchRule>,
}

/// The merged, immutable view over all sources
///
/// A reload builds a brand-new `Ruleset` and swaps it in atomically;
/// readers never observe a partially merged one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ruleset {
    /// Right-biased merge of all sources' cluster variables
    pub cluster_variables: HashMap<String, String>,
    /// Concatenation of all sources' rules, source order preserved
    pub rules: Vec<MatchRule>,
}

impl Ruleset {
    /// Fold one source document into the merged ruleset
    pub fn merge_document(&mut self, document: RulesetDocument) {
        self.rules.extend(document.rules);
        for (name, value) in document.cluster_variables {
            self.cluster_variables.insert(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_DOCUMENT: &str = r#"
cluster_variables:
  warning_threshold: "80"
rulesets:
  - type: deployment
    match_annotations:
      - name: vigil/owner
        value: team-a
    monitors:
      - name: "High CPU on {{ name }}"
        type: metric alert
        query: "avg:cpu{deployment:{{ name }}} > {{ cluster.warning_threshold }}"
        message: "CPU is high"
        tags:
          - team-a
        thresholds:
          critical: 90.0
          warning: 80.0
        notify_no_data: true
        renotify_interval: 30
  - type: binding
    match_annotations:
      - name: vigil/bind
        value: "true"
    bound_objects:
      - deployment
    monitors:
      - name: "Bound monitor"
        query: "avg:mem{ns:{{ namespace }}} > 1"
"#;

    #[test]
    fn test_document_deserialization() {
        let doc: RulesetDocument = serde_yaml::from_str(SAMPLE_DOCUMENT).unwrap();
        assert_eq!(
            doc.cluster_variables.get("warning_threshold"),
            Some(&"80".to_string())
        );
        assert_eq!(doc.rules.len(), 2);

        let rule = &doc.rules[0];
        assert_eq!(rule.object_type, "deployment");
        assert_eq!(rule.match_annotations.len(), 1);
        assert_eq!(rule.match_annotations[0].name, "vigil/owner");
        assert_eq!(rule.monitors.len(), 1);

        let monitor = &rule.monitors[0];
        assert_eq!(monitor.monitor_type, "metric alert");
        assert_eq!(monitor.thresholds.critical, Some(90.0));
        assert!(monitor.options.notify_no_data);
        assert_eq!(monitor.options.renotify_interval, Some(30));
    }

    #[test]
    fn test_binding_rule_detection() {
        let doc: RulesetDocument = serde_yaml::from_str(SAMPLE_DOCUMENT).unwrap();
        assert!(!doc.rules[0].is_binding());
        assert!(doc.rules[1].is_binding());
        assert_eq!(doc.rules[1].bound_object_types, vec!["deployment"]);
    }

    #[test]
    fn test_monitor_type_defaults() {
        let yaml = r#"
name: "minimal"
query: "avg:cpu{*} > 1"
"#;
        let monitor: MonitorTemplate = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(monitor.monitor_type, "metric alert");
        assert!(monitor.message.is_empty());
        assert!(monitor.tags.is_empty());
        assert_eq!(monitor.thresholds, Thresholds::default());
        assert_eq!(monitor.options, NotifyOptions::default());
    }

    #[test]
    fn test_push_tag_deduplicates() {
        let mut monitor = MonitorTemplate {
            name: "m".to_string(),
            monitor_type: "metric alert".to_string(),
            query: "q".to_string(),
            message: String::new(),
            escalation_message: String::new(),
            tags: vec!["a".to_string()],
            thresholds: Thresholds::default(),
            options: NotifyOptions::default(),
        };
        monitor.push_tag("a");
        monitor.push_tag("b");
        assert_eq!(monitor.tags, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_merge_documents_is_right_biased_for_variables() {
        let mut left = RulesetDocument::default();
        left.cluster_variables
            .insert("region".to_string(), "us-east-1".to_string());
        left.rules.push(MatchRule {
            object_type: "deployment".to_string(),
            match_annotations: vec![],
            bound_object_types: vec![],
            monitors: vec![],
        });

        let mut right = RulesetDocument::default();
        right
            .cluster_variables
            .insert("region".to_string(), "eu-west-1".to_string());
        right.rules.push(MatchRule {
            object_type: "namespace".to_string(),
            match_annotations: vec![],
            bound_object_types: vec![],
            monitors: vec![],
        });

        let mut merged = Ruleset::default();
        merged.merge_document(left);
        merged.merge_document(right);

        assert_eq!(merged.rules.len(), 2);
        assert_eq!(merged.rules[0].object_type, "deployment");
        assert_eq!(merged.rules[1].object_type, "namespace");
        assert_eq!(
            merged.cluster_variables.get("region"),
            Some(&"eu-west-1".to_string())
        );
    }
}
