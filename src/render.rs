//! Template rendering
//!
//! Substitutes `{{ path }}` placeholders in a monitor template's text
//! fields with live object fields. Path roots: `name`, `namespace`,
//! `labels.<key>`, `annotations.<key>`, `spec.<dotted.path>`, and
//! `cluster.<variable>`. Structured fields are never templated.
//!
//! Each text field renders independently: a malformed placeholder
//! leaves that field's unrendered text in place and is reported to the
//! caller, while the other fields still render. Rendering is pure, so
//! repeated rendering against the same object is byte-identical.

use crate::error::VigilError;
use crate::kube::ObjectSnapshot;
use crate::rules::types::MonitorTemplate;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("placeholder pattern"))
}

/// Everything a placeholder may resolve against
pub struct RenderScope<'a> {
    snapshot: &'a ObjectSnapshot,
    cluster_variables: &'a HashMap<String, String>,
}

impl<'a> RenderScope<'a> {
    /// Build a scope over a live object and the ruleset's variables
    pub fn new(
        snapshot: &'a ObjectSnapshot,
        cluster_variables: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            snapshot,
            cluster_variables,
        }
    }

    fn resolve(&self, path: &str) -> Result<String, String> {
        let path = path.trim();
        if path.is_empty() {
            return Err("empty placeholder".to_string());
        }
        let (root, rest) = match path.split_once('.') {
            Some((root, rest)) => (root, Some(rest)),
            None => (path, None),
        };
        match (root, rest) {
            ("name", None) => Ok(self.snapshot.key.name.clone()),
            ("namespace", None) => {
                // A namespace object's own name doubles as its namespace.
                if self.snapshot.key.namespace.is_empty() {
                    Ok(self.snapshot.key.name.clone())
                } else {
                    Ok(self.snapshot.key.namespace.clone())
                }
            }
            ("labels", Some(key)) => self
                .snapshot
                .labels
                .get(key)
                .cloned()
                .ok_or_else(|| format!("label '{}' not present", key)),
            ("annotations", Some(key)) => self
                .snapshot
                .annotations
                .get(key)
                .cloned()
                .ok_or_else(|| format!("annotation '{}' not present", key)),
            ("cluster", Some(name)) => self
                .cluster_variables
                .get(name)
                .cloned()
                .ok_or_else(|| format!("cluster variable '{}' not defined", name)),
            ("spec", Some(pointer)) => resolve_spec(&self.snapshot.spec, pointer),
            ("spec", None) => Err("'spec' requires a field path".to_string()),
            (root, _) => Err(format!("unknown placeholder root '{}'", root)),
        }
    }
}

/// Walk a dotted path into the object spec; numeric segments index arrays
fn resolve_spec(spec: &serde_json::Value, pointer: &str) -> Result<String, String> {
    let mut current = spec;
    for segment in pointer.split('.') {
        current = match current {
            serde_json::Value::Object(map) => map
                .get(segment)
                .ok_or_else(|| format!("spec field '{}' not present", segment))?,
            serde_json::Value::Array(items) => {
                let index: usize = segment
                    .parse()
                    .map_err(|_| format!("'{}' is not an array index", segment))?;
                items
                    .get(index)
                    .ok_or_else(|| format!("spec index {} out of bounds", index))?
            }
            _ => return Err(format!("spec path stops before '{}'", segment)),
        };
    }
    match current {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("spec value '{}' is not a scalar", other)),
    }
}

/// Render one text field; an error leaves the caller with the original
fn render_field(text: &str, scope: &RenderScope<'_>) -> Result<String, String> {
    let pattern = placeholder_pattern();
    let mut rendered = String::with_capacity(text.len());
    let mut last_end = 0;
    for captures in pattern.captures_iter(text) {
        let whole = captures.get(0).expect("capture group 0");
        let path = captures.get(1).expect("capture group 1").as_str();
        rendered.push_str(&text[last_end..whole.start()]);
        rendered.push_str(&scope.resolve(path)?);
        last_end = whole.end();
    }
    rendered.push_str(&text[last_end..]);
    Ok(rendered)
}

/// The rendered monitor plus any per-field failures
pub struct RenderOutcome {
    /// The monitor with every successfully rendered field substituted
    pub monitor: MonitorTemplate,
    /// One [`VigilError::Render`] per failed field
    pub errors: Vec<VigilError>,
}

impl RenderOutcome {
    /// Whether every field rendered cleanly
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Render a template's text fields against a live object
///
/// Fields render independently; a failed field keeps its unrendered
/// text and contributes an error to the outcome. Never panics and never
/// aborts the remaining fields.
pub fn render(template: &MonitorTemplate, scope: &RenderScope<'_>) -> RenderOutcome {
    let mut monitor = template.clone();
    let mut errors = Vec::new();

    let fields: [(&str, &mut String); 4] = [
        ("name", &mut monitor.name),
        ("query", &mut monitor.query),
        ("message", &mut monitor.message),
        ("escalation_message", &mut monitor.escalation_message),
    ];

    for (field, text) in fields {
        match render_field(text, scope) {
            Ok(rendered) => *text = rendered,
            Err(reason) => errors.push(VigilError::Render {
                field: field.to_string(),
                reason,
            }),
        }
    }

    RenderOutcome { monitor, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::{ObjectKey, ObjectKind};
    use crate::rules::types::{NotifyOptions, Thresholds};
    use serde_json::json;

    fn snapshot() -> ObjectSnapshot {
        let mut snapshot =
            ObjectSnapshot::new(ObjectKey::namespaced(ObjectKind::Deployment, "prod", "web"));
        snapshot
            .labels
            .insert("app".to_string(), "storefront".to_string());
        snapshot
            .annotations
            .insert("vigil/owner".to_string(), "team-a".to_string());
        snapshot.spec = json!({
            "replicas": 3,
            "template": {"containers": [{"name": "main"}]},
            "paused": false
        });
        snapshot
    }

    fn template(name: &str, query: &str) -> MonitorTemplate {
        MonitorTemplate {
            name: name.to_string(),
            monitor_type: "metric alert".to_string(),
            query: query.to_string(),
            message: String::new(),
            escalation_message: String::new(),
            tags: vec![],
            thresholds: Thresholds::default(),
            options: NotifyOptions::default(),
        }
    }

    fn variables() -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("cluster_name".to_string(), "east".to_string());
        vars
    }

    #[test]
    fn test_render_basic_fields() {
        let snapshot = snapshot();
        let vars = variables();
        let scope = RenderScope::new(&snapshot, &vars);
        let outcome = render(
            &template(
                "CPU {{ name }} in {{ namespace }}",
                "avg:cpu{app:{{ labels.app }},cluster:{{ cluster.cluster_name }}} > 1",
            ),
            &scope,
        );

        assert!(outcome.is_clean());
        assert_eq!(outcome.monitor.name, "CPU web in prod");
        assert_eq!(
            outcome.monitor.query,
            "avg:cpu{app:storefront,cluster:east} > 1"
        );
    }

    #[test]
    fn test_render_spec_paths() {
        let snapshot = snapshot();
        let vars = variables();
        let scope = RenderScope::new(&snapshot, &vars);
        let outcome = render(
            &template(
                "replicas={{ spec.replicas }} paused={{ spec.paused }}",
                "container {{ spec.template.containers.0.name }}",
            ),
            &scope,
        );

        assert!(outcome.is_clean());
        assert_eq!(outcome.monitor.name, "replicas=3 paused=false");
        assert_eq!(outcome.monitor.query, "container main");
    }

    #[test]
    fn test_failed_field_keeps_unrendered_text_and_reports() {
        let snapshot = snapshot();
        let vars = variables();
        let scope = RenderScope::new(&snapshot, &vars);
        let outcome = render(
            &template("CPU {{ name }}", "avg:cpu{ {{ bogus.path }} } > 1"),
            &scope,
        );

        // Unrelated field still rendered
        assert_eq!(outcome.monitor.name, "CPU web");
        // Failed field untouched
        assert_eq!(outcome.monitor.query, "avg:cpu{ {{ bogus.path }} } > 1");
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            outcome.errors[0],
            VigilError::Render { ref field, .. } if field == "query"
        ));
    }

    #[test]
    fn test_empty_placeholder_is_an_error() {
        let snapshot = snapshot();
        let vars = variables();
        let scope = RenderScope::new(&snapshot, &vars);
        let outcome = render(&template("{{}}", "q"), &scope);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.monitor.name, "{{}}");
    }

    #[test]
    fn test_missing_annotation_is_an_error() {
        let snapshot = snapshot();
        let vars = variables();
        let scope = RenderScope::new(&snapshot, &vars);
        let outcome = render(&template("{{ annotations.absent }}", "q"), &scope);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn test_non_scalar_spec_value_is_an_error() {
        let snapshot = snapshot();
        let vars = variables();
        let scope = RenderScope::new(&snapshot, &vars);
        let outcome = render(&template("{{ spec.template }}", "q"), &scope);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.monitor.name, "{{ spec.template }}");
    }

    #[test]
    fn test_namespace_object_resolves_namespace_to_own_name() {
        let ns_snapshot =
            ObjectSnapshot::new(ObjectKey::cluster_scoped(ObjectKind::Namespace, "prod"));
        let vars = HashMap::new();
        let scope = RenderScope::new(&ns_snapshot, &vars);
        let outcome = render(&template("ns {{ namespace }}", "q"), &scope);
        assert!(outcome.is_clean());
        assert_eq!(outcome.monitor.name, "ns prod");
    }

    #[test]
    fn test_rendering_is_idempotent_for_same_input() {
        let snapshot = snapshot();
        let vars = variables();
        let scope = RenderScope::new(&snapshot, &vars);
        let tpl = template("CPU {{ name }}", "avg:cpu{app:{{ labels.app }}} > 1");
        let first = render(&tpl, &scope);
        let second = render(&tpl, &scope);
        assert_eq!(first.monitor, second.monitor);
    }

    #[test]
    fn test_text_without_placeholders_passes_through() {
        let snapshot = snapshot();
        let vars = variables();
        let scope = RenderScope::new(&snapshot, &vars);
        let outcome = render(&template("plain name", "plain query"), &scope);
        assert!(outcome.is_clean());
        assert_eq!(outcome.monitor.name, "plain name");
        assert_eq!(outcome.monitor.query, "plain query");
    }
}
