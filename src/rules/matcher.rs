//! Rule matching
//!
//! Matching is case-sensitive exact string equality over annotation
//! names and values, a conjunction over a rule's required annotations.
//! There are no wildcard or regex semantics. Matching is total: an
//! object type with zero rules yields an empty result, never an error.

use crate::rules::types::{MatchRule, MonitorTemplate, Ruleset};
use std::collections::HashMap;
use tracing::debug;

/// Tag stamped on every monitor inherited through a namespace binding,
/// so bound monitors are attributable in the backend and in logs.
pub const BOUND_OBJECT_TAG: &str = "vigil:bound_object";

/// Whether a rule's required annotations are all satisfied
///
/// Every required annotation must be present with an exact value match;
/// extra annotations on the object are ignored. A rule with no required
/// annotations never matches: opting in always takes at least one
/// annotation.
fn annotations_satisfy(rule: &MatchRule, annotations: &HashMap<String, String>) -> bool {
    if rule.match_annotations.is_empty() {
        return false;
    }
    rule.match_annotations.iter().all(|required| {
        annotations
            .get(&required.name)
            .map(|value| value == &required.value)
            .unwrap_or(false)
    })
}

/// Rules whose object type and required annotations match directly
///
/// Rule declaration order is preserved; all matches accumulate.
pub fn direct_matches<'a>(
    ruleset: &'a Ruleset,
    object_type: &str,
    annotations: &HashMap<String, String>,
) -> Vec<&'a MatchRule> {
    let mut matched = Vec::new();
    for rule in &ruleset.rules {
        if rule.object_type != object_type {
            continue;
        }
        let satisfied = annotations_satisfy(rule, annotations);
        debug!(
            object_type = object_type,
            required = rule.match_annotations.len(),
            matched = satisfied,
            "Evaluated direct rule"
        );
        if satisfied {
            matched.push(rule);
        }
    }
    matched
}

/// Monitors inherited by `object_type` through namespace bindings
///
/// Selects binding rules satisfied by the namespace's annotations,
/// filtered to those whose bound object types contain `object_type`.
/// Every returned monitor carries [`BOUND_OBJECT_TAG`].
pub fn bound_matches(
    ruleset: &Ruleset,
    namespace_annotations: &HashMap<String, String>,
    object_type: &str,
) -> Vec<MonitorTemplate> {
    let mut inherited = Vec::new();
    for rule in &ruleset.rules {
        if !rule.is_binding() {
            continue;
        }
        let satisfied = annotations_satisfy(rule, namespace_annotations);
        let bound = rule
            .bound_object_types
            .iter()
            .any(|bound_type| bound_type == object_type);
        debug!(
            object_type = object_type,
            matched = satisfied,
            bound = bound,
            "Evaluated binding rule"
        );
        if satisfied && bound {
            for monitor in &rule.monitors {
                let mut monitor = monitor.clone();
                monitor.push_tag(BOUND_OBJECT_TAG);
                inherited.push(monitor);
            }
        }
    }
    inherited
}
