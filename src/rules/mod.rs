//! Ruleset model, matching, loading, and the shared store

pub mod loader;
pub mod matcher;
pub mod store;
pub mod types;

pub use matcher::{bound_matches, direct_matches, BOUND_OBJECT_TAG};
pub use store::RulesetStore;
pub use types::{
    AnnotationMatch, MatchRule, MonitorTemplate, NotifyOptions, Ruleset, RulesetDocument,
    Thresholds, BINDING_OBJECT_TYPE,
};
