//! Vigil - cluster monitor manager
//!
//! Vigil watches annotated cluster objects and keeps a monitoring
//! backend converged with the monitors their annotations declare.
//! Rulesets map annotation patterns to monitor templates; per-kind
//! controllers coalesce watch events, render the templates against the
//! live object, and apply the minimal set of create, update, and
//! delete calls against the backend.
//!
//! The crate is organized as:
//! - [`rules`]: ruleset sources, matching, and the shared store
//! - [`render`]: placeholder substitution against object state
//! - [`kube`]: object model, watch events, and the snapshot cache
//! - [`backend`]: the monitor backend trait and the Datadog client
//! - [`sync`]: diffing desired monitors against provisioned ones
//! - [`controller`]: work queues, per-kind workers, and the supervisor

pub mod backend;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod kube;
pub mod render;
pub mod rules;
pub mod sync;

pub use cli::Cli;
pub use config::Config;
pub use error::{Result, VigilError};
