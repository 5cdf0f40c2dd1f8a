//! Error types for Vigil
//!
//! This module defines all error types used throughout the agent,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Vigil operations
///
/// This enum encompasses all possible errors that can occur during
/// ruleset loading, template rendering, and monitoring-backend
/// interactions. No variant is process-fatal: controllers log the
/// error, re-queue the affected key, and keep serving other keys.
#[derive(Error, Debug)]
pub enum VigilError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ruleset source fetch or parse failure (the source is skipped,
    /// the last-known-good contribution is retained)
    #[error("Ruleset source error: {source_path}: {reason}")]
    Source {
        /// The path or URL of the failed source
        source_path: String,
        /// What went wrong fetching or parsing it
        reason: String,
    },

    /// A template field failed to render (the field keeps its
    /// unrendered text, other fields are unaffected)
    #[error("Render error in field '{field}': {reason}")]
    Render {
        /// The template field that failed (name, query, ...)
        field: String,
        /// Why the placeholder could not be resolved
        reason: String,
    },

    /// Reading live object state from the orchestrator failed; the
    /// current reconcile aborts and the key is re-queued with backoff
    #[error("Object read error: {0}")]
    ObjectRead(String),

    /// Listing provisioned monitors failed; the current reconcile
    /// aborts and the key is re-queued with backoff
    #[error("Backend read error: {0}")]
    BackendRead(String),

    /// A create/update/delete call against the backend failed
    #[error("Backend write error: {operation} '{monitor}': {reason}")]
    BackendWrite {
        /// The operation that failed (create, update, delete)
        operation: String,
        /// The name of the monitor the operation targeted
        monitor: String,
        /// The underlying failure
        reason: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Vigil operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
