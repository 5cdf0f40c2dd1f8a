//! Monitoring backend seam
//!
//! The backend holds the provisioned monitors this agent owns,
//! identified by an ownership tag. [`MonitorBackend`] is the only
//! surface the sync engine and controllers touch; the production
//! implementation is [`DatadogBackend`], tests use in-memory fakes.

pub mod datadog;

pub use datadog::DatadogBackend;

use crate::error::VigilError;
use crate::rules::types::MonitorTemplate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A monitor already created by this agent in the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionedMonitor {
    /// Backend-assigned monitor id
    pub id: u64,
    /// The monitor's current definition as the backend reports it
    pub definition: MonitorTemplate,
}

/// Operations the sync engine needs from the monitoring backend
///
/// Errors are explicit values, not log lines: a read failure aborts the
/// current reconcile, write failures are returned per call without
/// retry here. Retry is the resource controller's job via re-queue.
#[async_trait]
pub trait MonitorBackend: Send + Sync {
    /// List every monitor carrying the given tag
    async fn list_by_tag(&self, tag: &str) -> Result<Vec<ProvisionedMonitor>, VigilError>;

    /// Create a monitor from a rendered definition
    async fn create(&self, definition: &MonitorTemplate)
        -> Result<ProvisionedMonitor, VigilError>;

    /// Replace an existing monitor's definition in full
    async fn update(&self, id: u64, definition: &MonitorTemplate) -> Result<(), VigilError>;

    /// Delete a monitor by id; `name` is carried for error context
    async fn delete(&self, id: u64, name: &str) -> Result<(), VigilError>;
}
