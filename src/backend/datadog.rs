//! Datadog-compatible monitor API client
//!
//! Talks to the v1 monitor endpoints: list by tag, create, full-replace
//! update, and delete. Every request carries the account's API and
//! application keys and a per-request timeout so no reconcile blocks
//! unboundedly on the backend.

use crate::backend::{MonitorBackend, ProvisionedMonitor};
use crate::error::VigilError;
use crate::rules::types::{MonitorTemplate, NotifyOptions, Thresholds};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const API_KEY_HEADER: &str = "DD-API-KEY";
const APP_KEY_HEADER: &str = "DD-APPLICATION-KEY";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the monitoring backend
pub struct DatadogBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    app_key: String,
}

/// Monitor record as the wire protocol shapes it
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiMonitor {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    name: String,
    #[serde(rename = "type")]
    monitor_type: String,
    query: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    options: ApiMonitorOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ApiMonitorOptions {
    #[serde(default)]
    escalation_message: String,
    #[serde(default)]
    thresholds: Thresholds,
    #[serde(default)]
    notify_no_data: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    no_data_timeframe: Option<i64>,
    #[serde(default)]
    notify_audit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    renotify_interval: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    new_host_delay: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    evaluation_delay: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_h: Option<i64>,
    #[serde(default)]
    require_full_window: bool,
    #[serde(default)]
    locked: bool,
}

impl From<&MonitorTemplate> for ApiMonitor {
    fn from(definition: &MonitorTemplate) -> Self {
        Self {
            id: None,
            name: definition.name.clone(),
            monitor_type: definition.monitor_type.clone(),
            query: definition.query.clone(),
            message: definition.message.clone(),
            tags: definition.tags.clone(),
            options: ApiMonitorOptions {
                escalation_message: definition.escalation_message.clone(),
                thresholds: definition.thresholds,
                notify_no_data: definition.options.notify_no_data,
                no_data_timeframe: definition.options.no_data_timeframe,
                notify_audit: definition.options.notify_audit,
                renotify_interval: definition.options.renotify_interval,
                new_host_delay: definition.options.new_host_delay,
                evaluation_delay: definition.options.evaluation_delay,
                timeout_h: definition.options.timeout_h,
                require_full_window: definition.options.require_full_window,
                locked: definition.options.locked,
            },
        }
    }
}

impl ApiMonitor {
    fn into_definition(self) -> MonitorTemplate {
        MonitorTemplate {
            name: self.name,
            monitor_type: self.monitor_type,
            query: self.query,
            message: self.message,
            escalation_message: self.options.escalation_message,
            tags: self.tags,
            thresholds: self.options.thresholds,
            options: NotifyOptions {
                notify_no_data: self.options.notify_no_data,
                no_data_timeframe: self.options.no_data_timeframe,
                notify_audit: self.options.notify_audit,
                renotify_interval: self.options.renotify_interval,
                new_host_delay: self.options.new_host_delay,
                evaluation_delay: self.options.evaluation_delay,
                timeout_h: self.options.timeout_h,
                require_full_window: self.options.require_full_window,
                locked: self.options.locked,
            },
        }
    }
}

impl DatadogBackend {
    /// Build a client for the given API base URL and account keys
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        app_key: impl Into<String>,
    ) -> Result<Self, VigilError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            app_key: app_key.into(),
        })
    }

    fn monitor_url(&self, id: Option<u64>) -> String {
        match id {
            Some(id) => format!("{}/api/v1/monitor/{}", self.base_url, id),
            None => format!("{}/api/v1/monitor", self.base_url),
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(API_KEY_HEADER, &self.api_key)
            .header(APP_KEY_HEADER, &self.app_key)
    }

    fn write_error(operation: &str, monitor: &str, reason: impl ToString) -> VigilError {
        VigilError::BackendWrite {
            operation: operation.to_string(),
            monitor: monitor.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl MonitorBackend for DatadogBackend {
    async fn list_by_tag(&self, tag: &str) -> Result<Vec<ProvisionedMonitor>, VigilError> {
        debug!(tag = tag, "Listing provisioned monitors");
        let response = self
            .authorized(self.client.get(self.monitor_url(None)))
            .query(&[("monitor_tags", tag)])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| VigilError::BackendRead(e.to_string()))?;

        let monitors: Vec<ApiMonitor> = response
            .json()
            .await
            .map_err(|e| VigilError::BackendRead(e.to_string()))?;

        Ok(monitors
            .into_iter()
            .filter_map(|monitor| {
                let id = monitor.id?;
                Some(ProvisionedMonitor {
                    id,
                    definition: monitor.into_definition(),
                })
            })
            .collect())
    }

    async fn create(
        &self,
        definition: &MonitorTemplate,
    ) -> Result<ProvisionedMonitor, VigilError> {
        debug!(monitor = definition.name.as_str(), "Creating monitor");
        let payload = ApiMonitor::from(definition);
        let response = self
            .authorized(self.client.post(self.monitor_url(None)))
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Self::write_error("create", &definition.name, e))?;

        let created: ApiMonitor = response
            .json()
            .await
            .map_err(|e| Self::write_error("create", &definition.name, e))?;
        let id = created.id.ok_or_else(|| {
            Self::write_error("create", &definition.name, "backend returned no monitor id")
        })?;

        Ok(ProvisionedMonitor {
            id,
            definition: created.into_definition(),
        })
    }

    async fn update(&self, id: u64, definition: &MonitorTemplate) -> Result<(), VigilError> {
        debug!(id = id, monitor = definition.name.as_str(), "Updating monitor");
        let payload = ApiMonitor::from(definition);
        self.authorized(self.client.put(self.monitor_url(Some(id))))
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Self::write_error("update", &definition.name, e))?;
        Ok(())
    }

    async fn delete(&self, id: u64, name: &str) -> Result<(), VigilError> {
        debug!(id = id, monitor = name, "Deleting monitor");
        self.authorized(self.client.delete(self.monitor_url(Some(id))))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Self::write_error("delete", name, e))?;
        Ok(())
    }
}
