//! Resource controller
//!
//! One controller per watched object kind. Each controller consumes its
//! own work queue in a single loop, so processing within a kind is
//! serialized and at most one reconcile is in flight per object key.
//!
//! A work item moves Queued → Processing → Succeeded, or fails and is
//! re-queued with exponential backoff up to a bounded attempt ceiling,
//! after which the failure is logged as permanent and the key dropped.

use crate::backend::{MonitorBackend, ProvisionedMonitor};
use crate::controller::queue::WorkQueue;
use crate::error::VigilError;
use crate::kube::{EventType, ObjectKey, ObjectKind, ObjectSource, WatchEvent};
use crate::render::{render, RenderScope};
use crate::rules::{bound_matches, direct_matches, RulesetStore};
use crate::rules::types::MonitorTemplate;
use crate::sync::{converge, object_scope_tag};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Retry and ownership parameters shared by all controllers
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Tag identifying monitors this agent owns
    pub owner_tag: String,
    /// Log planned writes without issuing them
    pub dry_run: bool,
    /// Attempts per key before the failure is treated as permanent
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt
    pub base_backoff: Duration,
    /// Upper bound on the retry delay
    pub max_backoff: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            owner_tag: "vigil".to_string(),
            dry_run: false,
            max_attempts: 5,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Reconciles one object kind against the monitoring backend
pub struct ResourceController {
    kind: ObjectKind,
    store: Arc<RulesetStore>,
    source: Arc<dyn ObjectSource>,
    backend: Arc<dyn MonitorBackend>,
    queue: WorkQueue,
    settings: ControllerSettings,
    // Keys whose most recent event was a delete; their reconcile
    // short-circuits to removing all owned monitors.
    deleted: Mutex<HashSet<ObjectKey>>,
    attempts: Mutex<HashMap<ObjectKey, u32>>,
}

impl ResourceController {
    /// Create a controller for one object kind
    pub fn new(
        kind: ObjectKind,
        store: Arc<RulesetStore>,
        source: Arc<dyn ObjectSource>,
        backend: Arc<dyn MonitorBackend>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            kind,
            store,
            source,
            backend,
            queue: WorkQueue::new(),
            settings,
            deleted: Mutex::new(HashSet::new()),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// The object kind this controller reconciles
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Accept one watch event for this controller's kind
    ///
    /// Enqueues the key; bursts of events for the same key coalesce in
    /// the queue. Delete events mark the key for the removal path.
    pub fn handle_event(&self, event: &WatchEvent) {
        let key = event.snapshot.key.clone();
        if key.kind != self.kind {
            warn!(key = %key, controller = %self.kind, "Dropping event routed to the wrong controller");
            return;
        }
        {
            let mut deleted = self.deleted.lock().expect("deleted set poisoned");
            match event.event_type {
                EventType::Delete => {
                    deleted.insert(key.clone());
                }
                EventType::Create | EventType::Update => {
                    deleted.remove(&key);
                }
            }
        }
        debug!(key = %key, event_type = %event.event_type, "Enqueueing work item");
        self.queue.enqueue(key);
    }

    /// Consume the queue until cancelled
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(kind = %self.kind, "Creating controller for resource type");
        while let Some(key) = self.queue.pop(&cancel).await {
            debug!(key = %key, "Processing work item");
            let outcome = self.reconcile(&key).await;
            self.queue.done(&key);
            match outcome {
                Ok(()) => {
                    self.attempts.lock().expect("attempts poisoned").remove(&key);
                    debug!(key = %key, "Reconcile succeeded");
                }
                Err(e) => self.schedule_retry(key, e, &cancel),
            }
        }
        info!(kind = %self.kind, "Controller stopped");
    }

    /// Backoff delay before the given attempt number (1-based)
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.settings
            .base_backoff
            .saturating_mul(factor)
            .min(self.settings.max_backoff)
    }

    fn schedule_retry(self: &Arc<Self>, key: ObjectKey, e: VigilError, cancel: &CancellationToken) {
        let attempt = {
            let mut attempts = self.attempts.lock().expect("attempts poisoned");
            let attempt = attempts.entry(key.clone()).or_insert(0);
            *attempt += 1;
            *attempt
        };

        if attempt >= self.settings.max_attempts {
            error!(
                key = %key,
                attempts = attempt,
                error = %e,
                "Reconcile failed permanently, dropping key"
            );
            self.attempts.lock().expect("attempts poisoned").remove(&key);
            return;
        }

        let delay = self.backoff_delay(attempt);
        warn!(key = %key, attempt = attempt, delay_ms = delay.as_millis() as u64, error = %e, "Reconcile failed, re-queueing with backoff");

        let controller = Arc::clone(self);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    controller.queue.enqueue(key);
                }
            }
        });
    }

    /// One full reconcile for a key: match → render → diff → converge
    async fn reconcile(&self, key: &ObjectKey) -> Result<(), VigilError> {
        if self.deleted.lock().expect("deleted set poisoned").contains(key) {
            self.remove_owned(key).await?;
            self.deleted.lock().expect("deleted set poisoned").remove(key);
            return Ok(());
        }

        let snapshot = self
            .source
            .get(key)
            .await
            .map_err(|e| VigilError::ObjectRead(e.to_string()))?;
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => {
                // Object vanished between the event and processing.
                debug!(key = %key, "Object gone, removing owned monitors");
                return self.remove_owned(key).await;
            }
        };

        let ruleset = self.store.current();
        let object_type = self.kind.as_str();

        let mut templates: Vec<MonitorTemplate> = Vec::new();
        for rule in direct_matches(&ruleset, object_type, &snapshot.annotations) {
            templates.extend(rule.monitors.iter().cloned());
        }
        if self.kind.is_namespaced() {
            let namespace_annotations = self
                .source
                .namespace_annotations(&key.namespace)
                .await
                .map_err(|e| VigilError::ObjectRead(e.to_string()))?;
            templates.extend(bound_matches(&ruleset, &namespace_annotations, object_type));
        }

        let scope = RenderScope::new(&snapshot, &ruleset.cluster_variables);
        let scope_tag = object_scope_tag(&self.settings.owner_tag, key);
        let mut desired = Vec::with_capacity(templates.len());
        for template in &templates {
            let outcome = render(template, &scope);
            for render_error in &outcome.errors {
                warn!(key = %key, monitor = template.name.as_str(), error = %render_error, "Template field failed to render");
            }
            let mut monitor = outcome.monitor;
            monitor.push_tag(self.settings.owner_tag.clone());
            monitor.push_tag(scope_tag.clone());
            desired.push(monitor);
        }

        let provisioned = self.list_object_monitors(key).await?;
        let result = converge(
            self.backend.as_ref(),
            key,
            &desired,
            &provisioned,
            self.settings.dry_run,
        )
        .await;

        match result.failures.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(first),
        }
    }

    /// Remove every monitor this object provisioned
    async fn remove_owned(&self, key: &ObjectKey) -> Result<(), VigilError> {
        let provisioned = self.list_object_monitors(key).await?;
        for monitor in provisioned {
            info!(
                key = %key,
                monitor = monitor.definition.name.as_str(),
                id = monitor.id,
                dry_run = self.settings.dry_run,
                "Deleting monitor for removed object"
            );
            if self.settings.dry_run {
                continue;
            }
            self.backend
                .delete(monitor.id, &monitor.definition.name)
                .await?;
        }
        Ok(())
    }

    /// Monitors owned by this agent and scoped to the given key
    ///
    /// Lists by the owner tag, then filters to the object's scope tag,
    /// so a reconcile can never delete a monitor it never owned.
    async fn list_object_monitors(
        &self,
        key: &ObjectKey,
    ) -> Result<Vec<ProvisionedMonitor>, VigilError> {
        let scope_tag = object_scope_tag(&self.settings.owner_tag, key);
        let owned = self.backend.list_by_tag(&self.settings.owner_tag).await?;
        Ok(owned
            .into_iter()
            .filter(|monitor| monitor.definition.tags.contains(&scope_tag))
            .collect())
    }
}
