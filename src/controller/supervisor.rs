//! Controller supervisor
//!
//! Starts one resource controller per watched object kind and keeps
//! them running for the process lifetime. Controllers are isolated in
//! their own tasks: one panicking cannot take down its siblings. A
//! cancellation signal stops event intake and lets in-flight reconciles
//! finish.

use crate::backend::MonitorBackend;
use crate::controller::worker::{ControllerSettings, ResourceController};
use crate::kube::{ObjectKind, ObjectSource, WatchEvent};
use crate::rules::RulesetStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Owns the per-kind controllers and routes watch events to them
pub struct Supervisor {
    controllers: HashMap<ObjectKind, Arc<ResourceController>>,
    cancel: CancellationToken,
}

impl Supervisor {
    /// Build one controller per kind in `kinds`
    ///
    /// The namespace kind should always be included: namespace
    /// annotation changes drive binding matches for workload kinds.
    pub fn new(
        kinds: &[ObjectKind],
        store: Arc<RulesetStore>,
        source: Arc<dyn ObjectSource>,
        backend: Arc<dyn MonitorBackend>,
        settings: ControllerSettings,
    ) -> Self {
        let mut controllers = HashMap::new();
        for kind in kinds {
            let controller = ResourceController::new(
                *kind,
                Arc::clone(&store),
                Arc::clone(&source),
                Arc::clone(&backend),
                settings.clone(),
            );
            controllers.insert(*kind, Arc::new(controller));
        }
        Self {
            controllers,
            cancel: CancellationToken::new(),
        }
    }

    /// The token that stops all controllers
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Route one watch event to the controller for its kind
    ///
    /// Events arriving after shutdown began are dropped.
    pub fn dispatch(&self, event: &WatchEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        match self.controllers.get(&event.snapshot.key.kind) {
            Some(controller) => controller.handle_event(event),
            None => {
                warn!(
                    kind = %event.snapshot.key.kind,
                    "No controller configured for event kind, dropping"
                );
            }
        }
    }

    /// Run every controller to completion
    ///
    /// Returns once all controllers have stopped (after
    /// [`Supervisor::shutdown`] or token cancellation). A controller
    /// panic is logged and the siblings keep running.
    pub async fn run(&self) {
        let mut handles = Vec::with_capacity(self.controllers.len());
        for (kind, controller) in &self.controllers {
            info!(kind = %kind, "Starting resource controller task");
            let controller = Arc::clone(controller);
            let cancel = self.cancel.clone();
            handles.push((*kind, tokio::spawn(controller.run(cancel))));
        }

        for (kind, handle) in handles {
            if let Err(e) = handle.await {
                error!(kind = %kind, error = %e, "Controller task failed; sibling controllers unaffected");
            }
        }
    }

    /// Signal all controllers to stop accepting work
    pub fn shutdown(&self) {
        info!("Supervisor shutting down");
        self.cancel.cancel();
    }
}
