//! Ruleset store
//!
//! Owns the merged [`Ruleset`] snapshot shared by all controllers.
//! `current()` is non-blocking and always returns a complete snapshot;
//! `reload()` rebuilds the merge from all sources and publishes it
//! atomically. The store keeps the last-known-good document per source,
//! so one unreachable source never discards its prior contribution.

use crate::error::Result;
use crate::rules::loader::load_source;
use crate::rules::types::{Ruleset, RulesetDocument};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long one source fetch may take before it is skipped
const SOURCE_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Read-mostly store of match rules and monitor templates
///
/// Constructed once at startup and passed by `Arc` to all controllers;
/// the periodic reload is a scheduled task owned by the store with an
/// explicit stop signal tied to process shutdown.
pub struct RulesetStore {
    sources: Vec<String>,
    // Variables defined below every source, e.g. the cluster name from
    // the environment; documents may override them.
    base_variables: HashMap<String, String>,
    client: reqwest::Client,
    current: RwLock<Arc<Ruleset>>,
    // Last successfully parsed document per source; reused when that
    // source fails on a later reload.
    last_good: Mutex<HashMap<String, RulesetDocument>>,
}

impl RulesetStore {
    /// Create the store and perform the first load synchronously
    ///
    /// First-load source failures are logged and skipped like any other
    /// reload; a store over zero reachable sources starts empty.
    pub async fn new(sources: Vec<String>) -> Result<Arc<Self>> {
        Self::with_variables(sources, HashMap::new()).await
    }

    /// Like [`RulesetStore::new`], seeding cluster variables under
    /// every source's own definitions
    pub async fn with_variables(
        sources: Vec<String>,
        base_variables: HashMap<String, String>,
    ) -> Result<Arc<Self>> {
        let client = reqwest::Client::builder()
            .timeout(SOURCE_FETCH_TIMEOUT)
            .build()?;

        let store = Arc::new(Self {
            sources,
            base_variables,
            client,
            current: RwLock::new(Arc::new(Ruleset::default())),
            last_good: Mutex::new(HashMap::new()),
        });
        store.reload().await;
        Ok(store)
    }

    /// The current merged ruleset snapshot
    ///
    /// Never blocks on a concurrent reload and never observes a
    /// partially merged ruleset.
    pub fn current(&self) -> Arc<Ruleset> {
        self.current
            .read()
            .expect("ruleset snapshot lock poisoned")
            .clone()
    }

    /// Re-fetch every source and publish a freshly merged ruleset
    ///
    /// Partial success: a failing source is skipped with a warning and
    /// its last-known-good document is merged instead. Returns the
    /// number of sources that failed this round.
    pub async fn reload(&self) -> usize {
        let mut last_good = self.last_good.lock().await;
        let mut failed = 0;

        for source in &self.sources {
            match load_source(&self.client, source).await {
                Ok(document) => {
                    debug!(source = source.as_str(), rules = document.rules.len(), "Loaded ruleset source");
                    last_good.insert(source.clone(), document);
                }
                Err(e) => {
                    failed += 1;
                    if last_good.contains_key(source) {
                        warn!(source = source.as_str(), error = %e, "Ruleset source failed, keeping last-known-good contribution");
                    } else {
                        warn!(source = source.as_str(), error = %e, "Ruleset source failed and has no prior contribution, skipping");
                    }
                }
            }
        }

        let mut merged = Ruleset {
            cluster_variables: self.base_variables.clone(),
            ..Ruleset::default()
        };
        for source in &self.sources {
            if let Some(document) = last_good.get(source) {
                merged.merge_document(document.clone());
            }
        }

        info!(
            rules = merged.rules.len(),
            variables = merged.cluster_variables.len(),
            failed_sources = failed,
            "Published ruleset snapshot"
        );

        let mut current = self
            .current
            .write()
            .expect("ruleset snapshot lock poisoned");
        *current = Arc::new(merged);
        failed
    }

    /// Spawn the periodic reload task
    ///
    /// Runs until the cancellation token fires. The first tick happens
    /// one interval after startup since `new()` already loaded once.
    pub fn spawn_reload_task(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Consume the immediate first tick.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Ruleset reload task stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        store.reload().await;
                    }
                }
            }
        })
    }
}
