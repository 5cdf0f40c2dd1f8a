//! Sync engine
//!
//! Diffs the desired monitor set for one object against the monitors
//! currently provisioned for it and issues the minimal create, update,
//! and delete calls. The engine has no state of its own; it is a pure
//! function of (desired, provisioned) each reconcile, plus the backend
//! calls that apply the plan.
//!
//! The provisioned set passed in must already be scoped to the
//! reconciled object (its scope tag), so a delete here can never touch
//! a monitor another object owns.

use crate::backend::{MonitorBackend, ProvisionedMonitor};
use crate::error::VigilError;
use crate::kube::ObjectKey;
use crate::rules::types::MonitorTemplate;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Tag that scopes a monitor to the object that provisioned it
pub fn object_scope_tag(owner_tag: &str, key: &ObjectKey) -> String {
    format!("{}:object:{}", owner_tag, key)
}

/// Field-for-field equality between a desired and a provisioned definition
///
/// The rendered name is the join key and is not re-compared. Tag lists
/// compare as sets: order is insignificant, values are significant.
/// Replaces generic deep equality so "equal" has a defined meaning.
pub fn definitions_equal(desired: &MonitorTemplate, provisioned: &MonitorTemplate) -> bool {
    let desired_tags: HashSet<&String> = desired.tags.iter().collect();
    let provisioned_tags: HashSet<&String> = provisioned.tags.iter().collect();

    desired.monitor_type == provisioned.monitor_type
        && desired.query == provisioned.query
        && desired.message == provisioned.message
        && desired.escalation_message == provisioned.escalation_message
        && desired.thresholds == provisioned.thresholds
        && desired.options == provisioned.options
        && desired_tags == provisioned_tags
}

/// One backend operation the diff decided on
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOp {
    /// No provisioned monitor shares the desired name
    Create(MonitorTemplate),
    /// A provisioned monitor shares the name but differs; full replace
    Update {
        id: u64,
        definition: MonitorTemplate,
    },
    /// Provisioned for this object but no longer desired
    Delete { id: u64, name: String },
}

/// The computed diff for one reconcile
#[derive(Debug, Default)]
pub struct SyncPlan {
    /// Operations to issue, in create/update/delete order
    pub ops: Vec<SyncOp>,
    /// Desired monitors already converged (no-ops)
    pub unchanged: usize,
}

/// Compute the minimal operation set for one object
///
/// Matching key is the rendered monitor name, exact and case-sensitive.
/// Desired duplicates by name collapse to the first occurrence.
pub fn plan(desired: &[MonitorTemplate], provisioned: &[ProvisionedMonitor]) -> SyncPlan {
    let provisioned_by_name: HashMap<&str, &ProvisionedMonitor> = provisioned
        .iter()
        .map(|monitor| (monitor.definition.name.as_str(), monitor))
        .collect();

    let mut plan = SyncPlan::default();
    let mut desired_names: HashSet<&str> = HashSet::new();

    for definition in desired {
        if !desired_names.insert(definition.name.as_str()) {
            warn!(
                monitor = definition.name.as_str(),
                "Duplicate desired monitor name, keeping first occurrence"
            );
            continue;
        }
        match provisioned_by_name.get(definition.name.as_str()) {
            None => plan.ops.push(SyncOp::Create(definition.clone())),
            Some(existing) if definitions_equal(definition, &existing.definition) => {
                plan.unchanged += 1;
            }
            Some(existing) => plan.ops.push(SyncOp::Update {
                id: existing.id,
                definition: definition.clone(),
            }),
        }
    }

    for monitor in provisioned {
        if !desired_names.contains(monitor.definition.name.as_str()) {
            plan.ops.push(SyncOp::Delete {
                id: monitor.id,
                name: monitor.definition.name.clone(),
            });
        }
    }

    plan
}

/// Outcome of applying a sync plan
#[derive(Debug, Default)]
pub struct SyncResult {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// Write failures, one per failed call; never retried here
    pub failures: Vec<VigilError>,
}

impl SyncResult {
    /// Whether every backend call succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Diff desired against provisioned and apply the result
///
/// Every decision is logged with the object key and monitor name. In
/// dry-run mode the plan is logged and counted but no write is issued.
/// Failures accumulate in the result; retry is the caller's concern.
pub async fn converge(
    backend: &dyn MonitorBackend,
    key: &ObjectKey,
    desired: &[MonitorTemplate],
    provisioned: &[ProvisionedMonitor],
    dry_run: bool,
) -> SyncResult {
    let started = chrono::Utc::now();
    let plan = plan(desired, provisioned);
    let mut result = SyncResult {
        unchanged: plan.unchanged,
        ..Default::default()
    };

    debug!(
        key = %key,
        ops = plan.ops.len(),
        unchanged = plan.unchanged,
        "Computed sync plan"
    );

    for op in plan.ops {
        match op {
            SyncOp::Create(definition) => {
                info!(key = %key, monitor = definition.name.as_str(), dry_run = dry_run, "Creating monitor");
                if dry_run {
                    result.created += 1;
                    continue;
                }
                match backend.create(&definition).await {
                    Ok(_) => result.created += 1,
                    Err(e) => {
                        warn!(key = %key, monitor = definition.name.as_str(), error = %e, "Monitor create failed");
                        result.failures.push(e);
                    }
                }
            }
            SyncOp::Update { id, definition } => {
                info!(key = %key, monitor = definition.name.as_str(), id = id, dry_run = dry_run, "Updating monitor");
                if dry_run {
                    result.updated += 1;
                    continue;
                }
                match backend.update(id, &definition).await {
                    Ok(()) => result.updated += 1,
                    Err(e) => {
                        warn!(key = %key, monitor = definition.name.as_str(), error = %e, "Monitor update failed");
                        result.failures.push(e);
                    }
                }
            }
            SyncOp::Delete { id, name } => {
                info!(key = %key, monitor = name.as_str(), id = id, dry_run = dry_run, "Deleting monitor");
                if dry_run {
                    result.deleted += 1;
                    continue;
                }
                match backend.delete(id, &name).await {
                    Ok(()) => result.deleted += 1,
                    Err(e) => {
                        warn!(key = %key, monitor = name.as_str(), error = %e, "Monitor delete failed");
                        result.failures.push(e);
                    }
                }
            }
        }
    }

    let elapsed = chrono::Utc::now() - started;
    info!(
        key = %key,
        created = result.created,
        updated = result.updated,
        deleted = result.deleted,
        unchanged = result.unchanged,
        failures = result.failures.len(),
        elapsed_ms = elapsed.num_milliseconds(),
        "Sync complete"
    );
    result
}
