//! Vigil - cluster monitor manager
//!
//! Main entry point. Wires the ruleset store, the monitor backend, the
//! snapshot cache, and the per-kind controllers together, then pumps
//! watch events from stdin (one JSON event per line, as emitted by the
//! watch sidecar) into the supervisor until shutdown.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vigil::backend::DatadogBackend;
use vigil::cli::Cli;
use vigil::config::Config;
use vigil::controller::{ControllerSettings, Supervisor};
use vigil::kube::{ObjectKind, SnapshotCache, WatchEvent};
use vigil::rules::RulesetStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose, cli.json_logs);

    let config = Config::from_cli(cli);
    config.validate()?;
    info!(
        owner = config.owner_tag.as_str(),
        sources = config.definitions.len(),
        dry_run = config.dry_run,
        "Starting vigil"
    );

    let store =
        RulesetStore::with_variables(config.definitions.clone(), config.base_variables()).await?;

    let backend = Arc::new(DatadogBackend::new(
        &config.api_url,
        config.api_key.clone().unwrap_or_default(),
        config.app_key.clone().unwrap_or_default(),
    )?);

    let cache = Arc::new(SnapshotCache::new());
    let settings = ControllerSettings {
        owner_tag: config.owner_tag.clone(),
        dry_run: config.dry_run,
        ..ControllerSettings::default()
    };
    let supervisor = Arc::new(Supervisor::new(
        &ObjectKind::ALL,
        Arc::clone(&store),
        Arc::clone(&cache) as Arc<dyn vigil::kube::ObjectSource>,
        backend,
        settings,
    ));
    let cancel = supervisor.cancellation_token();

    let reload = store.spawn_reload_task(config.reload_interval, cancel.clone());
    let intake = tokio::spawn(pump_watch_events(
        Arc::clone(&cache),
        Arc::clone(&supervisor),
        cancel.clone(),
    ));
    let runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    supervisor.shutdown();

    runner.await?;
    intake.await?;
    reload.await?;
    info!("Shutdown complete");
    Ok(())
}

/// Read newline-delimited watch events from stdin
///
/// Each event updates the snapshot cache before it is dispatched, so a
/// controller that reconciles immediately sees the state that caused
/// the event. Malformed lines are logged and skipped; EOF stops the
/// intake but leaves the controllers draining their queues.
async fn pump_watch_events(
    cache: Arc<SnapshotCache>,
    supervisor: Arc<Supervisor>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<WatchEvent>(&line) {
                    Ok(event) => {
                        cache.apply(&event);
                        supervisor.dispatch(&event);
                    }
                    Err(e) => warn!(error = %e, "Skipping malformed watch event"),
                }
            }
            Ok(None) => {
                info!("Watch event stream closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed reading watch event stream");
                break;
            }
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool, json_logs: bool) {
    let default = if verbose { "vigil=debug" } else { "vigil=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
