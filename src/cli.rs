//! Command-line interface definition for Vigil
//!
//! This module defines the CLI structure using clap's derive API.
//! Every flag falls back to the environment variable the original
//! deployment manifests set, so the agent runs unchanged in a pod.

use clap::Parser;

/// Vigil - cluster monitor manager
///
/// Watches annotated objects in the cluster and keeps the monitoring
/// backend's monitors converged with the declared rulesets.
#[derive(Parser, Debug, Clone)]
#[command(name = "vigil")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Monitoring backend API key
    #[arg(long, env = "DD_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Monitoring backend application key
    #[arg(long, env = "DD_APP_KEY", hide_env_values = true)]
    pub app_key: Option<String>,

    /// Monitoring backend API base URL
    #[arg(long, env = "DD_API_URL", default_value = "https://api.datadoghq.com")]
    pub api_url: String,

    /// Unique tag identifying the monitors this instance owns
    #[arg(long, env = "OWNER", default_value = "vigil")]
    pub owner_tag: String,

    /// A unique name for the cluster, exposed to templates
    #[arg(long, env = "CLUSTER_NAME")]
    pub cluster_name: Option<String>,

    /// Ruleset sources: local paths or HTTP(S) URLs, `;`-separated
    #[arg(
        long = "definitions",
        env = "DEFINITIONS_PATH",
        value_delimiter = ';',
        default_value = "conf.yml"
    )]
    pub definitions: Vec<String>,

    /// Seconds between ruleset reloads
    #[arg(long, env = "RULESET_RELOAD_INTERVAL", default_value_t = 60)]
    pub reload_interval_secs: u64,

    /// Log planned monitor changes without applying them
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
