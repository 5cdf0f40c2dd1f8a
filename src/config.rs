//! Application configuration
//!
//! Assembled from the parsed CLI (which itself falls back to the
//! deployment environment variables) and validated before anything
//! else starts. Missing backend credentials are not fatal: the agent
//! downgrades itself to dry-run so a cluster rollout without secrets
//! still surfaces the plan it would apply.

use crate::cli::Cli;
use crate::error::{Result, VigilError};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Runtime configuration for the agent
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend API key, absent in dry-run deployments
    pub api_key: Option<String>,
    /// Backend application key, absent in dry-run deployments
    pub app_key: Option<String>,
    /// Backend API base URL
    pub api_url: String,
    /// Tag stamped on every monitor this instance owns
    pub owner_tag: String,
    /// Cluster name, exposed to templates as `cluster.name`
    pub cluster_name: Option<String>,
    /// Ruleset sources in merge order
    pub definitions: Vec<String>,
    /// Interval between ruleset reloads
    pub reload_interval: Duration,
    /// When set, planned changes are logged but never applied
    pub dry_run: bool,
}

impl Config {
    /// Build the configuration from parsed CLI arguments
    ///
    /// If either backend key is missing the agent cannot authenticate,
    /// so `dry_run` is forced on with a warning rather than failing.
    pub fn from_cli(cli: Cli) -> Self {
        let mut dry_run = cli.dry_run;
        if cli.api_key.is_none() || cli.app_key.is_none() {
            warn!("Backend API keys are not set, running in dry-run mode");
            dry_run = true;
        }

        Self {
            api_key: cli.api_key,
            app_key: cli.app_key,
            api_url: cli.api_url,
            owner_tag: cli.owner_tag,
            cluster_name: cli.cluster_name,
            definitions: cli.definitions,
            reload_interval: Duration::from_secs(cli.reload_interval_secs),
            dry_run,
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Config`] when the owner tag is empty, no
    /// ruleset source is configured, the reload interval is zero, or
    /// the API URL does not parse.
    pub fn validate(&self) -> Result<()> {
        if self.owner_tag.trim().is_empty() {
            return Err(VigilError::Config("owner tag must not be empty".to_string()).into());
        }
        if self.definitions.is_empty() {
            return Err(
                VigilError::Config("at least one ruleset source is required".to_string()).into(),
            );
        }
        if self.reload_interval.is_zero() {
            return Err(
                VigilError::Config("reload interval must be greater than zero".to_string()).into(),
            );
        }
        Url::parse(&self.api_url).map_err(|e| {
            VigilError::Config(format!("invalid API URL {:?}: {}", self.api_url, e))
        })?;
        Ok(())
    }

    /// Variables injected below every ruleset source's own definitions
    ///
    /// Currently just `cluster.name`; documents may override it.
    pub fn base_variables(&self) -> HashMap<String, String> {
        let mut variables = HashMap::new();
        if let Some(name) = &self.cluster_name {
            variables.insert("name".to_string(), name.clone());
        }
        variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;

    fn config_from(args: &[&str]) -> Config {
        Config::from_cli(Cli::parse_from(args))
    }

    #[test]
    #[serial]
    fn test_missing_keys_force_dry_run() {
        let config = config_from(&["vigil"]);
        assert!(config.dry_run);
    }

    #[test]
    #[serial]
    fn test_keys_present_keeps_live_mode() {
        let config = config_from(&["vigil", "--api-key", "k", "--app-key", "a"]);
        assert!(!config.dry_run);
    }

    #[test]
    #[serial]
    fn test_explicit_dry_run_survives_keys() {
        let config = config_from(&["vigil", "--api-key", "k", "--app-key", "a", "--dry-run"]);
        assert!(config.dry_run);
    }

    #[test]
    #[serial]
    fn test_validate_defaults() {
        let config = config_from(&["vigil", "--api-key", "k", "--app-key", "a"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_validate_rejects_empty_owner_tag() {
        let config = config_from(&["vigil", "--owner-tag", " "]);
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_validate_rejects_bad_api_url() {
        let config = config_from(&["vigil", "--api-url", "not a url"]);
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_validate_rejects_zero_reload_interval() {
        let config = config_from(&["vigil", "--reload-interval-secs", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_base_variables_carry_cluster_name() {
        let config = config_from(&["vigil", "--cluster-name", "prod-east"]);
        assert_eq!(
            config.base_variables().get("name"),
            Some(&"prod-east".to_string())
        );

        let config = config_from(&["vigil"]);
        assert!(config.base_variables().is_empty());
    }
}
