//! CLI argument definitions for logcurator-daemon.
//!
//! Uses `clap` v4 derive macros. Flags override the config file and
//! environment variables. List flags are repeated, one item per flag, so an
//! item may contain commas.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;

use logcurator_core::config::LogcuratorConfig;
use logcurator_core::error::{ConfigError, LogcuratorError};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/logcurator/logcurator.toml";

/// logcurator log shipping agent.
///
/// Follows workload or host log files, keeps lines that match the configured
/// keywords and ships them in batches to the collector.
#[derive(Parser, Debug, Default)]
#[command(name = "logcurator-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logcurator.toml. A missing default file falls back to built-in defaults.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Collector URL including scheme and host.
    #[arg(long)]
    pub target_url: Option<String>,

    /// Keyword operator (or, and).
    #[arg(long)]
    pub operator: Option<String>,

    /// Namespaces to collect from.
    #[arg(long)]
    pub namespaces_to_include: Vec<String>,

    /// Namespaces to skip. Wins over the include list.
    #[arg(long)]
    pub namespaces_to_exclude: Vec<String>,

    /// Pod labels to collect from, as key=value.
    #[arg(long)]
    pub pod_labels_to_include: Vec<String>,

    /// Keywords to look for. `4xx` and `5xx` enable status code detection.
    #[arg(long)]
    pub keywords: Vec<String>,

    /// Entries per batch (0 selects the default).
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Configuration identifier.
    #[arg(long)]
    pub configuration_id: Option<String>,

    /// Organisation identifier sent as `Mit-Org-ID`.
    #[arg(long)]
    pub organisation_id: Option<String>,

    /// Subscription identifier sent as `Mit-Subscription-ID`.
    #[arg(long)]
    pub subscription_id: Option<String>,

    /// Payload encryption key (reserved).
    #[arg(long)]
    pub encryption_key: Option<String>,

    /// Collector auth token (reserved).
    #[arg(long)]
    pub auth_token: Option<String>,

    /// Root directory walked in standalone mode.
    #[arg(long)]
    pub path: Option<String>,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut LogcuratorConfig) {
        override_opt(&mut config.general.log_level, &self.log_level);
        override_opt(&mut config.general.log_format, &self.log_format);

        let s = &mut config.streamer;
        override_opt(&mut s.target_url, &self.target_url);
        override_opt(&mut s.operator, &self.operator);
        override_list(&mut s.namespaces_to_include, &self.namespaces_to_include);
        override_list(&mut s.namespaces_to_exclude, &self.namespaces_to_exclude);
        override_list(&mut s.pod_labels_to_include, &self.pod_labels_to_include);
        override_list(&mut s.keywords, &self.keywords);
        if let Some(batch_size) = self.batch_size {
            s.batch_size = batch_size;
        }
        override_opt(&mut s.configuration_id, &self.configuration_id);
        override_opt(&mut s.organisation_id, &self.organisation_id);
        override_opt(&mut s.subscription_id, &self.subscription_id);
        override_opt(&mut s.encryption_key, &self.encryption_key);
        override_opt(&mut s.auth_token, &self.auth_token);
        override_opt(&mut s.path, &self.path);
    }

    /// Load the configuration: defaults, then file, then environment, then flags.
    ///
    /// The result is validated. An explicitly given config file must exist.
    pub async fn load_config(&self) -> Result<LogcuratorConfig> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = match LogcuratorConfig::from_file(&path).await {
            Ok(config) => config,
            Err(LogcuratorError::Config(ConfigError::FileNotFound { .. }))
                if self.config.is_none() =>
            {
                LogcuratorConfig::default()
            }
            Err(e) => return Err(anyhow::anyhow!("failed to load config: {e}")),
        };

        config.apply_env_overrides();
        self.apply_overrides(&mut config);
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {e}"))?;
        Ok(config)
    }

    /// The config path that `load_config` reads.
    pub fn config_path(&self) -> &Path {
        self.config
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH))
    }
}

fn override_opt(target: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        target.clone_from(value);
    }
}

fn override_list(target: &mut Vec<String>, values: &[String]) {
    if !values.is_empty() {
        *target = values.to_vec();
    }
}
