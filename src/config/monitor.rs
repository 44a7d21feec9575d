// src/config/monitor.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::filter::FilterPolicy;
use crate::tagger::TagRule;

pub const ENV_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/monitor.toml";
pub const DEFAULT_HISTORY_FILE: &str = "feishu_sent_history.txt";

/// Whole config file. Every section is optional and defaults on its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub filter: FilterPolicy,
    #[serde(default)]
    pub tag_rules: Vec<TagRule>,
}

/// `[monitor]` section: timing and sizing of the polling loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorSettings {
    pub init_history_on_first_run: bool,
    /// 0 = run until stopped.
    pub max_cycles: u64,
    pub interval_seconds: u64,
    /// Jitter: each sleep is `interval_seconds ± interval_random`.
    pub interval_random: u64,
    /// Per source, per cycle.
    pub fetch_limit: usize,
    /// Seconds to wait after each successful delivery.
    pub notify_delay: f64,
    pub fetch_concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub send_timeout_secs: u64,
    pub history_file: PathBuf,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            init_history_on_first_run: true,
            max_cycles: 0,
            interval_seconds: 600,
            interval_random: 50,
            fetch_limit: 10,
            notify_delay: 1.0,
            fetch_concurrency: 4,
            fetch_timeout_secs: 30,
            send_timeout_secs: 10,
            history_file: PathBuf::from(DEFAULT_HISTORY_FILE),
        }
    }
}

impl MonitorSettings {
    pub fn notify_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.notify_delay).unwrap_or_default()
    }

    fn sanitize(&mut self) {
        self.fetch_limit = self.fetch_limit.max(1);
        self.fetch_concurrency = self.fetch_concurrency.max(1);
        self.fetch_timeout_secs = self.fetch_timeout_secs.max(1);
        self.send_timeout_secs = self.send_timeout_secs.max(1);
        if !self.notify_delay.is_finite() || self.notify_delay < 0.0 {
            self.notify_delay = 0.0;
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s)?;
        cfg.monitor.sanitize();
        Ok(cfg)
    }

    /// Strict load: a missing or malformed file is an error.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading monitor config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing monitor config {}", path.display()))
    }

    /// Startup load: any problem falls back to defaults with a warning.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            warn!(target: "monitor", path = %path.display(), "config file missing, using defaults");
            return Self::default();
        }
        match Self::from_path(path) {
            Ok(cfg) => {
                info!(
                    target: "monitor",
                    path = %path.display(),
                    rules = cfg.tag_rules.len(),
                    allowed_tags = ?cfg.filter.allowed_tags,
                    allow_no_tag = cfg.filter.allow_no_tag,
                    "config loaded"
                );
                cfg
            }
            Err(e) => {
                warn!(target: "monitor", error = %format!("{e:#}"), "config unreadable, using defaults");
                Self::default()
            }
        }
    }
}

/// `$MONITOR_CONFIG_PATH`, else `config/monitor.toml`.
pub fn resolve_config_path() -> PathBuf {
    std::env::var(ENV_CONFIG_PATH)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
