// src/config/mod.rs
//! Monitor configuration plus a shared, swappable snapshot of the
//! classification pipeline (tag rules + filter).
//!
//! A cycle takes one `Arc<Pipeline>` snapshot when it starts and keeps it to
//! the end, so a concurrent reload never tears rule/filter state mid-cycle.

pub mod monitor;

pub use monitor::{
    resolve_config_path, AppConfig, MonitorSettings, DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH,
};

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use crate::error::{MonitorError, Result};
use crate::filter::AnnouncementFilter;
use crate::tagger::Tagger;

pub const ENV_HOT_RELOAD: &str = "MONITOR_HOT_RELOAD";

#[derive(Debug)]
pub struct Pipeline {
    pub tagger: Tagger,
    pub filter: AnnouncementFilter,
}

impl Pipeline {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            tagger: Tagger::new(&cfg.tag_rules),
            filter: AnnouncementFilter::new(cfg.filter.clone()),
        }
    }
}

#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<Pipeline>>>,
    path: Option<PathBuf>,
}

impl ConfigHandle {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(pipeline))),
            path: None,
        }
    }

    /// File that `reload_config` re-reads.
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    pub fn snapshot(&self) -> Arc<Pipeline> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace(&self, pipeline: Pipeline) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(pipeline);
    }

    /// Re-read rules and filter from disk. On any error the previous
    /// snapshot stays in place. Monitor timing settings are not reloaded.
    pub fn reload_config(&self) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| MonitorError::Config("no backing file to reload".into()))?;
        match AppConfig::from_path(&path) {
            Ok(cfg) => {
                let pipeline = Pipeline::from_config(&cfg);
                tracing::info!(
                    target: "monitor",
                    path = %path.display(),
                    rules = pipeline.tagger.rule_count(),
                    "config reloaded"
                );
                self.replace(pipeline);
                Ok(())
            }
            Err(e) => {
                let reason = format!("{e:#}");
                tracing::warn!(target: "monitor", error = %reason, "config reload failed, keeping previous");
                Err(MonitorError::Config(reason))
            }
        }
    }
}

fn hot_reload_enabled() -> bool {
    std::env::var(ENV_HOT_RELOAD)
        .ok()
        .is_some_and(|v| v == "1")
}

/// Poll the backing file's mtime and reload on change (MONITOR_HOT_RELOAD=1).
pub fn spawn_hot_reload(handle: ConfigHandle, poll: Duration) -> Option<tokio::task::JoinHandle<()>> {
    if !hot_reload_enabled() {
        return None;
    }
    let path = handle.path.clone()?;

    Some(tokio::spawn(async move {
        let mut last_mtime: Option<SystemTime> = None;
        loop {
            if let Ok(mtime) = std::fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = match last_mtime {
                    None => false,
                    Some(prev) => mtime > prev,
                };
                last_mtime = Some(mtime);
                if changed {
                    let _ = handle.reload_config();
                }
            }
            tokio::time::sleep(poll).await;
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const V1: &str = r#"
[[tag_rules]]
tag = "delist"
patterns = ["delist"]
"#;

    const V2: &str = r#"
[[tag_rules]]
tag = "new"
patterns = ["listing"]
"#;

    fn handle_for(path: &std::path::Path) -> ConfigHandle {
        let cfg = AppConfig::from_path(path).unwrap();
        ConfigHandle::new(Pipeline::from_config(&cfg)).with_path(path.to_path_buf())
    }

    #[test]
    fn snapshot_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        fs::write(&path, V1).unwrap();
        let handle = handle_for(&path);

        let before = handle.snapshot();
        fs::write(&path, V2).unwrap();
        handle.reload_config().unwrap();

        assert_eq!(before.tagger.match_tag("Delisting"), Some("delist"));
        assert_eq!(handle.snapshot().tagger.match_tag("New listing"), Some("new"));
        assert_eq!(handle.snapshot().tagger.match_tag("Delisting"), None);
    }

    #[test]
    fn failed_reload_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        fs::write(&path, V1).unwrap();
        let handle = handle_for(&path);

        fs::write(&path, "[[tag_rules]\nbroken").unwrap();
        assert!(handle.reload_config().is_err());
        assert_eq!(handle.snapshot().tagger.match_tag("delist"), Some("delist"));
    }

    #[test]
    fn reload_without_path_is_an_error() {
        let handle = ConfigHandle::new(Pipeline::from_config(&AppConfig::default()));
        assert!(handle.reload_config().is_err());
        assert_eq!(handle.snapshot().tagger.rule_count(), 0);
    }
}
