// tests/config_load.rs
// Tests that touch process env are #[serial].

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use announce_monitor::config::{
    resolve_config_path, spawn_hot_reload, AppConfig, ConfigHandle, MonitorSettings, Pipeline,
    DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH, ENV_HOT_RELOAD,
};

/// Set/remove env vars for one test, restoring the previous values on drop.
struct EnvSnapshot {
    saved: Vec<(String, Option<String>)>,
}
impl EnvSnapshot {
    fn set(pairs: &[(&str, Option<&str>)]) -> Self {
        let mut saved = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            saved.push((k.to_string(), env::var(k).ok()));
            match v {
                Some(val) => env::set_var(k, val),
                None => env::remove_var(k),
            }
        }
        Self { saved }
    }
}
impl Drop for EnvSnapshot {
    fn drop(&mut self) {
        for (k, v) in self.saved.drain(..) {
            match v {
                Some(v) => env::set_var(&k, v),
                None => env::remove_var(&k),
            }
        }
    }
}

#[test]
fn shipped_config_parses_and_classifies() {
    let cfg = AppConfig::from_toml_str(include_str!("../config/monitor.toml")).unwrap();
    assert_eq!(cfg.monitor, MonitorSettings::default());

    let p = Pipeline::from_config(&cfg);
    assert_eq!(p.tagger.match_tag("币安将下架 DEF/USDT 交易对"), Some("delist"));
    assert_eq!(p.tagger.match_tag("Binance Will List ABC (ABC)"), Some("new"));
    assert_eq!(p.tagger.match_tag("系统维护公告"), Some("maintenance"));
    assert_eq!(p.tagger.match_tag("新用户空投活动开始"), Some("airdrop"));
    assert_eq!(p.tagger.match_tag("这是一个普通公告"), None);
}

#[serial_test::serial]
#[test]
fn config_path_prefers_env() {
    let _env = EnvSnapshot::set(&[(ENV_CONFIG_PATH, None)]);
    assert_eq!(resolve_config_path(), PathBuf::from(DEFAULT_CONFIG_PATH));

    let _env = EnvSnapshot::set(&[(ENV_CONFIG_PATH, Some("/etc/monitor/custom.toml"))]);
    assert_eq!(resolve_config_path(), PathBuf::from("/etc/monitor/custom.toml"));

    let _env = EnvSnapshot::set(&[(ENV_CONFIG_PATH, Some("   "))]);
    assert_eq!(resolve_config_path(), PathBuf::from(DEFAULT_CONFIG_PATH));
}

#[test]
fn missing_or_broken_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert_eq!(AppConfig::load_or_default(&missing), AppConfig::default());
    assert!(AppConfig::from_path(&missing).is_err());

    let broken = dir.path().join("broken.toml");
    fs::write(&broken, "[monitor\ninterval_seconds = ").unwrap();
    assert_eq!(AppConfig::load_or_default(&broken), AppConfig::default());

    // wrong type is as bad as bad syntax
    let typed = dir.path().join("typed.toml");
    fs::write(&typed, "[monitor]\nmax_cycles = \"three\"\n").unwrap();
    assert_eq!(AppConfig::load_or_default(&typed), AppConfig::default());
}

#[test]
fn partial_monitor_section_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitor.toml");
    fs::write(
        &path,
        r#"
[monitor]
max_cycles = 3
interval_seconds = 60
interval_random = 0
history_file = "state/sent.txt"
"#,
    )
    .unwrap();
    let m = AppConfig::load_or_default(&path).monitor;
    assert_eq!((m.max_cycles, m.interval_seconds, m.interval_random), (3, 60, 0));
    assert_eq!(m.history_file, PathBuf::from("state/sent.txt"));
    assert_eq!(m.fetch_limit, 10);
    assert!(m.init_history_on_first_run);
}

#[serial_test::serial]
#[tokio::test]
async fn hot_reload_is_opt_in() {
    let _env = EnvSnapshot::set(&[(ENV_HOT_RELOAD, None)]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitor.toml");
    fs::write(&path, "").unwrap();
    let handle = ConfigHandle::new(Pipeline::from_config(&AppConfig::default())).with_path(path);
    assert!(spawn_hot_reload(handle, Duration::from_millis(10)).is_none());
}

#[serial_test::serial]
#[tokio::test]
async fn hot_reload_picks_up_rule_changes() {
    let _env = EnvSnapshot::set(&[(ENV_HOT_RELOAD, Some("1"))]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitor.toml");
    fs::write(&path, "[[tag_rules]]\ntag = \"delist\"\npatterns = [\"delist\"]\n").unwrap();

    let cfg = AppConfig::from_path(&path).unwrap();
    let handle = ConfigHandle::new(Pipeline::from_config(&cfg)).with_path(path.clone());
    let task = spawn_hot_reload(handle.clone(), Duration::from_millis(10)).unwrap();

    // let the watcher record the initial mtime
    tokio::time::sleep(Duration::from_millis(50)).await;
    fs::write(&path, "[[tag_rules]]\ntag = \"new\"\npatterns = [\"listing\"]\n").unwrap();
    fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();

    let mut reloaded = false;
    for _ in 0..200 {
        if handle.snapshot().tagger.match_tag("New listing") == Some("new") {
            reloaded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    task.abort();
    assert!(reloaded, "watcher should have swapped in the new rules");
    assert_eq!(handle.snapshot().tagger.match_tag("delisting"), None);
}
