//! Announcement monitor binary.
//! Loads config, opens the delivery history, wires sources and the sink, and
//! runs the scheduler until the cycle limit or Ctrl-C / SIGTERM.
//!
//! Env:
//! - `MONITOR_CONFIG_PATH`  config file (default `config/monitor.toml`)
//! - `FEISHU_WEBHOOK_URL`   bot webhook (required unless dry run)
//! - `MONITOR_DRY_RUN=1`    log instead of delivering
//! - `MONITOR_ONCE=1`       bootstrap an empty history, then a single cycle
//! - `MONITOR_HOT_RELOAD=1` reload tag rules/filter when the file changes
//! - `METRICS_ADDR`         serve Prometheus metrics, e.g. `0.0.0.0:9100`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use announce_monitor::config::{resolve_config_path, spawn_hot_reload, AppConfig, ConfigHandle, Pipeline};
use announce_monitor::ingest::providers::{BinanceSource, OkxSource};
use announce_monitor::metrics::Metrics;
use announce_monitor::notify::{FeishuSink, FileStore, LogSink};
use announce_monitor::{
    stop_channel, AnnouncementSource, Aggregator, DedupNotifier, Scheduler, Sink, StopHandle,
};

fn env_flag(name: &str) -> bool {
    std::env::var(name).ok().is_some_and(|v| v == "1")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    announce_monitor::init_tracing();

    if let Err(e) = Metrics::serve_from_env() {
        tracing::warn!(target: "monitor", error = %format!("{e:#}"), "metrics exporter disabled");
    }

    // --- INIT ---
    let path = resolve_config_path();
    let cfg = AppConfig::load_or_default(&path);
    let settings = cfg.monitor.clone();

    let send_timeout = Duration::from_secs(settings.send_timeout_secs);
    let sink: Arc<dyn Sink> = if env_flag("MONITOR_DRY_RUN") {
        tracing::warn!(target: "monitor", "dry run: announcements are logged, not delivered");
        Arc::new(LogSink)
    } else {
        // per-request budget leaves room for retries inside the delivery timeout
        let per_request = (settings.send_timeout_secs / 3).max(1);
        Arc::new(FeishuSink::from_env()?.with_timeout(per_request))
    };

    let notifier = DedupNotifier::open(sink, FileStore::new(&settings.history_file))
        .context("loading delivery history")?
        .with_send_timeout(send_timeout);
    let history = notifier.stats();
    tracing::info!(
        target: "monitor",
        total_sent = history.total_sent,
        location = %history.location,
        "delivery history ready"
    );

    let fetch_timeout = Duration::from_secs(settings.fetch_timeout_secs);
    let sources: Vec<Arc<dyn AnnouncementSource>> = vec![
        Arc::new(BinanceSource::from_http(fetch_timeout)?),
        Arc::new(OkxSource::from_http(fetch_timeout)?),
    ];
    let aggregator = Aggregator::new(sources)
        .with_concurrency(settings.fetch_concurrency)
        .with_fetch_timeout(fetch_timeout);
    tracing::info!(target: "monitor", sources = ?aggregator.source_names(), "sources configured");

    let handle = ConfigHandle::new(Pipeline::from_config(&cfg)).with_path(path);
    spawn_hot_reload(handle.clone(), Duration::from_secs(2));

    let (stop, signal) = stop_channel();
    spawn_signal_listener(stop, handle.clone());

    let once = env_flag("MONITOR_ONCE");
    let init_history = settings.init_history_on_first_run;
    let mut scheduler = Scheduler::new(settings, aggregator, handle, notifier).with_stop(signal);

    if once {
        if init_history && scheduler.notifier().stats().total_sent == 0 {
            let seeded = scheduler.bootstrap().await.context("seeding history")?;
            tracing::info!(target: "monitor", seeded, "first run: history seeded");
        }
        let stats = scheduler.run_once().await;
        tracing::info!(target: "monitor", ?stats, "single cycle done");
    } else {
        scheduler.run().await;
    }
    Ok(())
}

/// Ctrl-C / SIGTERM stop the scheduler; SIGHUP reloads tag rules and filter.
fn spawn_signal_listener(stop: StopHandle, handle: ConfigHandle) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let (Ok(mut term), Ok(mut hup)) =
                (signal(SignalKind::terminate()), signal(SignalKind::hangup()))
            else {
                tracing::warn!(target: "monitor", "unix signal handlers unavailable; Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
                stop.stop();
                return;
            };
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = term.recv() => break,
                    _ = hup.recv() => {
                        let _ = handle.reload_config();
                    }
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = handle;
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::info!(target: "monitor", "stop signal received, finishing current step");
        stop.stop();
    });
}
