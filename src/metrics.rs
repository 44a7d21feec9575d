// src/metrics.rs
use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::net::SocketAddr;

pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";

/// One-time metrics registration (so series show up in the exposition).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_fetched_total", "Announcements returned by all sources.");
        describe_counter!(
            "monitor_source_errors_total",
            "Source fetch failures and timeouts, by source."
        );
        describe_counter!("monitor_delivered_total", "Announcements delivered to the sink.");
        describe_counter!("monitor_filtered_total", "Announcements dropped by the tag filter.");
        describe_counter!(
            "monitor_duplicate_total",
            "Announcements skipped because they were already delivered."
        );
        describe_counter!("monitor_failed_total", "Announcements whose delivery failed.");
        describe_counter!("monitor_cycles_total", "Completed monitor cycles.");
        describe_histogram!("monitor_fetch_ms", "Per-source fetch time in milliseconds.");
        describe_gauge!("monitor_last_cycle_ts", "Unix ts when the last cycle finished.");
        describe_gauge!("monitor_history_size", "Fingerprints in the delivered set.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder without a listener; render via `handle`.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    /// Install the recorder and serve `/metrics` on `addr`. Needs a tokio runtime.
    pub fn serve(addr: SocketAddr) -> Result<()> {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .with_context(|| format!("prometheus: listen on {addr}"))?;
        ensure_described();
        tracing::info!(target: "monitor", %addr, "metrics exporter listening");
        Ok(())
    }

    /// Serve metrics when `METRICS_ADDR` is set; otherwise metrics are no-ops.
    pub fn serve_from_env() -> Result<()> {
        match std::env::var(ENV_METRICS_ADDR) {
            Ok(raw) if !raw.trim().is_empty() => {
                let addr: SocketAddr = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{ENV_METRICS_ADDR}={raw} is not a socket address"))?;
                Self::serve(addr)
            }
            _ => Ok(()),
        }
    }
}
