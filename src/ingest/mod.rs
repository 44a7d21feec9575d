// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use crate::error::MonitorError;
use crate::ingest::types::{AnnouncementSource, SourceReport};
use crate::model::RawAnnouncement;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Records from one aggregation pass plus a report per source, in source order.
#[derive(Debug, Default)]
pub struct Aggregated {
    pub records: Vec<RawAnnouncement>,
    pub reports: Vec<SourceReport>,
}

impl Aggregated {
    pub fn failed_sources(&self) -> usize {
        self.reports.iter().filter(|r| r.error.is_some()).count()
    }
}

/// Fans `fetch_latest` out over all sources. One failing (or hanging, or
/// panicking) source contributes zero records and never aborts the others.
#[derive(Clone)]
pub struct Aggregator {
    sources: Vec<Arc<dyn AnnouncementSource>>,
    concurrency: usize,
    fetch_timeout: Duration,
}

impl Aggregator {
    pub fn new(sources: Vec<Arc<dyn AnnouncementSource>>) -> Self {
        Self {
            sources,
            concurrency: 4,
            fetch_timeout: Duration::from_secs(30),
        }
    }

    /// Max sources fetched at the same time (at least 1).
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    pub async fn fetch_all(&self, limit: usize) -> Aggregated {
        crate::metrics::ensure_described();
        let limit = limit.max(1);
        let permits = Arc::new(Semaphore::new(self.concurrency));

        let handles: Vec<_> = self
            .sources
            .iter()
            .map(|src| {
                let src = Arc::clone(src);
                let permits = Arc::clone(&permits);
                let timeout = self.fetch_timeout;
                tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await;
                    let t0 = Instant::now();
                    let res = fetch_one(src.as_ref(), limit, timeout).await;
                    histogram!("monitor_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                    res
                })
            })
            .collect();

        let mut out = Aggregated::default();
        for (src, handle) in self.sources.iter().zip(handles) {
            let name = src.name().to_string();
            let res = match handle.await {
                Ok(res) => res,
                Err(e) => Err(MonitorError::SourceFetch {
                    source_name: name.clone(),
                    reason: format!("task aborted: {e}"),
                }),
            };
            match res {
                Ok(mut items) => {
                    items.truncate(limit);
                    tracing::info!(target: "ingest", source = %name, fetched = items.len(), "source fetched");
                    out.reports.push(SourceReport {
                        source: name,
                        fetched: items.len(),
                        error: None,
                    });
                    out.records.append(&mut items);
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", source = %name, error = %e, "source error");
                    counter!("monitor_source_errors_total", "source" => name.clone()).increment(1);
                    out.reports.push(SourceReport {
                        source: name,
                        fetched: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        counter!("monitor_fetched_total").increment(out.records.len() as u64);
        out
    }
}

async fn fetch_one(
    src: &dyn AnnouncementSource,
    limit: usize,
    timeout: Duration,
) -> Result<Vec<RawAnnouncement>, MonitorError> {
    match tokio::time::timeout(timeout, src.fetch_latest(limit)).await {
        Ok(Ok(items)) => Ok(items),
        Ok(Err(e)) => Err(MonitorError::SourceFetch {
            source_name: src.name().to_string(),
            reason: format!("{e:#}"),
        }),
        Err(_) => Err(MonitorError::SourceTimeout {
            source_name: src.name().to_string(),
            secs: timeout.as_secs(),
        }),
    }
}
