// src/ingest/scheduler.rs
//! Polling loop: `Init -> Bootstrap -> (Cycle -> Sleep)* -> Stopped`.
//!
//! Cycles never overlap. Delivery runs sequentially on the scheduler task,
//! which makes it the only writer of the delivered log. Sleeping goes through
//! an injectable [`Sleeper`] and is cut short by a [`StopSignal`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use metrics::{counter, gauge};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;

use crate::config::{ConfigHandle, MonitorSettings};
use crate::ingest::{Aggregated, Aggregator};
use crate::model::Announcement;
use crate::notify::store::StoreError;
use crate::notify::{DedupNotifier, NotifyOutcome};

#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, d: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}

/// Sending half of the stop channel.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half; cheap to clone.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
    _keepalive: Option<Arc<watch::Sender<bool>>>,
}

pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (
        StopHandle { tx: Arc::new(tx) },
        StopSignal {
            rx,
            _keepalive: None,
        },
    )
}

impl StopSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _keepalive: Some(Arc::new(tx)),
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once stop was requested. Pends forever if every handle is gone.
    pub async fn stopped(&mut self) {
        let fired = self.rx.wait_for(|s| *s).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Init,
    Bootstrap,
    Cycle,
    Sleep,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    CycleLimit,
    Signal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub fetched: usize,
    pub delivered: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub source_errors: usize,
}

impl CycleStats {
    fn add(&mut self, other: &CycleStats) {
        self.fetched += other.fetched;
        self.delivered += other.delivered;
        self.filtered += other.filtered;
        self.duplicates += other.duplicates;
        self.failed += other.failed;
        self.source_errors += other.source_errors;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub stopped_by: StopReason,
    pub totals: CycleStats,
}

pub struct Scheduler {
    settings: MonitorSettings,
    aggregator: Aggregator,
    config: ConfigHandle,
    notifier: DedupNotifier,
    sleeper: Arc<dyn Sleeper>,
    stop: StopSignal,
    rng: StdRng,
    state: SchedulerState,
    cycles: u64,
    totals: CycleStats,
}

impl Scheduler {
    pub fn new(
        settings: MonitorSettings,
        aggregator: Aggregator,
        config: ConfigHandle,
        notifier: DedupNotifier,
    ) -> Self {
        Self {
            settings,
            aggregator,
            config,
            notifier,
            sleeper: Arc::new(TokioSleeper),
            stop: StopSignal::never(),
            rng: StdRng::from_os_rng(),
            state: SchedulerState::Init,
            cycles: 0,
            totals: CycleStats::default(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Deterministic jitter for tests.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn notifier(&self) -> &DedupNotifier {
        &self.notifier
    }

    /// `interval_seconds ± interval_random`, drawn fresh on every call.
    pub fn next_wait(&mut self) -> Duration {
        let base = self.settings.interval_seconds as i64;
        let jitter = self.settings.interval_random as i64;
        let delta = if jitter > 0 {
            self.rng.random_range(-jitter..=jitter)
        } else {
            0
        };
        Duration::from_secs((base + delta).max(0) as u64)
    }

    /// Sleep unless stopped first. Returns true when the stop signal won.
    async fn pause(&mut self, d: Duration) -> bool {
        if self.stop.is_stopped() {
            return true;
        }
        let sleeper = Arc::clone(&self.sleeper);
        let interrupted = tokio::select! {
            _ = sleeper.sleep(d) => false,
            _ = self.stop.stopped() => true,
        };
        interrupted || self.stop.is_stopped()
    }

    /// Aggregate all sources, or `None` if stopped while waiting on them.
    async fn fetch(&mut self) -> Option<Aggregated> {
        let limit = self.settings.fetch_limit;
        tokio::select! {
            out = self.aggregator.fetch_all(limit) => Some(out),
            _ = self.stop.stopped() => None,
        }
    }

    /// Seed the delivered set from the current backlog without delivering.
    pub async fn bootstrap(&mut self) -> Result<usize, StoreError> {
        self.state = SchedulerState::Bootstrap;
        let Some(agg) = self.fetch().await else {
            return Ok(0);
        };
        let pipeline = self.config.snapshot();
        let tagged: Vec<Announcement> = agg
            .records
            .into_iter()
            .map(|raw| pipeline.tagger.tag(raw))
            .collect();
        tracing::info!(target: "monitor", fetched = tagged.len(), "bootstrap fetched backlog");
        self.notifier.initial_hashes(&tagged)
    }

    /// One fetch -> tag -> filter -> notify pass.
    pub async fn run_once(&mut self) -> CycleStats {
        self.state = SchedulerState::Cycle;
        crate::metrics::ensure_described();
        let mut stats = CycleStats::default();

        // one snapshot for the whole cycle
        let pipeline = self.config.snapshot();

        let Some(agg) = self.fetch().await else {
            return stats;
        };
        stats.fetched = agg.records.len();
        stats.source_errors = agg.failed_sources();

        let delay = self.settings.notify_delay();
        for raw in agg.records {
            if self.stop.is_stopped() {
                break;
            }
            let ann = pipeline.tagger.tag(raw);
            if !pipeline.filter.should_notify(&ann) {
                stats.filtered += 1;
                continue;
            }
            match self.notifier.notify(&ann).await {
                Ok(NotifyOutcome::Delivered) => {
                    stats.delivered += 1;
                    if !delay.is_zero() && self.pause(delay).await {
                        break;
                    }
                }
                Ok(NotifyOutcome::Duplicate) => stats.duplicates += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(
                        target: "monitor",
                        exchange = %ann.exchange,
                        title = %ann.title,
                        error = %e,
                        "notify failed"
                    );
                }
            }
        }

        self.cycles += 1;
        self.totals.add(&stats);
        self.record_cycle(&stats);
        stats
    }

    fn record_cycle(&self, stats: &CycleStats) {
        counter!("monitor_cycles_total").increment(1);
        counter!("monitor_delivered_total").increment(stats.delivered as u64);
        counter!("monitor_filtered_total").increment(stats.filtered as u64);
        counter!("monitor_duplicate_total").increment(stats.duplicates as u64);
        counter!("monitor_failed_total").increment(stats.failed as u64);
        gauge!("monitor_last_cycle_ts").set(chrono::Utc::now().timestamp() as f64);

        let history = self.notifier.stats();
        gauge!("monitor_history_size").set(history.total_sent as f64);
        tracing::info!(
            target: "monitor",
            cycle = self.cycles,
            fetched = stats.fetched,
            delivered = stats.delivered,
            filtered = stats.filtered,
            duplicates = stats.duplicates,
            failed = stats.failed,
            source_errors = stats.source_errors,
            total_sent = history.total_sent,
            "cycle finished"
        );
    }

    /// Bootstrap (when enabled), then cycle until the cycle limit or a stop signal.
    pub async fn run(&mut self) -> RunSummary {
        if self.settings.init_history_on_first_run {
            if let Err(e) = self.bootstrap().await {
                tracing::warn!(target: "monitor", error = %e, "bootstrap could not persist history");
            }
        } else {
            tracing::info!(target: "monitor", "bootstrap disabled; first cycle may deliver backlog");
        }

        let stopped_by = loop {
            if self.stop.is_stopped() {
                break StopReason::Signal;
            }
            self.run_once().await;
            if self.stop.is_stopped() {
                break StopReason::Signal;
            }

            let max = self.settings.max_cycles;
            if max > 0 && self.cycles >= max {
                tracing::info!(target: "monitor", cycles = self.cycles, "cycle limit reached");
                break StopReason::CycleLimit;
            }

            self.state = SchedulerState::Sleep;
            let wait = self.next_wait();
            let next_at = Local::now() + chrono::Duration::seconds(wait.as_secs() as i64);
            tracing::info!(
                target: "monitor",
                wait_secs = wait.as_secs(),
                next_at = %next_at.format("%Y-%m-%d %H:%M:%S"),
                "sleeping"
            );
            if self.pause(wait).await {
                break StopReason::Signal;
            }
        };

        self.state = SchedulerState::Stopped;
        let summary = RunSummary {
            cycles: self.cycles,
            stopped_by,
            totals: self.totals,
        };
        tracing::info!(
            target: "monitor",
            cycles = summary.cycles,
            stopped_by = ?summary.stopped_by,
            delivered = summary.totals.delivered,
            total_sent = self.notifier.stats().total_sent,
            "monitor stopped"
        );
        summary
    }
}
