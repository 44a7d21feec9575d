// src/notify/mod.rs
//! Delivery side of the pipeline: the `Sink` contract and the dedup gate
//! that guarantees a sink only sees fingerprints not yet recorded.

pub mod feishu;
pub mod store;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::error::MonitorError;
use crate::model::{Announcement, Fingerprint};
use store::{FingerprintStore, StoreError};

pub use feishu::FeishuSink;
pub use store::{FileStore, MemoryStore};

/// External delivery channel. Need not be idempotent.
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    async fn send(&self, ann: &Announcement) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Dry-run sink: logs what would have been delivered.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait::async_trait]
impl Sink for LogSink {
    async fn send(&self, ann: &Announcement) -> Result<()> {
        info!(
            target: "notify",
            exchange = %ann.exchange,
            tag = ann.tag.as_deref().unwrap_or("-"),
            url = %ann.url,
            "[dry-run] {}",
            ann.title
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered,
    /// Fingerprint already recorded; the sink was not called.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierStats {
    pub total_sent: usize,
    pub location: String,
    pub store_exists: bool,
}

/// Durable, idempotent delivery gate.
///
/// Per fingerprint the state is either unseen or delivered. A fingerprint is
/// persisted only after the sink confirmed delivery, so a crash between the
/// two can re-deliver once on the next run (at-least-once).
pub struct DedupNotifier {
    sink: Arc<dyn Sink>,
    store: Box<dyn FingerprintStore>,
    sent: HashSet<Fingerprint>,
    send_timeout: Duration,
}

impl DedupNotifier {
    pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

    /// Load the delivered set from `store`. A load failure is fatal for the caller.
    pub fn open<S>(sink: Arc<dyn Sink>, mut store: S) -> Result<Self, StoreError>
    where
        S: FingerprintStore + 'static,
    {
        let sent = store.load_all()?;
        Ok(Self {
            sink,
            store: Box::new(store),
            sent,
            send_timeout: Self::DEFAULT_SEND_TIMEOUT,
        })
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.sent.contains(fp)
    }

    pub async fn notify(&mut self, ann: &Announcement) -> Result<NotifyOutcome, MonitorError> {
        let fp = ann.fingerprint();
        if self.sent.contains(&fp) {
            debug!(target: "notify", %fp, title = %ann.title, "already delivered, skipping");
            return Ok(NotifyOutcome::Duplicate);
        }

        match tokio::time::timeout(self.send_timeout, self.sink.send(ann)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(MonitorError::Delivery(e)),
            Err(_) => {
                return Err(MonitorError::DeliveryTimeout {
                    secs: self.send_timeout.as_secs(),
                })
            }
        }

        // Delivered: suppress re-sends in this process even if the append fails.
        // Blocking write + fsync inline: one small line, single writer, and it
        // must finish before the next record is considered.
        let appended = self.store.append(&fp);
        self.sent.insert(fp.clone());
        if let Err(e) = appended {
            warn!(target: "notify", %fp, error = %e, "delivered but not persisted; may repeat after restart");
            return Err(e.into());
        }

        info!(
            target: "notify",
            sink = self.sink.name(),
            exchange = %ann.exchange,
            tag = ann.tag.as_deref().unwrap_or("-"),
            "delivered: {}",
            ann.title
        );
        Ok(NotifyOutcome::Delivered)
    }

    /// Seed the delivered set without calling the sink. Returns how many
    /// fingerprints were new.
    pub fn initial_hashes(&mut self, batch: &[Announcement]) -> Result<usize, StoreError> {
        let mut added = 0usize;
        for ann in batch {
            let fp = ann.fingerprint();
            if self.sent.contains(&fp) {
                continue;
            }
            self.store.append(&fp)?;
            self.sent.insert(fp);
            added += 1;
        }
        info!(target: "notify", added, total = self.sent.len(), "history seeded");
        Ok(added)
    }

    /// Forget every delivered fingerprint, in memory and on disk.
    pub fn clear_history(&mut self) -> Result<(), StoreError> {
        self.sent.clear();
        self.store.truncate()?;
        warn!(target: "notify", location = %self.store.location(), "delivery history cleared");
        Ok(())
    }

    pub fn stats(&self) -> NotifierStats {
        NotifierStats {
            total_sent: self.sent.len(),
            location: self.store.location(),
            store_exists: self.store.exists(),
        }
    }
}
