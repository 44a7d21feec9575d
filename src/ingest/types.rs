// src/ingest/types.rs
use anyhow::Result;

use crate::model::RawAnnouncement;

/// One announcement feed. Implementations should recover from partial
/// failures internally and only return `Err` when nothing could be fetched.
#[async_trait::async_trait]
pub trait AnnouncementSource: Send + Sync {
    /// Up to `limit` announcements, newest first (best effort).
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<RawAnnouncement>>;
    fn name(&self) -> &str;
}

/// Per-source outcome of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    pub fetched: usize,
    pub error: Option<String>,
}
