// src/error.rs
//! Error taxonomy for the monitor pipeline.
//!
//! Per-source and per-record variants are caught at the aggregator/scheduler
//! boundary and folded into cycle statistics. `Store` raised while loading the
//! history is fatal at startup.

use thiserror::Error;

pub use crate::notify::store::StoreError;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("source {source_name} failed: {reason}")]
    SourceFetch { source_name: String, reason: String },

    #[error("source {source_name} timed out after {secs}s")]
    SourceTimeout { source_name: String, secs: u64 },

    #[error("delivery failed: {0:#}")]
    Delivery(anyhow::Error),

    #[error("delivery timed out after {secs}s")]
    DeliveryTimeout { secs: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("config: {0}")]
    Config(String),
}

impl MonitorError {
    /// True for errors scoped to a single record (the record stays retryable).
    pub fn is_delivery(&self) -> bool {
        matches!(self, Self::Delivery(_) | Self::DeliveryTimeout { .. })
    }
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
