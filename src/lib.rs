// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod tagger;

// ---- Re-exports for stable public API ----
pub use crate::error::MonitorError;
pub use crate::filter::{AnnouncementFilter, FilterPolicy};
pub use crate::ingest::scheduler::{
    stop_channel, CycleStats, RunSummary, Scheduler, SchedulerState, Sleeper, StopHandle,
    StopReason, StopSignal,
};
pub use crate::ingest::types::AnnouncementSource;
pub use crate::ingest::Aggregator;
pub use crate::model::{Announcement, Fingerprint, RawAnnouncement};
pub use crate::notify::{DedupNotifier, NotifyOutcome, Sink};
pub use crate::tagger::{TagRule, Tagger};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` picks levels (default
/// `info`); `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    // Err only when a subscriber is already installed
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}
