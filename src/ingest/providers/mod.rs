// src/ingest/providers/mod.rs
pub mod binance;
pub mod okx;

pub use binance::BinanceSource;
pub use okx::OkxSource;

pub(crate) const BROWSER_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
