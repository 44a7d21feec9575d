//! Classify titles with the configured tag rules and filter, without
//! delivering anything.
//!
//!   cargo run --bin tag_check -- "Binance Will Delist ABC" "上线 XYZ"
//!   cargo run --bin tag_check -- --fetch      # live titles from every source
//!
//! With no arguments, titles are read from stdin, one per line.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use announce_monitor::config::{resolve_config_path, AppConfig, Pipeline};
use announce_monitor::ingest::providers::{BinanceSource, OkxSource};
use announce_monitor::{Aggregator, AnnouncementSource, RawAnnouncement};
use chrono::Local;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    announce_monitor::init_tracing();

    let cfg = AppConfig::load_or_default(&resolve_config_path());
    let pipeline = Pipeline::from_config(&cfg);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let records = if args.iter().any(|a| a == "--fetch") {
        let timeout = Duration::from_secs(cfg.monitor.fetch_timeout_secs);
        let sources: Vec<Arc<dyn AnnouncementSource>> = vec![
            Arc::new(BinanceSource::from_http(timeout)?),
            Arc::new(OkxSource::from_http(timeout)?),
        ];
        let out = Aggregator::new(sources)
            .with_fetch_timeout(timeout)
            .fetch_all(cfg.monitor.fetch_limit)
            .await;
        for r in out.reports.iter().filter(|r| r.error.is_some()) {
            eprintln!("{}: {}", r.source, r.error.as_deref().unwrap_or_default());
        }
        out.records
    } else {
        let mut titles = args;
        if titles.is_empty() {
            for line in std::io::stdin().lock().lines() {
                let line = line?;
                if !line.trim().is_empty() {
                    titles.push(line);
                }
            }
        }
        titles
            .into_iter()
            .map(|title| RawAnnouncement {
                exchange: "cli".into(),
                title,
                time: Local::now().fixed_offset(),
                url: String::new(),
            })
            .collect()
    };

    let mut tagged = 0usize;
    let total = records.len();
    for raw in records {
        let exchange = raw.exchange.clone();
        let ann = pipeline.tagger.tag(raw);
        tagged += usize::from(ann.tag.is_some());
        let verdict = if pipeline.filter.should_notify(&ann) { "notify" } else { "drop" };
        println!(
            "[{exchange}] {} -> {} ({verdict})",
            ann.title,
            ann.tag.as_deref().unwrap_or("<none>")
        );
    }
    println!("{tagged}/{total} titles tagged by {} rules", pipeline.tagger.rule_count());
    Ok(())
}
