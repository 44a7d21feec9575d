//! Wipe the delivery history so every announcement counts as unseen again.
//! Pass `--yes` to skip the prompt.

use std::io::Write;
use std::sync::Arc;

use announce_monitor::config::{resolve_config_path, AppConfig};
use announce_monitor::notify::{FileStore, LogSink};
use announce_monitor::DedupNotifier;

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    announce_monitor::init_tracing();

    let cfg = AppConfig::load_or_default(&resolve_config_path());
    let mut notifier = DedupNotifier::open(Arc::new(LogSink), FileStore::new(&cfg.monitor.history_file))?;
    let stats = notifier.stats();

    let confirmed = std::env::args().any(|a| a == "--yes") || {
        print!("clear {} fingerprints from {}? [y/N] ", stats.total_sent, stats.location);
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        matches!(answer.trim(), "y" | "Y" | "yes")
    };
    if !confirmed {
        println!("aborted");
        return Ok(());
    }

    notifier.clear_history()?;
    println!("cleared {} fingerprints", stats.total_sent);
    Ok(())
}
