use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{self, Duration};
use tracing::info;

#[derive(Debug, Default)]
pub struct StatsCollector {
    tiles_scanned: AtomicU64,
    channels_matched: AtomicU64,
    suppressed: AtomicU64,
    suppression_failed: AtomicU64,
    hidden: AtomicU64,
    discovery_runs: AtomicU64,
    watchers_attached: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub tiles_scanned: u64,
    pub channels_matched: u64,
    pub suppressed: u64,
    pub suppression_failed: u64,
    pub hidden: u64,
    pub discovery_runs: u64,
    pub watchers_attached: u64,
}

impl StatsCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Also spawns a task that dumps the counters every `log_interval_sec`.
    pub fn with_dump(log_interval_sec: u64) -> Arc<Self> {
        let stats = Self::new();
        let stats_clone = stats.clone();
        let interval = Duration::from_secs(log_interval_sec.max(1));
        tokio::spawn(async move {
            stats_clone.run_logger(interval).await;
        });
        stats
    }

    pub fn inc_scanned(&self) {
        self.tiles_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_matched(&self) {
        self.channels_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_suppression_failed(&self) {
        self.suppression_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_hidden(&self) {
        self.hidden.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_discovery_runs(&self) {
        self.discovery_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_watchers_attached(&self) {
        self.watchers_attached.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tiles_scanned: self.tiles_scanned.load(Ordering::Relaxed),
            channels_matched: self.channels_matched.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            suppression_failed: self.suppression_failed.load(Ordering::Relaxed),
            hidden: self.hidden.load(Ordering::Relaxed),
            discovery_runs: self.discovery_runs.load(Ordering::Relaxed),
            watchers_attached: self.watchers_attached.load(Ordering::Relaxed),
        }
    }

    async fn run_logger(&self, every: Duration) {
        let mut interval = time::interval(every);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.dump_stats();
        }
    }

    fn dump_stats(&self) {
        let s = self.get_snapshot();
        info!(
            "STATS DUMP: Scanned: {}, Matched: {} ({:.1}%), Suppressed: {}, Failed: {}, Hidden: {}, Discovery runs: {}, Watchers: {}",
            s.tiles_scanned,
            s.channels_matched,
            if s.tiles_scanned > 0 {
                (s.channels_matched as f64 / s.tiles_scanned as f64) * 100.0
            } else {
                0.0
            },
            s.suppressed,
            s.suppression_failed,
            s.hidden,
            s.discovery_runs,
            s.watchers_attached
        );
    }
}
