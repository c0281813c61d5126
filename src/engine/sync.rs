use super::matcher::normalize;
use super::store::BlocklistStore;
use super::traits::ListSource;
use crate::storage::{self, Storage, StorageKey};
use anyhow::Result;
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Not due yet.
    Skipped,
    Updated { added: usize, total: usize },
    /// The fetch failed; the stored list is unchanged.
    Failed,
}

/// Pulls the remote list on a fixed cadence and merges it into the stored
/// block list.
pub struct RemoteSync {
    storage: Arc<dyn Storage>,
    store: BlocklistStore,
    source: Arc<dyn ListSource>,
    interval: Duration,
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl RemoteSync {
    pub fn new(storage: Arc<dyn Storage>, source: Arc<dyn ListSource>, interval: Duration) -> Self {
        Self {
            store: BlocklistStore::new(storage.clone()),
            storage,
            source,
            interval,
        }
    }

    pub fn is_due(&self, last_updated: Option<u64>, now: u64, force: bool) -> bool {
        match last_updated {
            _ if force => true,
            None => true,
            Some(last) => {
                let interval = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX);
                now.saturating_sub(last) > interval
            }
        }
    }

    pub async fn sync_if_due(&self, force: bool) -> Result<SyncOutcome> {
        self.sync_if_due_at(force, now_millis()).await
    }

    /// `lastUpdated` is written after every attempt, failed or not, so a
    /// broken upstream is retried on the normal cadence rather than on every
    /// page load.
    pub async fn sync_if_due_at(&self, force: bool, now: u64) -> Result<SyncOutcome> {
        let last_updated = storage::get_timestamp(self.storage.as_ref(), StorageKey::LastUpdated).await?;

        if !self.is_due(last_updated, now, force) {
            debug!("Blocklist is up to date.");
            return Ok(SyncOutcome::Skipped);
        }

        let outcome = match self.source.fetch().await {
            Ok(lines) => self.merge(lines).await?,
            Err(e) => {
                error!("Failed to fetch blocklist: {}", e);
                SyncOutcome::Failed
            }
        };

        let stamp = last_updated.map_or(now, |last| last.max(now));
        self.storage
            .set(StorageKey::LastUpdated, Value::from(stamp))
            .await?;

        Ok(outcome)
    }

    async fn merge(&self, fetched: Vec<String>) -> Result<SyncOutcome> {
        let known = self.store.load(true).await?;
        let mut stored = storage::get_list(self.storage.as_ref(), StorageKey::Blacklist).await?;

        let mut seen = FxHashSet::default();
        let missing: Vec<String> = fetched
            .into_iter()
            .filter(|entry| {
                let key = normalize(entry);
                !key.is_empty() && !known.contains_normalized(&key) && seen.insert(key)
            })
            .collect();

        let added = missing.len();
        if added > 0 {
            stored.extend(missing);
            stored.sort();
            storage::set_list(self.storage.as_ref(), StorageKey::Blacklist, &stored).await?;
        }

        info!("Blocklist updated with {} entries", added);
        Ok(SyncOutcome::Updated {
            added,
            total: stored.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::traits::FetchError;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DAY: u64 = 24 * 60 * 60 * 1000;
    const NOW: u64 = 1_760_000_000_000;

    struct MockSource {
        lines: Vec<&'static str>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl MockSource {
        fn new(lines: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                lines,
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                lines: vec![],
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }
    }

    #[async_trait::async_trait]
    impl ListSource for MockSource {
        async fn fetch(&self) -> Result<Vec<String>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FetchError::Body(std::io::Error::other("connection reset")));
            }
            Ok(self.lines.iter().map(|s| s.to_string()).collect())
        }
    }

    fn sync_with(storage: Arc<MemoryStorage>, source: Arc<MockSource>) -> RemoteSync {
        RemoteSync::new(storage, source, Duration::from_millis(14 * DAY))
    }

    #[tokio::test]
    async fn test_due_after_fifteen_days() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(StorageKey::LastUpdated, json!(NOW - 15 * DAY))
            .await
            .unwrap();
        let source = MockSource::new(vec!["x"]);
        let sync = sync_with(storage, source.clone());

        let outcome = sync.sync_if_due_at(false, NOW).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Updated { added: 1, total: 1 });
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_due_after_one_day_unless_forced() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(StorageKey::LastUpdated, json!(NOW - DAY))
            .await
            .unwrap();
        let source = MockSource::new(vec!["x"]);
        let sync = sync_with(storage, source.clone());

        assert_eq!(
            sync.sync_if_due_at(false, NOW).await.unwrap(),
            SyncOutcome::Skipped
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        sync.sync_if_due_at(true, NOW).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_timestamp_is_due() {
        let source = MockSource::new(vec![]);
        let sync = sync_with(Arc::new(MemoryStorage::new()), source.clone());
        sync.sync_if_due_at(false, NOW).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_merge_appends_only_the_difference_sorted() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(StorageKey::Blacklist, json!(["zeta", "Alpha"]))
            .await
            .unwrap();
        storage
            .set(StorageKey::CustomList, json!(["mine"]))
            .await
            .unwrap();
        storage
            .set(StorageKey::Whitelist, json!(["Forgiven"]))
            .await
            .unwrap();
        let source = MockSource::new(vec!["Beta", "alpha", "MINE", "forgiven", "Beta", "Gamma"]);
        let sync = sync_with(storage.clone(), source);

        let outcome = sync.sync_if_due_at(true, NOW).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Updated { added: 2, total: 4 });

        let stored = storage::get_list(storage.as_ref(), StorageKey::Blacklist)
            .await
            .unwrap();
        assert_eq!(stored, vec!["Alpha", "Beta", "Gamma", "zeta"]);
        assert_eq!(
            storage::get_timestamp(storage.as_ref(), StorageKey::LastUpdated)
                .await
                .unwrap(),
            Some(NOW)
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_list_and_stamps_attempt() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(StorageKey::Blacklist, json!(["keep"]))
            .await
            .unwrap();
        let sync = sync_with(storage.clone(), MockSource::failing());

        let outcome = sync.sync_if_due_at(false, NOW).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Failed);
        assert_eq!(
            storage::get_list(storage.as_ref(), StorageKey::Blacklist)
                .await
                .unwrap(),
            vec!["keep"]
        );
        assert_eq!(
            storage::get_timestamp(storage.as_ref(), StorageKey::LastUpdated)
                .await
                .unwrap(),
            Some(NOW)
        );
    }

    #[tokio::test]
    async fn test_huge_interval_is_never_due() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(StorageKey::LastUpdated, json!(0))
            .await
            .unwrap();
        let source = MockSource::new(vec!["x"]);
        let sync = RemoteSync::new(storage, source.clone(), Duration::from_secs(u64::MAX));

        assert_eq!(
            sync.sync_if_due_at(false, NOW).await.unwrap(),
            SyncOutcome::Skipped
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timestamp_never_moves_backwards() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(StorageKey::LastUpdated, json!(NOW + DAY))
            .await
            .unwrap();
        let sync = sync_with(storage.clone(), MockSource::new(vec![]));

        sync.sync_if_due_at(true, NOW).await.unwrap();
        assert_eq!(
            storage::get_timestamp(storage.as_ref(), StorageKey::LastUpdated)
                .await
                .unwrap(),
            Some(NOW + DAY)
        );
    }
}
