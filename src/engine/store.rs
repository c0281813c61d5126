use super::matcher::EffectiveBlockList;
use crate::storage::{self, Storage, StorageKey};
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

/// The three stored lists, exactly as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLists {
    pub blacklist: Vec<String>,
    pub customlist: Vec<String>,
    pub whitelist: Vec<String>,
}

#[derive(Clone)]
pub struct BlocklistStore {
    storage: Arc<dyn Storage>,
}

impl BlocklistStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Block list ∪ custom list, plus the allow list when asked for (used when
    /// diffing remote updates so allow-listed names are not re-added).
    pub async fn load(&self, include_allow_list: bool) -> Result<EffectiveBlockList> {
        let lists = self.raw_lists().await?;
        let mut entries = lists.blacklist;
        entries.extend(lists.customlist);
        if include_allow_list {
            entries.extend(lists.whitelist);
        }
        let list = EffectiveBlockList::new(entries);
        debug!(
            "Loaded {} effective entries (allow list included: {})",
            list.len(),
            include_allow_list
        );
        Ok(list)
    }

    pub async fn raw_lists(&self) -> Result<RawLists> {
        let storage = self.storage.as_ref();
        Ok(RawLists {
            blacklist: storage::get_list(storage, StorageKey::Blacklist).await?,
            customlist: storage::get_list(storage, StorageKey::CustomList).await?,
            whitelist: storage::get_list(storage, StorageKey::Whitelist).await?,
        })
    }

    pub async fn has_blacklist(&self) -> Result<bool> {
        Ok(storage::get_list_opt(self.storage.as_ref(), StorageKey::Blacklist)
            .await?
            .is_some())
    }

    pub async fn hide_blocked(&self) -> Result<bool> {
        storage::get_bool(self.storage.as_ref(), StorageKey::HideBlocked, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChannelMatcher;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    async fn seeded() -> BlocklistStore {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(StorageKey::Blacklist, json!(["Bad Channel", "worse"]))
            .await
            .unwrap();
        storage
            .set(StorageKey::CustomList, json!("My Pick\n\n"))
            .await
            .unwrap();
        storage
            .set(StorageKey::Whitelist, json!(["Fine Channel"]))
            .await
            .unwrap();
        BlocklistStore::new(storage)
    }

    #[tokio::test]
    async fn test_effective_list_excludes_allow_list_by_default() {
        let store = seeded().await;
        let list = store.load(false).await.unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.contains("badchannel"));
        assert!(list.contains("my pick"));
        assert!(!list.contains("Fine Channel"));
    }

    #[tokio::test]
    async fn test_effective_list_with_allow_list() {
        let store = seeded().await;
        let list = store.load(true).await.unwrap();
        assert_eq!(list.len(), 4);
        assert!(list.contains("finechannel"));
    }

    #[tokio::test]
    async fn test_empty_storage() {
        let store = BlocklistStore::new(Arc::new(MemoryStorage::new()));
        assert!(store.load(true).await.unwrap().is_empty());
        assert!(!store.has_blacklist().await.unwrap());
        assert!(store.hide_blocked().await.unwrap());
    }
}
