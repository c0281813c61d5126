use super::{Storage, StorageKey};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<StorageKey, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: StorageKey) -> Result<Option<Value>> {
        let values = self.values.read().unwrap();
        Ok(values.get(&key).cloned())
    }

    async fn set(&self, key: StorageKey, value: Value) -> Result<()> {
        let mut values = self.values.write().unwrap();
        values.insert(key, value);
        Ok(())
    }
}
