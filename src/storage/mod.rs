//! Persisted key/value state shared by the content side, the background side
//! and the options surface.
//!
//! Values are plain JSON. Readers never trust the stored shape: the typed
//! helpers below coerce anything unexpected to a safe default instead of
//! failing.

mod file;
mod memory;

pub use self::file::JsonFileStorage;
pub use self::memory::MemoryStorage;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// The persisted keys and their wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Blacklist,
    CustomList,
    Whitelist,
    LastUpdated,
    HideBlocked,
}

impl StorageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Blacklist => "blacklist",
            StorageKey::CustomList => "customlist",
            StorageKey::Whitelist => "whitelist",
            StorageKey::LastUpdated => "lastUpdated",
            StorageKey::HideBlocked => "hideBlocked",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last-write-wins store, atomic per key.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: StorageKey) -> Result<Option<Value>>;
    async fn set(&self, key: StorageKey, value: Value) -> Result<()>;
}

/// Reads a list stored either as a JSON array or as a newline-joined string.
pub async fn get_list(storage: &dyn Storage, key: StorageKey) -> Result<Vec<String>> {
    Ok(storage.get(key).await?.map(coerce_list).unwrap_or_default())
}

/// Like [`get_list`] but distinguishes "never stored" from "stored empty".
pub async fn get_list_opt(storage: &dyn Storage, key: StorageKey) -> Result<Option<Vec<String>>> {
    Ok(storage.get(key).await?.map(coerce_list))
}

pub async fn set_list(storage: &dyn Storage, key: StorageKey, list: &[String]) -> Result<()> {
    storage.set(key, Value::from(list.to_vec())).await
}

pub async fn get_bool(storage: &dyn Storage, key: StorageKey, default: bool) -> Result<bool> {
    let value = storage.get(key).await?;
    Ok(value.map(|v| coerce_bool(key, v, default)).unwrap_or(default))
}

pub async fn get_timestamp(storage: &dyn Storage, key: StorageKey) -> Result<Option<u64>> {
    Ok(storage.get(key).await?.and_then(coerce_timestamp))
}

pub fn coerce_list(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(joined) => split_lines(&joined),
        other => {
            debug!("Ignoring malformed list value: {}", other);
            Vec::new()
        }
    }
}

/// Splits newline-joined text into trimmed, non-empty lines.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn coerce_bool(key: StorageKey, value: Value, default: bool) -> bool {
    match value {
        Value::Bool(b) => b,
        Value::String(s) if s.eq_ignore_ascii_case("true") => true,
        Value::String(s) if s.eq_ignore_ascii_case("false") => false,
        other => {
            debug!("Malformed {} value {}, using default {}", key, other, default);
            default
        }
    }
}

fn coerce_timestamp(value: Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        _ => None,
    }
}
