use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use url::Url;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub page: PageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_sync_url")]
    pub url: String,
    #[serde(default = "default_interval_days")]
    pub interval_days: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Knobs for the host page contract. The page's markup is not ours, so
/// everything that names a piece of it lives here rather than in code.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PageConfig {
    #[serde(default = "default_sign_in_selector")]
    pub sign_in_selector: String,
    #[serde(default = "default_menu_item_selector")]
    pub menu_item_selector: String,
    #[serde(default = "default_menu_label")]
    pub menu_label: String,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    #[serde(default = "default_group_threshold")]
    pub group_threshold: usize,
    #[serde(default = "default_ancestor_levels")]
    pub ancestor_levels: usize,
    #[serde(default = "default_watch_marker")]
    pub watch_marker: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_enable")]
    pub enable: bool,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_action_log_sinks")]
    pub action_log_sinks: Vec<String>,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_enable")]
    pub enable: bool,
    #[serde(default = "default_log_interval")]
    pub log_interval_seconds: u64,
}

// Defaults
fn default_storage_path() -> String {
    "yt-nope.json".to_string()
}
fn default_sync_url() -> String {
    "https://raw.githubusercontent.com/bergerr/youtube-extremism-filter-blacklist/refs/heads/main/blacklist.txt"
        .to_string()
}
fn default_interval_days() -> u64 {
    14
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_user_agent() -> String {
    "YtNope/1.0".to_string()
}
fn default_sign_in_selector() -> String {
    "ytd-masthead button#avatar-btn".to_string()
}
fn default_menu_item_selector() -> String {
    "[role=\"menuitem\"]".to_string()
}
fn default_menu_label() -> String {
    "Don't recommend channel".to_string()
}
fn default_retry_attempts() -> u32 {
    10
}
fn default_retry_interval_ms() -> u64 {
    300
}
fn default_group_threshold() -> usize {
    5
}
fn default_ancestor_levels() -> usize {
    3
}
fn default_watch_marker() -> String {
    "watch".to_string()
}
fn default_log_enable() -> bool {
    true
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_action_log_sinks() -> Vec<String> {
    vec!["console".to_string()]
}
fn default_memory_capacity() -> usize {
    100
}
fn default_stats_enable() -> bool {
    true
}
fn default_log_interval() -> u64 {
    300
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            url: default_sync_url(),
            interval_days: default_interval_days(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            sign_in_selector: default_sign_in_selector(),
            menu_item_selector: default_menu_item_selector(),
            menu_label: default_menu_label(),
            retry_attempts: default_retry_attempts(),
            retry_interval_ms: default_retry_interval_ms(),
            group_threshold: default_group_threshold(),
            ancestor_levels: default_ancestor_levels(),
            watch_marker: default_watch_marker(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable: default_log_enable(),
            format: default_log_format(),
            level: default_log_level(),
            action_log_sinks: default_action_log_sinks(),
            memory_capacity: default_memory_capacity(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enable: default_stats_enable(),
            log_interval_seconds: default_log_interval(),
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_days.saturating_mul(24 * 60 * 60))
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.sync.url).context("Invalid sync.url")?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("sync.url must be http(s), got '{}'", url.scheme());
        }
        if self.page.retry_attempts == 0 {
            anyhow::bail!("page.retry_attempts must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_page_contract() {
        let config = Config::default();
        assert_eq!(config.sync.interval_days, 14);
        assert_eq!(config.page.retry_attempts, 10);
        assert_eq!(config.page.retry_interval_ms, 300);
        assert_eq!(config.page.group_threshold, 5);
        assert_eq!(config.page.ancestor_levels, 3);
        assert_eq!(config.page.menu_label, "Don't recommend channel");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [storage]
            path = "/tmp/lists.json"

            [page]
            retry_attempts = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.path, "/tmp/lists.json");
        assert_eq!(config.page.retry_attempts, 3);
        assert_eq!(config.page.retry_interval_ms, 300);
        assert_eq!(config.logging.action_log_sinks, vec!["console"]);
    }

    #[test]
    fn test_rejects_non_http_sync_url() {
        let err = Config::from_toml(
            r#"
            [sync]
            url = "ftp://example.com/list.txt"
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_interval_in_days() {
        let sync = SyncConfig::default();
        assert_eq!(sync.interval(), Duration::from_secs(14 * 86_400));
    }

    #[test]
    fn test_huge_interval_saturates() {
        let config = Config::from_toml(
            r#"
            [sync]
            interval_days = 9223372036854775807
            "#,
        )
        .unwrap();
        assert_eq!(config.sync.interval(), Duration::from_secs(u64::MAX));
    }
}
