use super::traits::{FetchError, ListSource};
use crate::config::SyncConfig;
use futures::StreamExt;
use reqwest::Client;
use std::borrow::Cow;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::io::StreamReader;
use tracing::{info, warn};

/// Plaintext list at a fixed URL, one entry per line.
pub struct HttpListSource {
    client: Client,
    url: String,
}

impl HttpListSource {
    pub fn new(config: &SyncConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| FetchError::Transport {
                url: config.url.clone(),
                source,
            })?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// One entry per non-blank line. A leading `#` is part of the name.
    pub(crate) fn parse_line(line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(line.to_string())
    }

    #[cfg(test)]
    fn parse_list_content(text: &str) -> Vec<String> {
        text.lines().filter_map(Self::parse_line).collect()
    }
}

#[async_trait::async_trait]
impl ListSource for HttpListSource {
    async fn fetch(&self) -> Result<Vec<String>, FetchError> {
        info!("Fetching channel list from {}", self.url);

        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: self.url.clone(),
                source,
            })?;

        if !resp.status().is_success() {
            warn!("List fetch from {} returned {}", self.url, resp.status());
            return Ok(vec![]);
        }

        let stream = resp
            .bytes_stream()
            .map(|result| result.map_err(std::io::Error::other));
        let reader = StreamReader::new(stream);
        let mut segments = BufReader::new(reader).split(b'\n');
        let mut entries = Vec::new();

        // Bad bytes are replaced, the rest of the line and list are kept.
        while let Some(segment) = segments.next_segment().await? {
            let line = String::from_utf8_lossy(&segment);
            if let Cow::Owned(_) = line {
                warn!("List from {} has a line that is not valid UTF-8", self.url);
            }
            if let Some(entry) = Self::parse_line(&line) {
                entries.push(entry);
            }
        }

        info!("Parsed {} entries from {}", entries.len(), self.url);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{RemoteSync, SyncOutcome};
    use crate::storage::{self, MemoryStorage, Storage, StorageKey};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers a single request with `status` and `body`.
    async fn serve_once(status: &'static str, body: &'static [u8]) -> SyncConfig {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            let _ = socket.shutdown().await;
        });
        SyncConfig {
            url: format!("http://{}/channels.txt", addr),
            ..SyncConfig::default()
        }
    }

    #[test]
    fn test_parse_list_simple_format() {
        let content = "
        Some Channel
        another_one

          Spaced Out News
        #hashtag channel
        ";

        let entries = HttpListSource::parse_list_content(content);
        assert_eq!(
            entries,
            vec!["Some Channel", "another_one", "Spaced Out News", "#hashtag channel"]
        );
    }

    #[test]
    fn test_client_builds_from_default_config() {
        let source = HttpListSource::new(&SyncConfig::default()).unwrap();
        assert!(source.url.starts_with("https://"));
    }

    #[tokio::test]
    async fn test_fetch_reads_lines_over_http() {
        let config = serve_once("200 OK", b"Good Channel\r\n\nOther Channel").await;
        let source = HttpListSource::new(&config).unwrap();
        assert_eq!(
            source.fetch().await.unwrap(),
            vec!["Good Channel", "Other Channel"]
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_keeps_the_rest() {
        let config = serve_once("200 OK", b"Good Channel\n\xff\xfe Broken\nOther Channel\n").await;
        let source = HttpListSource::new(&config).unwrap();
        let entries = source.fetch().await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], "Good Channel");
        assert_eq!(entries[1], "\u{fffd}\u{fffd} Broken");
        assert_eq!(entries[2], "Other Channel");
    }

    #[tokio::test]
    async fn test_not_found_leaves_stored_list_alone() {
        let config = serve_once("404 Not Found", b"no such list").await;
        let source = HttpListSource::new(&config).unwrap();
        assert_eq!(source.fetch().await.unwrap(), Vec::<String>::new());

        let config = serve_once("404 Not Found", b"no such list").await;
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(StorageKey::Blacklist, json!(["keep"]))
            .await
            .unwrap();
        let sync = RemoteSync::new(
            storage.clone(),
            Arc::new(HttpListSource::new(&config).unwrap()),
            config.interval(),
        );

        let outcome = sync.sync_if_due(true).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Updated { added: 0, total: 1 });
        assert_eq!(
            storage::get_list(storage.as_ref(), StorageKey::Blacklist)
                .await
                .unwrap(),
            vec!["keep"]
        );
    }
}
