//! The background side: the single writer of list state.
//!
//! Everything that edits a list goes through [`Message`]s handled one at a
//! time by a spawned task, so a save followed by another save is applied in
//! the order it was sent.

use crate::engine::{RemoteSync, SyncOutcome};
use crate::storage::{self, split_lines, Storage, StorageKey};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// A list as the options surface sends it: an array, or lines joined by `\n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListContent {
    Lines(Vec<String>),
    Joined(String),
}

impl ListContent {
    pub fn len(&self) -> usize {
        match self {
            ListContent::Lines(lines) => lines.len(),
            ListContent::Joined(text) => split_lines(text).len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored in the shape it was sent in; readers accept both.
    fn into_value(self) -> Value {
        match self {
            ListContent::Lines(lines) => Value::from(lines),
            ListContent::Joined(text) => Value::String(text),
        }
    }
}

impl From<Vec<String>> for ListContent {
    fn from(lines: Vec<String>) -> Self {
        ListContent::Lines(lines)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    SaveBlacklist { content: ListContent },
    SaveWhitelist { content: ListContent },
    SaveCustomList { content: ListContent },
    SaveHideBlocked { content: bool },
    FetchBlacklist {
        #[serde(default)]
        force: bool,
    },
}

impl Message {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Malformed message")
    }

    fn action(&self) -> &'static str {
        match self {
            Message::SaveBlacklist { .. } => "saveBlacklist",
            Message::SaveWhitelist { .. } => "saveWhitelist",
            Message::SaveCustomList { .. } => "saveCustomList",
            Message::SaveHideBlocked { .. } => "saveHideBlocked",
            Message::FetchBlacklist { .. } => "fetchBlacklist",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Saved,
    Fetched {
        outcome: SyncOutcome,
        blacklist: Vec<String>,
    },
}

pub struct Background {
    storage: Arc<dyn Storage>,
    sync: RemoteSync,
}

impl Background {
    pub fn new(storage: Arc<dyn Storage>, sync: RemoteSync) -> Self {
        Self { storage, sync }
    }

    pub async fn handle(&self, message: Message) -> Result<Reply> {
        debug!("Handling {}", message.action());
        match message {
            Message::SaveBlacklist { content } => self.save(StorageKey::Blacklist, content).await,
            Message::SaveWhitelist { content } => self.save(StorageKey::Whitelist, content).await,
            Message::SaveCustomList { content } => {
                self.save(StorageKey::CustomList, content).await
            }
            Message::SaveHideBlocked { content } => {
                self.storage
                    .set(StorageKey::HideBlocked, Value::Bool(content))
                    .await?;
                Ok(Reply::Saved)
            }
            Message::FetchBlacklist { force } => {
                let outcome = self.sync.sync_if_due(force).await?;
                let blacklist =
                    storage::get_list(self.storage.as_ref(), StorageKey::Blacklist).await?;
                Ok(Reply::Fetched { outcome, blacklist })
            }
        }
    }

    async fn save(&self, key: StorageKey, content: ListContent) -> Result<Reply> {
        info!("Saving {} ({} entries)", key, content.len());
        self.storage.set(key, content.into_value()).await?;
        Ok(Reply::Saved)
    }

    /// Runs the handler as a task; it stops once every sender is dropped.
    pub fn spawn(self) -> MessageSender {
        let (tx, mut rx) = mpsc::channel::<Envelope>(64);
        tokio::spawn(async move {
            while let Some(Envelope { message, reply }) = rx.recv().await {
                let action = message.action();
                let result = self.handle(message).await;
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            warn!("{} failed: {:#}", action, e);
                        }
                    }
                }
            }
            debug!("Background task stopped");
        });
        MessageSender { tx }
    }
}

struct Envelope {
    message: Message,
    reply: Option<oneshot::Sender<Result<Reply>>>,
}

#[derive(Clone)]
pub struct MessageSender {
    tx: mpsc::Sender<Envelope>,
}

impl MessageSender {
    /// Queues a message without waiting for it to be handled.
    pub async fn send(&self, message: Message) -> Result<()> {
        self.tx
            .send(Envelope {
                message,
                reply: None,
            })
            .await
            .map_err(|_| anyhow::anyhow!("Background task has stopped"))
    }

    /// Sends a message and waits for its result.
    pub async fn request(&self, message: Message) -> Result<Reply> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                message,
                reply: Some(reply),
            })
            .await
            .map_err(|_| anyhow::anyhow!("Background task has stopped"))?;
        rx.await.context("Background task dropped the request")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{FetchError, ListSource};
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedSource(Vec<&'static str>);

    #[async_trait]
    impl ListSource for FixedSource {
        async fn fetch(&self) -> Result<Vec<String>, FetchError> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    fn background(storage: Arc<MemoryStorage>, remote: Vec<&'static str>) -> Background {
        let sync = RemoteSync::new(
            storage.clone(),
            Arc::new(FixedSource(remote)),
            Duration::from_secs(14 * 86_400),
        );
        Background::new(storage, sync)
    }

    #[test]
    fn test_message_wire_format() {
        let msg = Message::from_json(r#"{"action":"saveCustomList","content":"a\nb"}"#).unwrap();
        assert_eq!(
            msg,
            Message::SaveCustomList {
                content: ListContent::Joined("a\nb".into())
            }
        );

        let msg = Message::from_json(r#"{"action":"fetchBlacklist"}"#).unwrap();
        assert_eq!(msg, Message::FetchBlacklist { force: false });

        let json = serde_json::to_value(Message::SaveHideBlocked { content: false }).unwrap();
        assert_eq!(json["action"], "saveHideBlocked");

        assert!(Message::from_json(r#"{"action":"formatDisk"}"#).is_err());
    }

    #[tokio::test]
    async fn test_custom_list_saved_under_its_key() {
        let storage = Arc::new(MemoryStorage::new());
        let bg = background(storage.clone(), vec![]);
        bg.handle(Message::SaveCustomList {
            content: ListContent::Joined("one\n\ntwo".into()),
        })
        .await
        .unwrap();
        let saved = storage::get_list(storage.as_ref(), StorageKey::CustomList)
            .await
            .unwrap();
        assert_eq!(saved, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_spawned_messages_apply_in_order() {
        let storage = Arc::new(MemoryStorage::new());
        let sender = background(storage.clone(), vec!["Remote"]).spawn();

        sender
            .send(Message::SaveWhitelist {
                content: vec!["first".to_string()].into(),
            })
            .await
            .unwrap();
        sender
            .send(Message::SaveWhitelist {
                content: vec!["second".to_string()].into(),
            })
            .await
            .unwrap();
        sender
            .request(Message::SaveHideBlocked { content: false })
            .await
            .unwrap();

        assert_eq!(
            storage::get_list(storage.as_ref(), StorageKey::Whitelist)
                .await
                .unwrap(),
            vec!["second"]
        );
        assert!(!storage::get_bool(storage.as_ref(), StorageKey::HideBlocked, true)
            .await
            .unwrap());

        let reply = sender
            .request(Message::FetchBlacklist { force: true })
            .await
            .unwrap();
        assert_eq!(
            reply,
            Reply::Fetched {
                outcome: SyncOutcome::Updated { added: 1, total: 1 },
                blacklist: vec!["Remote".to_string()],
            }
        );
    }
}
