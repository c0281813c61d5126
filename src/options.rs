//! Operations behind the options surface. Reads go straight to storage,
//! writes go through the background task.

use crate::background::{ListContent, Message, MessageSender};
use crate::engine::{BlocklistStore, RawLists};
use crate::storage::split_lines;
use anyhow::Result;
use tracing::info;

/// The two lists entries can be moved between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditableList {
    Blacklist,
    Whitelist,
}

impl EditableList {
    fn other(self) -> Self {
        match self {
            EditableList::Blacklist => EditableList::Whitelist,
            EditableList::Whitelist => EditableList::Blacklist,
        }
    }

    fn pick(self, lists: &RawLists) -> &[String] {
        match self {
            EditableList::Blacklist => &lists.blacklist,
            EditableList::Whitelist => &lists.whitelist,
        }
    }

    fn save(self, content: Vec<String>) -> Message {
        let content = ListContent::Lines(content);
        match self {
            EditableList::Blacklist => Message::SaveBlacklist { content },
            EditableList::Whitelist => Message::SaveWhitelist { content },
        }
    }
}

pub struct OptionsPage {
    sender: MessageSender,
    store: BlocklistStore,
}

impl OptionsPage {
    pub fn new(sender: MessageSender, store: BlocklistStore) -> Self {
        Self { sender, store }
    }

    /// Current lists. On first use, before any block list was stored, the
    /// remote list is pulled in first.
    pub async fn load(&self) -> Result<RawLists> {
        if !self.store.has_blacklist().await? {
            info!("No block list stored yet, fetching it");
            self.sender
                .request(Message::FetchBlacklist { force: true })
                .await?;
        }
        self.store.raw_lists().await
    }

    /// Moves `selected` out of `from` into the other list. The source list is
    /// saved before the target list.
    pub async fn move_between_lists(
        &self,
        from: EditableList,
        selected: &[String],
    ) -> Result<RawLists> {
        let lists = self.store.raw_lists().await?;
        let to = from.other();

        let remaining: Vec<String> = from
            .pick(&lists)
            .iter()
            .filter(|entry| !selected.contains(entry))
            .cloned()
            .collect();
        let mut target = to.pick(&lists).to_vec();
        target.extend(selected.iter().cloned());
        target.sort();
        target.dedup();

        self.sender.request(from.save(remaining)).await?;
        self.sender.request(to.save(target)).await?;
        self.store.raw_lists().await
    }

    /// Stores the text as trimmed, non-blank lines joined by newlines.
    pub async fn save_custom_list(&self, text: &str) -> Result<()> {
        let joined = split_lines(text).join("\n");
        self.sender
            .request(Message::SaveCustomList {
                content: ListContent::Joined(joined),
            })
            .await?;
        Ok(())
    }

    pub async fn set_hide_blocked(&self, hide: bool) -> Result<()> {
        self.sender
            .request(Message::SaveHideBlocked { content: hide })
            .await?;
        Ok(())
    }
}
