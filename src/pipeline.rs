//! Per-tile match and suppress.
//!
//! A tile's channel name is the first text on it that is not inside a link
//! (links carry the video title). A blocked tile is hidden right away when
//! the preference says so, then the page's own "don't recommend" entry is
//! triggered through the tile's menu. Hiding does not wait for, or depend
//! on, the menu action.

use crate::config::Config;
use crate::dom::{Document, NodeId, Selector, SelectorError};
use crate::engine::{normalize, BlocklistStore, ChannelMatcher};
use crate::logger::{ActionLogEntry, ActionLogger, ActionOutcome};
use crate::page::Page;
use crate::retry::{await_condition, RetryPolicy};
use crate::stats::StatsCollector;
use anyhow::Result;
use rustc_hash::FxHashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SuppressionSettings {
    pub menu_item: Selector,
    pub menu_label: String,
    pub retry: RetryPolicy,
}

impl SuppressionSettings {
    pub fn from_config(config: &Config) -> Result<Self, SelectorError> {
        Ok(Self {
            menu_item: Selector::parse(&config.page.menu_item_selector)?,
            menu_label: config.page.menu_label.clone(),
            retry: RetryPolicy::from_config(&config.page),
        })
    }
}

/// Everything the pipeline needs, built once at startup.
pub struct BlockerContext {
    pub list: Arc<dyn ChannelMatcher>,
    pub hide_blocked: bool,
    pub suppression: SuppressionSettings,
    pub stats: Arc<StatsCollector>,
    pub logger: Arc<ActionLogger>,
}

impl BlockerContext {
    pub async fn load(
        store: &BlocklistStore,
        config: &Config,
        stats: Arc<StatsCollector>,
        logger: Arc<ActionLogger>,
    ) -> Result<Self> {
        let list = store.load(false).await?;
        let hide_blocked = store.hide_blocked().await?;
        debug!(
            "Context ready: {} blocked names, hide blocked tiles: {}",
            list.len(),
            hide_blocked
        );
        Ok(Self {
            list: Arc::new(list),
            hide_blocked,
            suppression: SuppressionSettings::from_config(config)?,
            stats,
            logger,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileVerdict {
    /// Already handled, detached, or not an element.
    Skipped,
    NoChannel,
    Allowed { channel: String },
    Blocked {
        channel: String,
        outcome: ActionOutcome,
        hidden: bool,
    },
}

/// First non-empty text run under `tile` that is not inside an `<a>`.
pub fn extract_channel_name(doc: &Document, tile: NodeId) -> Option<String> {
    let is_link = |d: &Document, n: NodeId| d.tag(n) == Some("a");
    if is_link(doc, tile) || doc.ancestors(tile).any(|a| is_link(doc, a)) {
        return None;
    }
    doc.walk_filtered(tile, is_link)
        .filter_map(|n| doc.text(n))
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

/// First `<button>` in document order, the tile itself included.
pub fn find_action_control(doc: &Document, tile: NodeId) -> Option<NodeId> {
    if doc.tag(tile) == Some("button") {
        return Some(tile);
    }
    doc.descendants(tile).find(|n| doc.tag(*n) == Some("button"))
}

/// A menu entry whose visible label equals `label`, ignoring case.
pub fn find_menu_item(doc: &Document, selector: &Selector, label: &str) -> Option<NodeId> {
    let wanted = label.trim().to_lowercase();
    doc.query_selector_all(selector)
        .into_iter()
        .find(|item| doc.text_content(*item).trim().to_lowercase() == wanted)
}

pub struct Pipeline {
    page: Page,
    ctx: Arc<BlockerContext>,
    // Tiles already suppressed; a node is never suppressed twice.
    blocked: Mutex<FxHashSet<NodeId>>,
}

impl Pipeline {
    pub fn new(page: Page, ctx: Arc<BlockerContext>) -> Arc<Self> {
        Arc::new(Self {
            page,
            ctx,
            blocked: Mutex::new(FxHashSet::default()),
        })
    }

    pub fn context(&self) -> &BlockerContext {
        &self.ctx
    }

    pub async fn process(&self, tile: NodeId) -> TileVerdict {
        let start = Instant::now();
        let channel = self.page.read(|doc| {
            if !doc.is_element(tile) || !doc.is_connected(tile) {
                return Err(());
            }
            Ok(extract_channel_name(doc, tile))
        });
        let channel = match channel {
            Err(()) => return TileVerdict::Skipped,
            Ok(None) => {
                self.ctx.stats.inc_scanned();
                return TileVerdict::NoChannel;
            }
            Ok(Some(channel)) => channel,
        };
        self.ctx.stats.inc_scanned();

        if !self.ctx.list.contains(&channel) {
            return TileVerdict::Allowed { channel };
        }
        if !self.blocked.lock().unwrap().insert(tile) {
            return TileVerdict::Skipped;
        }

        debug!("Blocking channel: {}", channel);
        self.ctx.stats.inc_matched();

        let hidden = self.ctx.hide_blocked;
        if hidden {
            self.page.set_hidden(tile, true);
            self.ctx.stats.inc_hidden();
        }

        let outcome = self.suppress(tile).await;
        match outcome {
            ActionOutcome::Suppressed => self.ctx.stats.inc_suppressed(),
            _ => self.ctx.stats.inc_suppression_failed(),
        }

        self.ctx.logger.log(ActionLogEntry {
            matched: normalize(&channel),
            channel: channel.clone(),
            action: outcome,
            hidden,
            latency_ms: start.elapsed().as_millis() as u64,
        });

        TileVerdict::Blocked {
            channel,
            outcome,
            hidden,
        }
    }

    /// Opens the tile's menu and activates the "don't recommend" entry.
    /// Best effort: every failure is logged and reported, never raised.
    async fn suppress(&self, tile: NodeId) -> ActionOutcome {
        let Some(control) = self.page.read(|doc| find_action_control(doc, tile)) else {
            warn!("No menu control found on blocked tile {:?}", tile);
            return ActionOutcome::ControlMissing;
        };
        self.page.click(control);

        let settings = &self.ctx.suppression;
        let item = await_condition(
            || {
                self.page.read(|doc| {
                    find_menu_item(doc, &settings.menu_item, &settings.menu_label)
                })
            },
            settings.retry,
        )
        .await;

        match item {
            Ok(item) => {
                self.page.click(item);
                ActionOutcome::Suppressed
            }
            Err(e) => {
                warn!("Menu item not found: {} ({})", settings.menu_label, e);
                ActionOutcome::MenuItemMissing
            }
        }
    }
}
