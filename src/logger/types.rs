use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ActionLogEntry {
    /// Channel name as rendered on the tile.
    pub channel: String,
    /// The normalized form that matched the list.
    pub matched: String,
    pub action: ActionOutcome,
    pub hidden: bool,
    pub latency_ms: u64,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The native "don't recommend" entry was activated.
    Suppressed,
    /// The tile had no control to open the menu.
    ControlMissing,
    /// The menu never offered the entry within the retry budget.
    MenuItemMissing,
}

pub trait ActionLogSink: Send + Sync {
    fn log(&self, entry: &ActionLogEntry);
}
