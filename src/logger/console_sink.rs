use crate::config::LoggingConfig;
use crate::logger::types::{ActionLogEntry, ActionLogSink, ActionOutcome};
use tracing::info;

pub struct ConsoleLogSink {
    config: LoggingConfig,
}

impl ConsoleLogSink {
    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }
}

impl ActionLogSink for ConsoleLogSink {
    fn log(&self, entry: &ActionLogEntry) {
        if !self.config.enable {
            return;
        }

        if self.config.format == "json" {
            // Structured JSON logging via tracing
            info!(
                target: "tile_action",
                channel = %entry.channel,
                matched = %entry.matched,
                action = ?entry.action,
                hidden = entry.hidden,
                lat = %entry.latency_ms
            );
        } else {
            let action_str = match entry.action {
                ActionOutcome::Suppressed => "suppressed via menu",
                ActionOutcome::ControlMissing => "no menu control on tile",
                ActionOutcome::MenuItemMissing => "menu entry never appeared",
            };

            info!(
                "Blocked channel '{}' ({}) -> {}{} [{}ms]",
                entry.channel,
                entry.matched,
                action_str,
                if entry.hidden { ", hidden" } else { "" },
                entry.latency_ms
            );
        }
    }
}
