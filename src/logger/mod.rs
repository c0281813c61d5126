pub mod console_sink;
pub mod memory_sink;
pub mod types;

pub use self::console_sink::ConsoleLogSink;
pub use self::memory_sink::MemoryLogSink;
pub use self::types::{ActionLogEntry, ActionLogSink, ActionOutcome};

use crate::config::LoggingConfig;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::warn;

/// Fans blocked-tile entries out to the configured sinks, each drained by its
/// own task so a slow sink never stalls the page.
pub struct ActionLogger {
    sinks: Vec<mpsc::Sender<ActionLogEntry>>,
    memory: Option<Arc<RwLock<VecDeque<ActionLogEntry>>>>,
}

impl ActionLogger {
    /// Must be called from within a tokio runtime.
    pub fn new(config: LoggingConfig, extra_sinks: Vec<Box<dyn ActionLogSink>>) -> Arc<Self> {
        let mut boxed: Vec<Box<dyn ActionLogSink>> = Vec::new();
        let mut memory = None;

        for sink_type in &config.action_log_sinks {
            match sink_type.as_str() {
                "console" => boxed.push(Box::new(ConsoleLogSink::new(config.clone()))),
                "memory" => {
                    let sink = MemoryLogSink::new(config.memory_capacity);
                    memory = Some(sink.clone_buffer());
                    boxed.push(Box::new(sink));
                }
                other => warn!("Unknown action log sink type: {}", other),
            }
        }
        boxed.extend(extra_sinks);

        let sinks = boxed
            .into_iter()
            .map(|sink| {
                let (tx, mut rx) = mpsc::channel::<ActionLogEntry>(1000);
                tokio::spawn(async move {
                    while let Some(entry) = rx.recv().await {
                        sink.log(&entry);
                    }
                });
                tx
            })
            .collect();

        Arc::new(Self { sinks, memory })
    }

    /// A logger with no sinks.
    pub fn disabled() -> Arc<Self> {
        Arc::new(Self {
            sinks: Vec::new(),
            memory: None,
        })
    }

    pub fn log(&self, entry: ActionLogEntry) {
        let Some((last, rest)) = self.sinks.split_last() else {
            return;
        };
        // Fire and forget, don't block caller if buffer full
        for sink in rest {
            let _ = sink.try_send(entry.clone());
        }
        let _ = last.try_send(entry);
    }

    /// Recent entries of the configured `memory` sink, newest last.
    pub fn recent(&self) -> Vec<ActionLogEntry> {
        self.memory
            .as_ref()
            .map(|buf| buf.read().unwrap().iter().cloned().collect())
            .unwrap_or_default()
    }
}
