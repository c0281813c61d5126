use super::{ActionLogEntry, ActionLogSink};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

/// Keeps the most recent entries, oldest dropped first.
pub struct MemoryLogSink {
    buffer: Arc<RwLock<VecDeque<ActionLogEntry>>>,
    capacity: usize,
}

impl MemoryLogSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn get_recent(&self) -> Vec<ActionLogEntry> {
        let buffer = self.buffer.read().unwrap();
        buffer.iter().cloned().collect()
    }

    // Lets a reader keep watching after the sink moved into the logger.
    pub fn clone_buffer(&self) -> Arc<RwLock<VecDeque<ActionLogEntry>>> {
        self.buffer.clone()
    }
}

impl ActionLogSink for MemoryLogSink {
    fn log(&self, entry: &ActionLogEntry) {
        let mut buffer = self.buffer.write().unwrap();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(entry.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::ActionOutcome;

    fn entry(channel: &str) -> ActionLogEntry {
        ActionLogEntry {
            channel: channel.to_string(),
            matched: channel.to_lowercase(),
            action: ActionOutcome::Suppressed,
            hidden: true,
            latency_ms: 1,
        }
    }

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let sink = MemoryLogSink::new(2);
        sink.log(&entry("A"));
        sink.log(&entry("B"));
        sink.log(&entry("C"));
        let channels: Vec<_> = sink.get_recent().into_iter().map(|e| e.channel).collect();
        assert_eq!(channels, vec!["B", "C"]);
    }
}
