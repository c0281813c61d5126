use super::NodeId;
use std::mem;
use tokio::sync::mpsc;

/// What an observer wants to hear about. Only child-list changes exist in
/// this model; attribute changes are never reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub subtree: bool,
}

impl ObserveOptions {
    pub fn subtree() -> Self {
        Self {
            child_list: true,
            subtree: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub type MutationReceiver = mpsc::UnboundedReceiver<Vec<MutationRecord>>;

struct Registration {
    id: ObserverId,
    root: NodeId,
    options: ObserveOptions,
    tx: mpsc::UnboundedSender<Vec<MutationRecord>>,
    pending: Vec<MutationRecord>,
}

#[derive(Default)]
pub(crate) struct ObserverRegistry {
    next_id: u64,
    registrations: Vec<Registration>,
}

impl ObserverRegistry {
    pub(crate) fn register(
        &mut self,
        root: NodeId,
        options: ObserveOptions,
    ) -> (ObserverId, MutationReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.registrations.push(Registration {
            id,
            root,
            options,
            tx,
            pending: Vec::new(),
        });
        (id, rx)
    }

    /// Drops the registration and any records it had not been handed yet.
    pub(crate) fn disconnect(&mut self, id: ObserverId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        before != self.registrations.len()
    }

    /// Page teardown: every receiver sees its channel close.
    pub(crate) fn clear(&mut self) {
        self.registrations.clear();
    }

    pub(crate) fn is_active(&self, id: ObserverId) -> bool {
        self.registrations.iter().any(|r| r.id == id)
    }

    pub(crate) fn active_count(&self) -> usize {
        self.registrations.len()
    }

    /// `target_path` is the target followed by its ancestors, nearest first.
    pub(crate) fn queue(&mut self, target_path: &[NodeId], record: MutationRecord) {
        let Some(&target) = target_path.first() else {
            return;
        };
        for reg in &mut self.registrations {
            if !reg.options.child_list {
                continue;
            }
            let interested = if reg.options.subtree {
                target_path.contains(&reg.root)
            } else {
                reg.root == target
            };
            if interested {
                reg.pending.push(record.clone());
            }
        }
    }

    /// Hands each observer its pending records as one batch. Observers whose
    /// receiver is gone are dropped.
    pub(crate) fn flush(&mut self) {
        self.registrations.retain_mut(|reg| {
            if reg.pending.is_empty() {
                return !reg.tx.is_closed();
            }
            let batch = mem::take(&mut reg.pending);
            reg.tx.send(batch).is_ok()
        });
    }
}
