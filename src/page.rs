use crate::dom::{Document, MutationReceiver, NodeId, ObserveOptions, ObserverId};
use std::sync::{Arc, Mutex};

/// Shared handle to the host page. Every closure passed to [`Page::mutate`]
/// is one task on the page's event loop: the mutations it makes are delivered
/// to observers as a single batch when it returns.
///
/// Callers never hold the document across an `.await`.
#[derive(Clone, Default)]
pub struct Page {
    doc: Arc<Mutex<Document>>,
}

impl Page {
    pub fn new(doc: Document) -> Self {
        Self {
            doc: Arc::new(Mutex::new(doc)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        let doc = self.doc.lock().unwrap();
        f(&doc)
    }

    pub fn mutate<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        let mut doc = self.doc.lock().unwrap();
        let out = f(&mut doc);
        doc.flush_mutations();
        out
    }

    pub fn observe(&self, root: NodeId, options: ObserveOptions) -> (ObserverId, MutationReceiver) {
        self.doc.lock().unwrap().observe(root, options)
    }

    /// Registers an observer and reads the tree under the same lock: a change
    /// is either already visible to `f` or delivered to the observer, never
    /// both.
    pub fn observe_from<R>(
        &self,
        root: NodeId,
        options: ObserveOptions,
        f: impl FnOnce(&Document) -> R,
    ) -> (ObserverId, MutationReceiver, R) {
        let mut doc = self.doc.lock().unwrap();
        let (id, rx) = doc.observe(root, options);
        let out = f(&doc);
        (id, rx, out)
    }

    pub fn disconnect(&self, id: ObserverId) -> bool {
        self.doc.lock().unwrap().disconnect(id)
    }

    /// Page teardown: all observers are discarded and their watchers finish.
    pub fn unload(&self) {
        self.doc.lock().unwrap().disconnect_all();
    }

    pub fn observer_count(&self) -> usize {
        self.doc.lock().unwrap().observer_count()
    }

    /// Activates `node`; whatever the page does in response is flushed as one batch.
    pub fn click(&self, node: NodeId) {
        self.mutate(|doc| doc.click(node));
    }

    pub fn set_hidden(&self, node: NodeId, hidden: bool) {
        self.mutate(|doc| doc.set_hidden(node, hidden));
    }
}
