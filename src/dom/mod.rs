//! In-memory model of the host page.
//!
//! An arena of nodes addressed by [`NodeId`]. The page's own behaviour (menus
//! that pop up when a button is activated, lazily rendered feeds) is attached
//! through click listeners and plain tree mutations, and every child-list
//! change is reported to registered observers in batches, the way a browser
//! delivers mutation records.

mod mutation;
pub mod selector;
pub mod snapshot;

pub use self::mutation::{MutationReceiver, MutationRecord, ObserveOptions, ObserverId};
pub use self::selector::{Selector, SelectorError};

use self::mutation::ObserverRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("node {0:?} cannot have children")]
    NotAContainer(NodeId),
    #[error("inserting {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("the document node cannot be moved")]
    DocumentNode,
}

#[derive(Debug, Clone)]
pub struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
    hidden: bool,
}

#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// Host-page reaction to an activation. Receives the document and the node
/// that was activated.
pub type ClickListener = Arc<dyn Fn(&mut Document, NodeId) + Send + Sync>;

pub struct Document {
    nodes: Vec<Node>,
    listeners: HashMap<NodeId, Vec<ClickListener>>,
    observers: ObserverRegistry,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
            }],
            listeners: HashMap::new(),
            observers: ObserverRegistry::default(),
        }
    }

    /// The `#document` node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The top-level element (`<html>`), if one was attached.
    pub fn document_element(&self) -> Option<NodeId> {
        self.element_children(self.root()).next()
    }

    // --- construction ---

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            hidden: false,
        }))
    }

    pub fn create_element_with(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.create_element(tag);
        for (name, value) in attrs {
            self.set_attr(id, name, value);
        }
        id
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeData::Element(el) = &mut self.nodes[id.0].data {
            let name = name.to_ascii_lowercase();
            match el.attrs.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => el.attrs.push((name, value.to_string())),
            }
        }
    }

    // --- tree mutation ---

    /// Appends `child` as the last child of `parent`, moving it if it was
    /// already attached somewhere.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if matches!(self.nodes[parent.0].data, NodeData::Text(_)) {
            return Err(DomError::NotAContainer(parent));
        }
        if child == self.root() {
            return Err(DomError::DocumentNode);
        }
        if child == parent || self.ancestors(parent).any(|a| a == child) {
            return Err(DomError::Cycle { parent, child });
        }

        if let Some(old_parent) = self.nodes[child.0].parent {
            self.remove_child(old_parent, child)?;
        }

        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.record(parent, vec![child], vec![]);
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let children = &mut self.nodes[parent.0].children;
        let Some(pos) = children.iter().position(|c| *c == child) else {
            return Err(DomError::NotAChild { parent, child });
        };
        children.remove(pos);
        self.nodes[child.0].parent = None;
        self.record(parent, vec![], vec![child]);
        Ok(())
    }

    pub fn remove_children(&mut self, parent: NodeId) {
        let children = std::mem::take(&mut self.nodes[parent.0].children);
        for child in &children {
            self.nodes[child.0].parent = None;
        }
        if !children.is_empty() {
            self.record(parent, vec![], children);
        }
    }

    fn record(&mut self, target: NodeId, added_nodes: Vec<NodeId>, removed_nodes: Vec<NodeId>) {
        let mut path = vec![target];
        path.extend(self.ancestors(target));
        self.observers.queue(
            &path,
            MutationRecord {
                target,
                added_nodes,
                removed_nodes,
            },
        );
    }

    // --- observation ---

    pub fn observe(&mut self, root: NodeId, options: ObserveOptions) -> (ObserverId, MutationReceiver) {
        self.observers.register(root, options)
    }

    pub fn disconnect(&mut self, id: ObserverId) -> bool {
        self.observers.disconnect(id)
    }

    /// Drops every observer, as navigating away from the page would.
    pub fn disconnect_all(&mut self) {
        self.observers.clear();
    }

    pub fn is_observing(&self, id: ObserverId) -> bool {
        self.observers.is_active(id)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.active_count()
    }

    /// Delivers everything queued since the last flush, one batch per observer.
    pub fn flush_mutations(&mut self) {
        self.observers.flush();
    }

    // --- activation & visibility ---

    pub fn add_click_listener(&mut self, id: NodeId, listener: ClickListener) {
        self.listeners.entry(id).or_default().push(listener);
    }

    /// Simulates a primary activation: listeners on the node run first, then
    /// those on its ancestors.
    pub fn click(&mut self, id: NodeId) {
        let mut path = vec![id];
        path.extend(self.ancestors(id));
        let listeners: Vec<ClickListener> = path
            .iter()
            .filter_map(|node| self.listeners.get(node))
            .flatten()
            .cloned()
            .collect();
        for listener in listeners {
            listener(self, id);
        }
    }

    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) {
        if let NodeData::Element(el) = &mut self.nodes[id.0].data {
            el.hidden = hidden;
        }
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        matches!(&self.nodes[id.0].data, NodeData::Element(el) if el.hidden)
    }

    // --- inspection ---

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].data, NodeData::Element(_))
    }

    /// Lowercased tag name; `None` for text and document nodes.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => Some(el.tag.as_str()),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => el
                .attrs
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attr(id, "class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).any(|c| c == class)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Parent only if it is an element (the `#document` node is not).
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
    }

    /// Ancestors, nearest first, up to and including the `#document` node.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |n| self.parent(*n))
    }

    /// Number of element ancestors; the `<html>` element sits at depth 0.
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).filter(|a| self.is_element(*a)).count()
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        id == self.root() || self.ancestors(id).any(|a| a == self.root())
    }

    /// Pre-order walk below `id`, `id` itself excluded.
    pub fn descendants(&self, id: NodeId) -> TreeWalker<'_, fn(&Document, NodeId) -> bool> {
        TreeWalker::new(self, id, reject_none as fn(&Document, NodeId) -> bool)
    }

    /// Pre-order walk below `id` that neither yields nor enters nodes for
    /// which `reject` returns true.
    pub fn walk_filtered<F>(&self, id: NodeId, reject: F) -> TreeWalker<'_, F>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        TreeWalker::new(self, id, reject)
    }

    /// Concatenated text of every text node below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(t) = self.text(id) {
            return t.to_string();
        }
        self.descendants(id)
            .filter_map(|n| self.text(n))
            .collect()
    }

    pub fn query_selector_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.descendants(self.root())
            .filter(|n| selector.matches(self, *n))
            .collect()
    }

    pub fn query_selector(&self, selector: &Selector) -> Option<NodeId> {
        self.descendants(self.root())
            .find(|n| selector.matches(self, *n))
    }
}

fn reject_none(_: &Document, _: NodeId) -> bool {
    false
}

/// Iterative pre-order traversal with an explicit stack.
pub struct TreeWalker<'a, F> {
    doc: &'a Document,
    stack: Vec<NodeId>,
    reject: F,
}

impl<'a, F> TreeWalker<'a, F>
where
    F: Fn(&Document, NodeId) -> bool,
{
    fn new(doc: &'a Document, root: NodeId, reject: F) -> Self {
        let stack = doc.children(root).iter().rev().copied().collect();
        Self { doc, stack, reject }
    }
}

impl<F> Iterator for TreeWalker<'_, F>
where
    F: Fn(&Document, NodeId) -> bool,
{
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(node) = self.stack.pop() {
            if (self.reject)(self.doc, node) {
                continue;
            }
            self.stack
                .extend(self.doc.children(node).iter().rev().copied());
            return Some(node);
        }
        None
    }
}
