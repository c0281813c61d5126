//! Page snapshots. A saved `.html` page is parsed with scraper and copied
//! into the arena. Anything else is read as JSON: an element is
//! `{"tag": .., "attrs": {..}, "children": [..]}`, a text node is a bare
//! string.

use super::{Document, DomError, NodeId};
use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Node};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Text(String),
    Element {
        tag: String,
        #[serde(default)]
        attrs: BTreeMap<String, String>,
        #[serde(default)]
        children: Vec<NodeSpec>,
    },
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("the snapshot root must be an element")]
    TextRoot,
    #[error(transparent)]
    Dom(#[from] DomError),
}

impl NodeSpec {
    pub fn element(tag: &str, attrs: &[(&str, &str)], children: Vec<NodeSpec>) -> Self {
        NodeSpec::Element {
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            children,
        }
    }

    pub fn text(text: &str) -> Self {
        NodeSpec::Text(text.to_string())
    }

    /// Builds the subtree detached and returns its root.
    pub fn build(&self, doc: &mut Document) -> Result<NodeId, DomError> {
        match self {
            NodeSpec::Text(t) => Ok(doc.create_text(t)),
            NodeSpec::Element {
                tag,
                attrs,
                children,
            } => {
                let id = doc.create_element(tag);
                for (name, value) in attrs {
                    doc.set_attr(id, name, value);
                }
                for child in children {
                    let child_id = child.build(doc)?;
                    doc.append_child(id, child_id)?;
                }
                Ok(id)
            }
        }
    }
}

/// Builds a fresh document whose top-level element is `spec`.
pub fn to_document(spec: &NodeSpec) -> Result<Document, SnapshotError> {
    if matches!(spec, NodeSpec::Text(_)) {
        return Err(SnapshotError::TextRoot);
    }
    let mut doc = Document::new();
    let top = spec.build(&mut doc)?;
    let root = doc.root();
    doc.append_child(root, top)?;
    Ok(doc)
}

/// Parses an HTML page. Comments, doctype and processing instructions are
/// dropped; elements and text are kept.
pub fn from_html(source: &str) -> Result<Document, DomError> {
    let html = Html::parse_document(source);
    let mut doc = Document::new();
    let top = copy_element(&mut doc, html.root_element())?;
    let root = doc.root();
    doc.append_child(root, top)?;
    Ok(doc)
}

fn copy_element(doc: &mut Document, source: ElementRef<'_>) -> Result<NodeId, DomError> {
    let el = source.value();
    let attrs: Vec<(&str, &str)> = el.attrs().collect();
    let id = doc.create_element_with(el.name(), &attrs);
    for child in source.children() {
        let copied = match child.value() {
            Node::Text(text) => doc.create_text(text),
            Node::Element(_) => match ElementRef::wrap(child) {
                Some(element) => copy_element(doc, element)?,
                None => continue,
            },
            _ => continue,
        };
        doc.append_child(id, copied)?;
    }
    Ok(id)
}

pub async fn load(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let is_html = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"));
    if is_html {
        return Ok(from_html(&contents)?);
    }
    let spec: NodeSpec = serde_json::from_str(&contents).context("Failed to parse snapshot JSON")?;
    Ok(to_document(&spec)?)
}
