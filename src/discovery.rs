//! Locates recommendation feeds without knowing the page's markup.
//!
//! A feed is a run of structurally identical tiles, each wrapping a thumbnail
//! link to a watch page. Elements are fingerprinted by tag, class set and
//! depth; a fingerprint shared by enough elements close above a thumbnail
//! link marks a feed, and the lowest common ancestor of that feed's links is
//! where its watcher attaches.

use crate::config::PageConfig;
use crate::dom::{Document, NodeId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerGroupKey {
    pub tag: String,
    pub classes: Vec<String>,
    pub depth: usize,
}

impl ContainerGroupKey {
    pub fn of(doc: &Document, el: NodeId) -> Option<Self> {
        let tag = doc.tag(el)?.to_string();
        let mut classes: Vec<String> = doc.classes(el).map(str::to_string).collect();
        classes.sort();
        classes.dedup();
        Some(Self {
            tag,
            classes,
            depth: doc.depth(el),
        })
    }
}

impl fmt::Display for ContainerGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}__{}__depth{}", self.tag, self.classes.join(" "), self.depth)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Members a fingerprint needs before it counts as a feed.
    pub threshold: usize,
    /// How far above a thumbnail link to look for the tile.
    pub ancestor_levels: usize,
    /// Substring of `href` that marks a link to a video.
    pub watch_marker: String,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self::from_config(&PageConfig::default())
    }
}

impl DiscoveryOptions {
    pub fn from_config(page: &PageConfig) -> Self {
        Self {
            threshold: page.group_threshold,
            ancestor_levels: page.ancestor_levels,
            watch_marker: page.watch_marker.clone(),
        }
    }
}

/// One feed: the thumbnail links that share a confirmed tile fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationGroup {
    pub key: ContainerGroupKey,
    pub anchors: Vec<NodeId>,
}

impl RecommendationGroup {
    /// Where the watcher for this feed observes.
    pub fn root(&self, doc: &Document) -> Option<NodeId> {
        common_ancestor(doc, &self.anchors)
    }
}

fn is_candidate_container(doc: &Document, el: NodeId) -> bool {
    !matches!(doc.tag(el), Some("script" | "style")) && doc.element_children(el).next().is_some()
}

fn is_thumbnail_link(doc: &Document, el: NodeId, marker: &str) -> bool {
    doc.tag(el) == Some("a")
        && doc.attr(el, "href").is_some_and(|href| href.contains(marker))
        && doc.descendants(el).any(|d| doc.tag(d) == Some("img"))
}

/// Nearest ancestor (within the level cap) whose fingerprint passes `accept`.
fn tile_key<F>(doc: &Document, anchor: NodeId, levels: usize, mut accept: F) -> Option<ContainerGroupKey>
where
    F: FnMut(&ContainerGroupKey) -> bool,
{
    let mut current = anchor;
    for _ in 0..levels {
        current = doc.parent_element(current)?;
        let key = ContainerGroupKey::of(doc, current)?;
        if accept(&key) {
            return Some(key);
        }
    }
    None
}

/// Returns one group per feed found, in the document order of each feed's
/// first link. Empty when nothing repeats often enough yet.
pub fn find_recommendation_links(doc: &Document, opts: &DiscoveryOptions) -> Vec<RecommendationGroup> {
    // Fingerprint every element that has element children.
    let mut counts: FxHashMap<ContainerGroupKey, usize> = FxHashMap::default();
    for el in doc.descendants(doc.root()) {
        if doc.is_element(el) && is_candidate_container(doc, el) {
            if let Some(key) = ContainerGroupKey::of(doc, el) {
                *counts.entry(key).or_default() += 1;
            }
        }
    }

    // Thumbnail links whose nearby ancestor belongs to a big enough group.
    let mut confirmed: FxHashSet<ContainerGroupKey> = FxHashSet::default();
    let links: Vec<NodeId> = doc
        .descendants(doc.root())
        .filter(|el| is_thumbnail_link(doc, *el, &opts.watch_marker))
        .filter(|a| {
            let key = tile_key(doc, *a, opts.ancestor_levels, |key| {
                counts.get(key).is_some_and(|n| *n >= opts.threshold)
            });
            match key {
                Some(key) => {
                    confirmed.insert(key);
                    true
                }
                None => false,
            }
        })
        .collect();

    // Split the links by the confirmed fingerprint they sit under.
    let mut groups: Vec<RecommendationGroup> = Vec::new();
    for a in links {
        let Some(key) = tile_key(doc, a, opts.ancestor_levels, |key| confirmed.contains(key)) else {
            continue;
        };
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.anchors.push(a),
            None => groups.push(RecommendationGroup {
                key,
                anchors: vec![a],
            }),
        }
    }
    groups
}

/// Lowest node that is an ancestor-or-self of every node in `nodes`.
pub fn common_ancestor(doc: &Document, nodes: &[NodeId]) -> Option<NodeId> {
    let (first, rest) = nodes.split_first()?;

    let path_from_root = |node: NodeId| {
        let mut path: Vec<NodeId> = doc.ancestors(node).collect();
        path.reverse();
        path.push(node);
        path
    };

    let mut common = path_from_root(*first);
    for node in rest {
        let path = path_from_root(*node);
        let shared = common
            .iter()
            .zip(path.iter())
            .take_while(|(a, b)| a == b)
            .count();
        common.truncate(shared);
    }
    common.pop()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `<html><body><div#feed>` with `n` tiles, each
    /// `<div.tile.item><a href=/watch?v=i><img/></a><span>name</span></div>`.
    fn feed(n: usize) -> (Document, NodeId, Vec<NodeId>) {
        let mut doc = Document::new();
        let html = doc.create_element("html");
        let body = doc.create_element("body");
        let feed = doc.create_element_with("div", &[("id", "feed")]);
        doc.append_child(doc.root(), html).unwrap();
        doc.append_child(html, body).unwrap();
        doc.append_child(body, feed).unwrap();

        let mut anchors = Vec::new();
        for i in 0..n {
            let tile = doc.create_element_with("div", &[("class", "tile item")]);
            let href = format!("/watch?v={}", i);
            let a = doc.create_element_with("a", &[("href", href.as_str())]);
            let img = doc.create_element("img");
            let span = doc.create_element("span");
            let name = doc.create_text("name");
            doc.append_child(a, img).unwrap();
            doc.append_child(span, name).unwrap();
            doc.append_child(tile, a).unwrap();
            doc.append_child(tile, span).unwrap();
            doc.append_child(feed, tile).unwrap();
            anchors.push(a);
        }
        (doc, feed, anchors)
    }

    #[test]
    fn test_six_tiles_make_one_group() {
        let (doc, feed, anchors) = feed(6);
        let groups = find_recommendation_links(&doc, &DiscoveryOptions::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].anchors, anchors);
        assert_eq!(groups[0].key.tag, "div");
        assert_eq!(groups[0].key.classes, vec!["item", "tile"]);
        assert_eq!(groups[0].root(&doc), Some(feed));
    }

    #[test]
    fn test_four_tiles_stay_below_threshold() {
        let (doc, _, _) = feed(4);
        assert!(find_recommendation_links(&doc, &DiscoveryOptions::default()).is_empty());
    }

    #[test]
    fn test_five_tiles_meet_threshold() {
        let (doc, _, _) = feed(5);
        assert_eq!(find_recommendation_links(&doc, &DiscoveryOptions::default()).len(), 1);
    }

    #[test]
    fn test_class_order_does_not_matter() {
        let (mut doc, feed, _) = feed(4);
        let tile = doc.create_element_with("div", &[("class", "item  tile tile")]);
        let a = doc.create_element_with("a", &[("href", "https://www.youtube.com/watch?v=x")]);
        let img = doc.create_element("img");
        doc.append_child(a, img).unwrap();
        doc.append_child(tile, a).unwrap();
        doc.append_child(feed, tile).unwrap();

        let groups = find_recommendation_links(&doc, &DiscoveryOptions::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].anchors.len(), 5);
    }

    #[test]
    fn test_links_without_images_or_watch_urls_are_ignored() {
        let (mut doc, feed, _) = feed(6);
        for href in ["/channel/abc", "/watch?v=noimg"] {
            let tile = doc.create_element_with("div", &[("class", "tile item")]);
            let a = doc.create_element_with("a", &[("href", href)]);
            let child = if href.contains("watch") {
                doc.create_element("span")
            } else {
                doc.create_element("img")
            };
            doc.append_child(a, child).unwrap();
            doc.append_child(tile, a).unwrap();
            doc.append_child(feed, tile).unwrap();
        }
        let groups = find_recommendation_links(&doc, &DiscoveryOptions::default());
        assert_eq!(groups[0].anchors.len(), 6);
    }

    #[test]
    fn test_two_rails_give_two_groups() {
        let (mut doc, _, first) = feed(5);
        let html = doc.document_element().unwrap();
        let aside = doc.create_element("aside");
        doc.append_child(html, aside).unwrap();
        let mut second = Vec::new();
        for i in 0..5 {
            let card = doc.create_element_with("section", &[("class", "card")]);
            let wrap = doc.create_element("div");
            let href = format!("/watch?v=side{}", i);
            let a = doc.create_element_with("a", &[("href", href.as_str())]);
            let img = doc.create_element("img");
            doc.append_child(a, img).unwrap();
            doc.append_child(wrap, a).unwrap();
            doc.append_child(card, wrap).unwrap();
            doc.append_child(aside, card).unwrap();
            second.push(a);
        }

        let groups = find_recommendation_links(&doc, &DiscoveryOptions::default());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].anchors, first);
        assert_eq!(groups[1].anchors, second);
        // The bare wrapper right above each link repeats too, and is nearer.
        assert_eq!(groups[1].key.tag, "div");
        assert!(groups[1].key.classes.is_empty());
        assert_eq!(groups[1].key.depth, 3);
        assert_eq!(groups[1].root(&doc), Some(aside));
    }

    #[test]
    fn test_nearest_qualifying_level_wins() {
        // Both the tile (level 1) and the row wrapping it (level 2) repeat;
        // the tile is closer to the link and must win.
        let mut doc = Document::new();
        let html = doc.create_element("html");
        doc.append_child(doc.root(), html).unwrap();
        for i in 0..5 {
            let row = doc.create_element_with("div", &[("class", "row")]);
            let tile = doc.create_element_with("div", &[("class", "tile")]);
            let href = format!("/watch?v={}", i);
            let a = doc.create_element_with("a", &[("href", href.as_str())]);
            let img = doc.create_element("img");
            doc.append_child(a, img).unwrap();
            doc.append_child(tile, a).unwrap();
            doc.append_child(row, tile).unwrap();
            doc.append_child(html, row).unwrap();
        }
        let groups = find_recommendation_links(&doc, &DiscoveryOptions::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key.classes, vec!["tile"]);
    }

    #[test]
    fn test_script_and_style_are_not_candidates() {
        let mut doc = Document::new();
        let html = doc.create_element("html");
        doc.append_child(doc.root(), html).unwrap();
        for i in 0..6 {
            let script = doc.create_element("script");
            let href = format!("/watch?v={}", i);
            let a = doc.create_element_with("a", &[("href", href.as_str())]);
            let img = doc.create_element("img");
            doc.append_child(a, img).unwrap();
            doc.append_child(script, a).unwrap();
            doc.append_child(html, script).unwrap();
        }
        assert!(find_recommendation_links(&doc, &DiscoveryOptions::default()).is_empty());
    }

    #[test]
    fn test_common_ancestor_is_the_wrapper_exactly() {
        let mut doc = Document::new();
        let html = doc.create_element("html");
        let wrapper = doc.create_element("div");
        let deep = doc.create_element("div");
        doc.append_child(doc.root(), html).unwrap();
        doc.append_child(html, wrapper).unwrap();
        doc.append_child(wrapper, deep).unwrap();
        let a = doc.create_element("span");
        let b = doc.create_element("span");
        let c = doc.create_element("span");
        doc.append_child(deep, a).unwrap();
        doc.append_child(deep, b).unwrap();
        doc.append_child(wrapper, c).unwrap();

        assert_eq!(common_ancestor(&doc, &[a, b, c]), Some(wrapper));
        assert_eq!(common_ancestor(&doc, &[a, b]), Some(deep));
        assert_eq!(common_ancestor(&doc, &[a]), Some(a));
        assert_eq!(common_ancestor(&doc, &[]), None);
    }

    #[test]
    fn test_key_display() {
        let (doc, feed, _) = feed(1);
        let tile = doc.element_children(feed).next().unwrap();
        let key = ContainerGroupKey::of(&doc, tile).unwrap();
        assert_eq!(key.to_string(), "div__item tile__depth3");
    }
}
