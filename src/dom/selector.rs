//! CSS selectors over the arena document. Parsing and matching are done by
//! the `selectors` engine with scraper's selector grammar; `ElementView`
//! exposes an arena node to it.

use super::{Document, NodeId};
use cssparser::ParserInput;
use scraper::selector::Simple;
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{
    self, ElementSelectorFlags, IgnoreNthChildForInvalidation, MatchingContext, MatchingMode,
    NeedsSelectorFlags, QuirksMode,
};
use selectors::parser::{ParseRelative, SelectorImpl, SelectorList, SelectorParseErrorKind};
use selectors::{Element, NthIndexCache, OpaqueElement};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid selector '{selector}': {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

struct PageParser;

impl<'i> selectors::parser::Parser<'i> for PageParser {
    type Impl = Simple;
    type Error = SelectorParseErrorKind<'i>;
}

pub struct Selector {
    source: String,
    list: SelectorList<Simple>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let source = input.trim();
        let mut parser_input = ParserInput::new(source);
        let mut parser = cssparser::Parser::new(&mut parser_input);
        let list = SelectorList::parse(&PageParser, &mut parser, ParseRelative::No).map_err(|e| {
            SelectorError {
                selector: source.to_string(),
                reason: format!("{:?}", e.kind),
            }
        })?;
        Ok(Self {
            source: source.to_string(),
            list,
        })
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if !doc.is_element(node) {
            return false;
        }
        let mut nth_index_cache = NthIndexCache::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut nth_index_cache,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            IgnoreNthChildForInvalidation::No,
        );
        matching::matches_selector_list(&self.list, &ElementView { doc, id: node }, &mut context)
    }
}

impl Clone for Selector {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            list: self.list.clone(),
        }
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.source).finish()
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// An element of the arena as the selector engine sees it.
#[derive(Clone, Copy)]
struct ElementView<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> ElementView<'a> {
    fn wrap(doc: &'a Document, id: NodeId) -> Option<Self> {
        doc.is_element(id).then_some(Self { doc, id })
    }

    fn siblings(&self) -> (&'a [NodeId], usize) {
        let Some(parent) = self.doc.parent(self.id) else {
            return (&[], 0);
        };
        let children = self.doc.children(parent);
        let pos = children.iter().position(|c| *c == self.id).unwrap_or(0);
        (children, pos)
    }

    fn tag(&self) -> &'a str {
        self.doc.tag(self.id).unwrap_or("")
    }
}

impl fmt::Debug for ElementView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> {:?}", self.tag(), self.id)
    }
}

impl Element for ElementView<'_> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.doc.data(self.id))
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc
            .parent_element(self.id)
            .map(|id| Self { doc: self.doc, id })
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let (siblings, pos) = self.siblings();
        siblings[..pos]
            .iter()
            .rev()
            .find_map(|id| Self::wrap(self.doc, *id))
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let (siblings, pos) = self.siblings();
        siblings
            .iter()
            .skip(pos + 1)
            .find_map(|id| Self::wrap(self.doc, *id))
    }

    fn first_element_child(&self) -> Option<Self> {
        self.doc
            .element_children(self.id)
            .next()
            .map(|id| Self { doc: self.doc, id })
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &<Simple as SelectorImpl>::BorrowedLocalName) -> bool {
        let name: &str = &name.0;
        self.tag() == name
    }

    fn has_namespace(&self, ns: &<Simple as SelectorImpl>::BorrowedNamespaceUrl) -> bool {
        let url: &str = ns;
        url.is_empty() || url == "http://www.w3.org/1999/xhtml"
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.tag() == other.tag()
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&<Simple as SelectorImpl>::NamespaceUrl>,
        local_name: &<Simple as SelectorImpl>::LocalName,
        operation: &AttrSelectorOperation<&<Simple as SelectorImpl>::AttrValue>,
    ) -> bool {
        // Attributes here never carry a namespace.
        if let NamespaceConstraint::Specific(url) = ns {
            if !url.is_empty() {
                return false;
            }
        }
        let name: &str = &local_name.0;
        self.doc
            .attr(self.id, name)
            .is_some_and(|value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        _pc: &<Simple as SelectorImpl>::NonTSPseudoClass,
        _context: &mut MatchingContext<Simple>,
    ) -> bool {
        false
    }

    fn match_pseudo_element(
        &self,
        _pe: &<Simple as SelectorImpl>::PseudoElement,
        _context: &mut MatchingContext<Simple>,
    ) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        matches!(self.tag(), "a" | "area" | "link") && self.doc.attr(self.id, "href").is_some()
    }

    fn is_html_slot_element(&self) -> bool {
        self.tag() == "slot"
    }

    fn has_id(&self, id: &<Simple as SelectorImpl>::Identifier, case_sensitivity: CaseSensitivity) -> bool {
        let wanted: &str = &id.0;
        self.doc
            .attr(self.id, "id")
            .is_some_and(|value| case_sensitivity.eq(wanted.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &<Simple as SelectorImpl>::Identifier, case_sensitivity: CaseSensitivity) -> bool {
        let wanted: &str = &name.0;
        self.doc
            .classes(self.id)
            .any(|class| case_sensitivity.eq(wanted.as_bytes(), class.as_bytes()))
    }

    fn imported_part(
        &self,
        _name: &<Simple as SelectorImpl>::Identifier,
    ) -> Option<<Simple as SelectorImpl>::Identifier> {
        None
    }

    fn is_part(&self, _name: &<Simple as SelectorImpl>::Identifier) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.doc.children(self.id).iter().all(|child| {
            !self.doc.is_element(*child) && self.doc.text(*child).map_or(true, str::is_empty)
        })
    }

    fn is_root(&self) -> bool {
        self.doc.parent(self.id) == Some(self.doc.root())
    }
}
