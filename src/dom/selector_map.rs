use crate::dom::element::{ElementNode, NodeId};
use crate::dom::tree::DomTree;
use crate::error::{BrowserError, Result};
use indexmap::IndexMap;
use serde::Serialize;

/// Attributes worth showing to the model, in display order
const DISPLAY_ATTRIBUTES: &[&str] = &[
    "id",
    "name",
    "type",
    "role",
    "placeholder",
    "aria-label",
    "title",
    "href",
    "value",
    "alt",
];

const MAX_TEXT_CHARS: usize = 80;
const MAX_ATTRIBUTE_CHARS: usize = 60;

/// Map of element indices to the interactive nodes of one snapshot
/// Uses IndexMap to preserve insertion order
#[derive(Debug, Clone, Default)]
pub struct SelectorMap {
    /// Map from index to arena node
    map: IndexMap<usize, NodeId>,

    /// Next available index
    next_index: usize,

    /// Set once the page may have changed since the snapshot
    invalidated: bool,
}

/// JSON view of one indexed element
#[derive(Debug, Serialize)]
struct IndexedElement<'a> {
    index: usize,
    tag_name: &'a str,
    path: &'a str,
    attributes: &'a IndexMap<String, String>,
    text: String,
    parent: Option<&'a str>,
}

impl SelectorMap {
    /// Create a new empty SelectorMap
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every visible interactive element of `tree` in pre-order
    pub fn flatten(tree: &DomTree) -> Self {
        let mut map = Self::new();
        for id in tree.elements_preorder() {
            if let Some(element) = tree.element(id) {
                if element.is_interactive && element.is_visible {
                    map.register(id);
                }
            }
        }
        map
    }

    /// Register a new element and return its assigned index
    pub fn register(&mut self, node: NodeId) -> usize {
        let index = self.next_index;
        self.map.insert(index, node);
        self.next_index += 1;
        index
    }

    /// Get node by index, `None` when absent or invalidated
    pub fn get(&self, index: usize) -> Option<NodeId> {
        if self.invalidated {
            return None;
        }
        self.map.get(&index).copied()
    }

    /// Resolve an index, distinguishing stale maps from missing indices
    pub fn resolve(&self, index: usize) -> Result<NodeId> {
        if self.invalidated {
            return Err(BrowserError::StaleElement {
                index,
                reason: "the selector map was invalidated by a page change".to_string(),
            });
        }
        self.map
            .get(&index)
            .copied()
            .ok_or(BrowserError::ElementNotFound { index })
    }

    /// Check if index exists
    pub fn contains(&self, index: usize) -> bool {
        !self.invalidated && self.map.contains_key(&index)
    }

    /// Get the number of registered elements
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drop all entries; every later lookup fails until a new map is built
    pub fn invalidate(&mut self) {
        self.map.clear();
        self.next_index = 0;
        self.invalidated = true;
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// Iterate over all (index, node) pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.map.iter().map(|(index, node)| (*index, *node))
    }

    /// Get all indices
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.map.keys().copied()
    }

    /// Find index by path identifier
    pub fn find_by_path(&self, tree: &DomTree, path: &str) -> Option<usize> {
        self.iter()
            .find(|(_, node)| tree.element(*node).is_some_and(|e| e.path == path))
            .map(|(index, _)| index)
    }

    /// Find index by element ID attribute
    pub fn find_by_dom_id(&self, tree: &DomTree, id: &str) -> Option<usize> {
        self.iter()
            .find(|(_, node)| tree.element(*node).and_then(ElementNode::id).map(String::as_str) == Some(id))
            .map(|(index, _)| index)
    }

    /// One line per element, `[index]<tag attr='value'>text</tag>`
    pub fn describe(&self, tree: &DomTree) -> String {
        self.iter()
            .filter_map(|(index, node)| {
                let element = tree.element(node)?;
                Some(describe_element(index, element, &tree.text_content(node)))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Export to JSON for debugging
    pub fn to_json(&self, tree: &DomTree) -> std::result::Result<String, serde_json::Error> {
        let entries: Vec<IndexedElement<'_>> = self
            .iter()
            .filter_map(|(index, node)| {
                let element = tree.element(node)?;
                Some(IndexedElement {
                    index,
                    tag_name: &element.tag_name,
                    path: &element.path,
                    attributes: &element.attributes,
                    text: tree.text_content(node),
                    parent: tree.parent(node).map(|p| p.path.as_str()),
                })
            })
            .collect();
        serde_json::to_string_pretty(&entries)
    }
}

fn describe_element(index: usize, element: &ElementNode, text: &str) -> String {
    let mut line = format!("[{}]<{}", index, element.tag_name);
    for name in DISPLAY_ATTRIBUTES {
        if let Some(value) = element.get_attribute(name) {
            let value = truncate(value.trim(), MAX_ATTRIBUTE_CHARS);
            line.push_str(&format!(" {}='{}'", name, value));
        }
    }
    line.push('>');
    line.push_str(&truncate(text.trim(), MAX_TEXT_CHARS));
    line.push_str(&format!("</{}>", element.tag_name));
    line
}

/// Shorten on a char boundary, marking the cut with "..."
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}
