use crate::dom::element::{DomNode, ElementNode, NodeId, TextNode};
use crate::dom::selector_map::SelectorMap;
use crate::dom::snapshot::{RawChild, RawNode};
use crate::error::{BrowserError, Result};
use serde::Serialize;
use std::collections::HashMap;

/// One materialized snapshot of a page: an arena of nodes plus its selector map
#[derive(Debug, Clone, Serialize)]
pub struct DomTree {
    /// All nodes, parents before children
    nodes: Vec<DomNode>,

    /// Root element of the DOM tree
    root: NodeId,

    /// Map of indices to interactive elements
    #[serde(skip)]
    pub selector_map: SelectorMap,

    /// Snapshot sequence number assigned by the owner
    #[serde(skip)]
    pub sequence: u64,
}

impl DomTree {
    /// Materialize a raw snapshot into a typed tree and index its interactive elements
    pub fn materialize(raw: RawNode) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            selector_map: SelectorMap::new(),
            sequence: 0,
        };
        // The root has an empty parent path and no siblings
        let root_path = format!("/{}[1]", raw.tag_name);
        tree.root = tree.build_element(raw, root_path, None);
        tree.selector_map = SelectorMap::flatten(&tree);
        tree
    }

    fn build_element(&mut self, raw: RawNode, path: String, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let is_visible = raw.is_visible;

        let mut element = ElementNode::new(raw.tag_name, path.clone());
        element.attributes = raw.attributes;
        element.text = raw.text;
        element.is_visible = is_visible;
        element.is_interactive = raw.is_interactive;
        element.locator = raw.locator;
        element.parent = parent;
        self.nodes.push(DomNode::Element(element));

        let mut sibling_counts: HashMap<String, usize> = HashMap::new();
        let mut children = Vec::with_capacity(raw.children.len());

        for child in raw.children {
            match child {
                RawChild::Text(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    let text_id = NodeId(self.nodes.len());
                    self.nodes.push(DomNode::Text(TextNode {
                        text: text.to_string(),
                        is_visible,
                        parent: id,
                    }));
                    children.push(text_id);
                }
                RawChild::Element(raw_child) => {
                    let count = sibling_counts.entry(raw_child.tag_name.clone()).or_insert(0);
                    *count += 1;
                    let child_path = format!("{}/{}[{}]", path, raw_child.tag_name, count);
                    children.push(self.build_element(raw_child, child_path, Some(id)));
                }
            }
        }

        if let DomNode::Element(element) = &mut self.nodes[id.0] {
            element.children = children;
        }
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(id.0)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementNode> {
        self.nodes.get(id.0).and_then(DomNode::as_element)
    }

    pub fn parent(&self, id: NodeId) -> Option<&ElementNode> {
        self.node(id).and_then(DomNode::parent).and_then(|p| self.element(p))
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &DomNode> + '_ {
        self.element(id)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|child| self.node(*child))
    }

    /// Pre-order walk over element ids, starting at the root
    pub fn elements_preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(element) = self.element(id) else {
                continue;
            };
            order.push(id);
            for child in element.children.iter().rev() {
                if self.element(*child).is_some() {
                    stack.push(*child);
                }
            }
        }
        order
    }

    /// Find an element by its path identifier
    pub fn find_by_path(&self, path: &str) -> Option<&ElementNode> {
        self.nodes
            .iter()
            .filter_map(DomNode::as_element)
            .find(|element| element.path == path)
    }

    /// All text below an element, joined by single spaces
    pub fn text_content(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        self.collect_text(id, &mut parts);
        parts.join(" ")
    }

    fn collect_text<'a>(&'a self, id: NodeId, parts: &mut Vec<&'a str>) {
        match self.node(id) {
            Some(DomNode::Text(text)) => parts.push(&text.text),
            Some(DomNode::Element(element)) => {
                for child in &element.children {
                    self.collect_text(*child, parts);
                }
            }
            None => {}
        }
    }

    /// Count element nodes in the tree
    pub fn count_elements(&self) -> usize {
        self.nodes.iter().filter(|n| n.as_element().is_some()).count()
    }

    /// Count interactive elements
    pub fn count_interactive(&self) -> usize {
        self.selector_map.len()
    }

    /// Indented outline of the tree for debug output
    pub fn outline(&self) -> String {
        let mut lines = Vec::new();
        self.outline_node(self.root, 0, &mut lines);
        lines.join("\n")
    }

    fn outline_node(&self, id: NodeId, depth: usize, lines: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        match self.node(id) {
            Some(DomNode::Element(element)) => {
                lines.push(format!(
                    "{}<{}> {}{}",
                    indent,
                    element.tag_name,
                    element.path,
                    if element.is_interactive { " *" } else { "" }
                ));
                for child in &element.children {
                    self.outline_node(*child, depth + 1, lines);
                }
            }
            Some(DomNode::Text(text)) => lines.push(format!("{}\"{}\"", indent, text.text)),
            None => {}
        }
    }

    /// Convert the DOM tree to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BrowserError::DomParseFailed(format!("Failed to serialize DOM to JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(tag: &str, children: Vec<RawChild>) -> RawNode {
        let mut node = RawNode::new(tag);
        node.children = children;
        node
    }

    fn el(tag: &str, children: Vec<RawChild>) -> RawChild {
        RawChild::Element(raw(tag, children))
    }

    fn interactive(tag: &str) -> RawChild {
        let mut node = raw(tag, vec![]);
        node.is_interactive = true;
        RawChild::Element(node)
    }

    fn text(t: &str) -> RawChild {
        RawChild::Text(t.to_string())
    }

    fn create_test_tree() -> RawNode {
        raw(
            "body",
            vec![
                el("header", vec![interactive("button")]),
                el("main", vec![el("div", vec![text("Some text")]), el("div", vec![interactive("a")]), interactive("button")]),
                el("div", vec![text("   ")]),
            ],
        )
    }

    #[test]
    fn test_paths_follow_sibling_counts() {
        let tree = DomTree::materialize(create_test_tree());

        let paths: Vec<_> = tree
            .elements_preorder()
            .into_iter()
            .map(|id| tree.element(id).unwrap().path.clone())
            .collect();

        assert_eq!(
            paths,
            vec![
                "/body[1]",
                "/body[1]/header[1]",
                "/body[1]/header[1]/button[1]",
                "/body[1]/main[1]",
                "/body[1]/main[1]/div[1]",
                "/body[1]/main[1]/div[2]",
                "/body[1]/main[1]/div[2]/a[1]",
                "/body[1]/main[1]/button[1]",
                "/body[1]/div[1]",
            ]
        );
    }

    #[test]
    fn test_paths_are_unique_and_deterministic() {
        let first = DomTree::materialize(create_test_tree());
        let second = DomTree::materialize(create_test_tree());

        let mut paths: Vec<_> = first
            .elements_preorder()
            .into_iter()
            .map(|id| first.element(id).unwrap().path.clone())
            .collect();
        let again: Vec<_> = second
            .elements_preorder()
            .into_iter()
            .map(|id| second.element(id).unwrap().path.clone())
            .collect();
        assert_eq!(paths, again);

        let total = paths.len();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), total);
    }

    #[test]
    fn test_whitespace_text_is_dropped() {
        let tree = DomTree::materialize(create_test_tree());
        let last_div = tree.find_by_path("/body[1]/div[1]").unwrap();
        assert!(last_div.children.is_empty());

        let text_div = tree.find_by_path("/body[1]/main[1]/div[1]").unwrap();
        assert_eq!(text_div.children.len(), 1);
        let text_node = tree.node(text_div.children[0]).unwrap().as_text().unwrap();
        assert_eq!(text_node.text, "Some text");
        assert!(text_node.is_visible);
    }

    #[test]
    fn test_parent_links() {
        let tree = DomTree::materialize(create_test_tree());
        assert!(tree.parent(tree.root()).is_none());

        let link_id = tree
            .elements_preorder()
            .into_iter()
            .find(|id| tree.element(*id).unwrap().is_tag("a"))
            .unwrap();
        let parent = tree.parent(link_id).unwrap();
        assert_eq!(parent.path, "/body[1]/main[1]/div[2]");
        assert_eq!(tree.children(tree.root()).count(), 3);
    }

    #[test]
    fn test_count_elements() {
        let tree = DomTree::materialize(create_test_tree());
        assert_eq!(tree.count_elements(), 9);
        assert_eq!(tree.count_interactive(), 3);
    }

    #[test]
    fn test_text_content_and_outline() {
        let tree = DomTree::materialize(raw(
            "body",
            vec![el("p", vec![text("Hello"), el("b", vec![text("world")])])],
        ));
        assert_eq!(tree.text_content(tree.root()), "Hello world");

        let outline = tree.outline();
        assert!(outline.starts_with("<body> /body[1]"));
        assert!(outline.contains("    \"world\""));
    }

    #[test]
    fn test_to_json() {
        let mut body = raw("body", vec![el("span", vec![text("Hello")])]);
        body.attributes.insert("id".to_string(), "container".to_string());

        let tree = DomTree::materialize(body);
        let json = tree.to_json().unwrap();

        assert!(json.contains("\"tag_name\": \"body\""));
        assert!(json.contains("\"id\": \"container\""));
        assert!(json.contains("\"span\""));
        assert!(json.contains("Hello"));
    }
}
