//! Filtering of a driver's DOM render into the raw snapshot tree.
//!
//! The page driver reports facts about every element (computed style, bounding
//! box, click handlers) without judging them. [`SnapshotBuilder`] applies the
//! visibility, viewport and interactivity rules and prunes rejected branches.

use crate::dom::element::BoundingBox;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tags that are always interactive
const INTERACTIVE_TAGS: &[&str] = &["a", "button", "input", "select", "textarea", "details", "audio", "video"];

/// ARIA roles that mark an element as interactive
const INTERACTIVE_ROLES: &[&str] = &[
    "button",
    "link",
    "checkbox",
    "menuitem",
    "menuitemcheckbox",
    "menuitemradio",
    "option",
    "radio",
    "searchbox",
    "switch",
    "tab",
];

/// Inline handler attributes that count as a registered click handler
const HANDLER_ATTRIBUTES: &[&str] = &["onclick", "onmousedown", "onmouseup", "onkeydown", "onkeyup"];

const TEXT_NODE_NAME: &str = "#text";

/// The driver's render of one page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageRender {
    pub viewport: Viewport,

    /// The `<body>` probe, absent when the document has no body yet
    #[serde(default)]
    pub root: Option<Value>,
}

/// Viewport size in CSS pixels
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Computed style properties relevant for filtering
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
    pub cursor: String,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
            cursor: "auto".to_string(),
        }
    }
}

/// What the driver reports about a single element
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ElementProbe {
    node_name: String,
    #[serde(default)]
    attributes: IndexMap<String, String>,
    #[serde(default)]
    rect: BoundingBox,
    #[serde(default)]
    style: ComputedStyle,
    #[serde(default)]
    has_click_handler: bool,
    #[serde(default)]
    locator: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    children: Vec<Value>,
}

/// An accepted element of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub tag_name: String,
    pub attributes: IndexMap<String, String>,
    pub text: Option<String>,
    pub is_visible: bool,
    pub is_interactive: bool,
    pub locator: Option<String>,
    pub children: Vec<RawChild>,
}

/// A child of a raw node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawChild {
    Element(RawNode),
    Text(String),
}

impl RawNode {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into().to_lowercase(),
            attributes: IndexMap::new(),
            text: None,
            is_visible: true,
            is_interactive: false,
            locator: None,
            children: Vec::new(),
        }
    }
}

/// Node counters of the last build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub total_nodes: usize,
    pub processed_nodes: usize,
    pub skipped_nodes: usize,
    pub failed_nodes: usize,
}

/// Builds the raw snapshot tree from a [`PageRender`]
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    stats: SnapshotStats,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters of the most recent [`build`](Self::build)
    pub fn stats(&self) -> SnapshotStats {
        self.stats
    }

    /// Walk the render from the body down, returning `None` if the body itself was rejected
    pub fn build(&mut self, render: &PageRender) -> Option<RawNode> {
        self.stats = SnapshotStats::default();
        let root = render.root.as_ref()?;
        let node = self.build_node(root, &render.viewport);

        log::debug!(
            "Snapshot built: {} nodes seen, {} kept, {} pruned, {} failed",
            self.stats.total_nodes,
            self.stats.processed_nodes,
            self.stats.skipped_nodes,
            self.stats.failed_nodes
        );
        node
    }

    fn build_node(&mut self, value: &Value, viewport: &Viewport) -> Option<RawNode> {
        self.stats.total_nodes += 1;

        let probe = match ElementProbe::deserialize(value) {
            Ok(probe) => probe,
            Err(e) => {
                log::debug!("Skipping malformed node probe: {}", e);
                self.stats.failed_nodes += 1;
                return None;
            }
        };

        if let Some(error) = &probe.error {
            log::debug!("Skipping <{}>: probe failed: {}", probe.node_name, error);
            self.stats.failed_nodes += 1;
            return None;
        }

        if !is_rendered(&probe) || !probe.rect.intersects_viewport(viewport.width, viewport.height) {
            self.stats.skipped_nodes += 1;
            return None;
        }

        self.stats.processed_nodes += 1;

        let mut node = RawNode::new(&probe.node_name);
        node.is_interactive = is_interactive(&probe);
        node.locator = probe.locator.clone();

        let mut direct_text: Vec<String> = Vec::new();
        for child in &probe.children {
            if child.get("nodeName").and_then(Value::as_str) == Some(TEXT_NODE_NAME) {
                let text = child.get("textContent").and_then(Value::as_str).unwrap_or("").trim();
                if !text.is_empty() {
                    direct_text.push(text.to_string());
                    node.children.push(RawChild::Text(text.to_string()));
                }
            } else if let Some(element) = self.build_node(child, viewport) {
                node.children.push(RawChild::Element(element));
            }
        }

        if !direct_text.is_empty() {
            node.text = Some(direct_text.join(" "));
        }
        node.attributes = probe.attributes;

        Some(node)
    }
}

fn is_rendered(probe: &ElementProbe) -> bool {
    probe.rect.has_area()
        && probe.style.display != "none"
        && probe.style.visibility != "hidden"
        && probe.style.opacity > 0.0
}

fn is_interactive(probe: &ElementProbe) -> bool {
    let tag = probe.node_name.to_lowercase();
    if INTERACTIVE_TAGS.contains(&tag.as_str()) {
        return true;
    }

    let has_role = probe
        .attributes
        .get("role")
        .is_some_and(|role| INTERACTIVE_ROLES.contains(&role.trim()));

    let has_inline_handler = probe
        .attributes
        .keys()
        .any(|name| HANDLER_ATTRIBUTES.contains(&name.to_lowercase().as_str()));

    has_role || probe.style.cursor == "pointer" || probe.has_click_handler || has_inline_handler
}
