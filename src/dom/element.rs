use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a node inside a [`DomTree`](crate::dom::DomTree) arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Input types that render as buttons or pickers rather than text fields
const NON_TEXT_INPUT_TYPES: &[&str] = &[
    "button", "checkbox", "color", "file", "hidden", "image", "radio", "range", "reset", "submit",
];

/// Represents one rendered DOM element of a snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementNode {
    /// HTML tag name in lowercase (e.g., "div", "button", "input")
    pub tag_name: String,

    /// Element attributes in document order
    #[serde(default)]
    pub attributes: IndexMap<String, String>,

    /// Positional path, e.g. `/body[1]/form[1]/input[2]`
    pub path: String,

    /// Trimmed direct text of the element (descendant text excluded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Whether the element passed the visibility filter
    #[serde(default)]
    pub is_visible: bool,

    /// Whether the element is interactive (clickable, input, etc.)
    #[serde(default)]
    pub is_interactive: bool,

    /// Driver handle used to find this element again
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,

    /// Owning element, `None` for the root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,

    /// Element and text children in document order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
}

/// Leaf text content owned by an element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextNode {
    pub text: String,
    pub is_visible: bool,
    pub parent: NodeId,
}

/// A node of the materialized tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomNode {
    Element(ElementNode),
    Text(TextNode),
}

impl DomNode {
    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            DomNode::Element(element) => Some(element),
            DomNode::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            DomNode::Text(text) => Some(text),
            DomNode::Element(_) => None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            DomNode::Element(element) => element.parent,
            DomNode::Text(text) => Some(text.parent),
        }
    }
}

/// Everything a driver needs to find an element of a snapshot again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTarget {
    pub path: String,
    pub locator: Option<String>,
    pub dom_id: Option<String>,
}

/// Bounding box coordinates for an element, relative to the viewport
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementNode {
    /// Create a new ElementNode
    pub fn new(tag_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into().to_lowercase(),
            attributes: IndexMap::new(),
            path: path.into(),
            text: None,
            is_visible: false,
            is_interactive: false,
            locator: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Get attribute value by key
    pub fn get_attribute(&self, key: &str) -> Option<&String> {
        self.attributes.get(key)
    }

    /// Check if element has a specific class
    pub fn has_class(&self, class_name: &str) -> bool {
        self.attributes
            .get("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class_name))
    }

    /// Get element ID
    pub fn id(&self) -> Option<&String> {
        self.attributes.get("id")
    }

    /// Check if element is a specific tag
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    /// Whether typing into this element would change its text
    pub fn accepts_text(&self) -> bool {
        if self.attributes.contains_key("disabled") || self.attributes.contains_key("readonly") {
            return false;
        }

        if self.is_tag("textarea") {
            return true;
        }

        if self.is_tag("input") {
            let input_type = self
                .get_attribute("type")
                .map(|t| t.trim().to_ascii_lowercase())
                .unwrap_or_default();
            return !NON_TEXT_INPUT_TYPES.contains(&input_type.as_str());
        }

        self.get_attribute("contenteditable")
            .is_some_and(|v| v.is_empty() || v.eq_ignore_ascii_case("true") || v == "plaintext-only")
    }

    /// Handle for the page driver
    pub fn target(&self) -> ElementTarget {
        ElementTarget {
            path: self.path.clone(),
            locator: self.locator.clone(),
            dom_id: self.id().cloned(),
        }
    }
}

impl BoundingBox {
    /// Create a new BoundingBox
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Check if the bounding box has non-zero dimensions
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Whether the box touches the `[0, width] x [0, height]` viewport rectangle
    pub fn intersects_viewport(&self, width: f64, height: f64) -> bool {
        let bottom = self.y + self.height;
        let right = self.x + self.width;
        bottom >= 0.0 && right >= 0.0 && self.y <= height && self.x <= width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(input_type: Option<&str>) -> ElementNode {
        let mut element = ElementNode::new("input", "/body[1]/input[1]");
        if let Some(t) = input_type {
            element.attributes.insert("type".to_string(), t.to_string());
        }
        element
    }

    #[test]
    fn test_element_node_creation() {
        let mut element = ElementNode::new("BUTTON", "/body[1]/button[1]");
        element.attributes.insert("id".to_string(), "test-id".to_string());
        element.attributes.insert("class".to_string(), "btn primary".to_string());

        assert_eq!(element.tag_name, "button");
        assert_eq!(element.id(), Some(&"test-id".to_string()));
        assert!(element.has_class("primary"));
        assert!(!element.has_class("hidden"));
        assert!(element.is_tag("Button"));
    }

    #[test]
    fn test_accepts_text() {
        assert!(input(None).accepts_text());
        assert!(input(Some("email")).accepts_text());
        assert!(input(Some("Password")).accepts_text());
        assert!(!input(Some("checkbox")).accepts_text());
        assert!(!input(Some("submit")).accepts_text());

        let mut disabled = input(Some("text"));
        disabled.attributes.insert("disabled".to_string(), String::new());
        assert!(!disabled.accepts_text());

        assert!(ElementNode::new("textarea", "/body[1]/textarea[1]").accepts_text());
        assert!(!ElementNode::new("span", "/body[1]/span[1]").accepts_text());
        assert!(!ElementNode::new("select", "/body[1]/select[1]").accepts_text());

        let mut editable = ElementNode::new("div", "/body[1]/div[1]");
        editable.attributes.insert("contenteditable".to_string(), "true".to_string());
        assert!(editable.accepts_text());
        editable.attributes.insert("contenteditable".to_string(), "false".to_string());
        assert!(!editable.accepts_text());
    }

    #[test]
    fn test_target_prefers_snapshot_handles() {
        let mut element = ElementNode::new("a", "/body[1]/a[1]");
        element.locator = Some("/html[1]/body[1]/a[1]".to_string());
        element.attributes.insert("id".to_string(), "home".to_string());

        let target = element.target();
        assert_eq!(target.path, "/body[1]/a[1]");
        assert_eq!(target.locator.as_deref(), Some("/html[1]/body[1]/a[1]"));
        assert_eq!(target.dom_id.as_deref(), Some("home"));
    }

    #[test]
    fn test_bounding_box() {
        let bbox = BoundingBox::new(10.0, 20.0, 100.0, 50.0);
        assert!(bbox.has_area());
        assert!(bbox.intersects_viewport(800.0, 600.0));

        assert!(!BoundingBox::new(0.0, 0.0, 0.0, 10.0).has_area());

        let below_fold = BoundingBox::new(0.0, 900.0, 100.0, 20.0);
        assert!(!below_fold.intersects_viewport(800.0, 600.0));

        let scrolled_past = BoundingBox::new(0.0, -80.0, 100.0, 50.0);
        assert!(!scrolled_past.intersects_viewport(800.0, 600.0));

        let touching_edge = BoundingBox::new(800.0, 0.0, 10.0, 10.0);
        assert!(touching_edge.intersects_viewport(800.0, 600.0));
    }

    #[test]
    fn test_serialization() {
        let mut element = ElementNode::new("button", "/body[1]/button[1]");
        element.text = Some("Click".to_string());
        element.is_visible = true;
        element.parent = Some(NodeId(0));

        let node = DomNode::Element(element);
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"kind\":\"element\""));

        let deserialized: DomNode = serde_json::from_str(&json).unwrap();
        assert_eq!(node, deserialized);
    }
}
