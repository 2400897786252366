//! DOM snapshot pipeline
//!
//! This module turns a driver's render of a live page into an indexed snapshot:
//! - SnapshotBuilder: filters the render down to visible, in-viewport elements
//! - DomTree: arena of element/text nodes with positional path identifiers
//! - SelectorMap: dense indices for the interactive elements of one snapshot

pub mod element;
pub mod selector_map;
pub mod snapshot;
pub mod tree;

pub use element::{BoundingBox, DomNode, ElementNode, ElementTarget, NodeId, TextNode};
pub use selector_map::SelectorMap;
pub use snapshot::{PageRender, RawChild, RawNode, SnapshotBuilder, SnapshotStats, Viewport};
pub use tree::DomTree;

/// Script evaluated in the page to produce a [`PageRender`] as a JSON string
pub const EXTRACT_DOM_JS: &str = include_str!("extract_dom.js");

/// Build a [`DomTree`] from a render, or `None` when nothing on the page is visible
pub fn snapshot(render: &PageRender) -> Option<DomTree> {
    let raw = SnapshotBuilder::new().build(render)?;
    Some(DomTree::materialize(raw))
}
