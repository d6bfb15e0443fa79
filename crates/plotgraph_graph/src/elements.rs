// SPDX-License-Identifier: MIT OR Apache-2.0
//! View annotations carried by a graph: groups, sticky notes and pinned
//! elements. The core stores them and reports changes; it never interprets
//! them.

use crate::node::{NodeId, Rect};
use serde::{Deserialize, Serialize};

/// A titled frame around a set of nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Title
    pub title: String,
    /// RGBA color
    pub color: [f32; 4],
    /// Frame rectangle
    pub position: Rect,
    /// Member nodes
    #[serde(default)]
    pub inner_node_ids: Vec<NodeId>,
}

impl Group {
    /// New empty group at a position
    pub fn new(title: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            title: title.into(),
            color: [0.0, 0.0, 0.0, 0.3],
            position: Rect {
                x,
                y,
                width: 400.0,
                height: 200.0,
            },
            inner_node_ids: Vec::new(),
        }
    }

    /// Add member nodes
    pub fn with_nodes(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.inner_node_ids.extend(nodes);
        self
    }
}

/// A free-standing comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyNote {
    /// Note rectangle
    pub position: Rect,
    /// Title
    pub title: String,
    /// Body text
    pub content: String,
}

impl StickyNote {
    /// New note at a position
    pub fn new(title: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            position: Rect {
                x,
                y,
                width: 200.0,
                height: 300.0,
            },
            title: title.into(),
            content: "Content".to_string(),
        }
    }
}

/// A host panel pinned to the graph view, keyed by its editor type name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedElement {
    /// Panel rectangle
    pub position: Rect,
    /// Whether the panel is shown
    pub opened: bool,
    /// Full name of the host editor type
    pub editor_type: String,
}

impl PinnedElement {
    /// New open panel with the default size
    pub fn new(editor_type: impl Into<String>) -> Self {
        Self {
            position: Rect {
                x: 0.0,
                y: 0.0,
                width: 150.0,
                height: 200.0,
            },
            opened: true,
            editor_type: editor_type.into(),
        }
    }
}
