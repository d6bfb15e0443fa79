// SPDX-License-Identifier: MIT OR Apache-2.0
//! Copy and paste of node selections.

use crate::edge::{Edge, PortRef};
use crate::elements::Group;
use crate::graph::{Graph, GraphError, Result};
use crate::node::{Node, NodeId};
use crate::port::PortDirection;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Offset applied to pasted nodes and groups
pub const PASTE_OFFSET: f32 = 20.0;

/// A copied selection, detached from any graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Clipboard {
    /// Copied nodes
    pub nodes: Vec<Node>,
    /// Groups containing copied nodes, restricted to those nodes
    #[serde(default)]
    pub groups: Vec<Group>,
    /// Copied edges
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Clipboard {
    /// Whether nothing was copied
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Encode as JSON, the form handed to the system clipboard
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decode from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl Graph {
    /// Copy a selection of nodes.
    ///
    /// Captures every edge between two selected nodes, and edges attached to
    /// a vertical port of a selected node even when the other end stays
    /// behind.
    pub fn copy(&self, node_ids: &[NodeId]) -> Clipboard {
        let selected: HashSet<&NodeId> = node_ids.iter().filter(|id| self.nodes.contains_key(*id)).collect();

        let nodes = self
            .nodes
            .values()
            .filter(|n| selected.contains(&n.id))
            .map(Node::detached_copy)
            .collect();

        let edges = self
            .edges
            .values()
            .filter(|e| {
                let input = selected.contains(&e.input_node_id);
                let output = selected.contains(&e.output_node_id);
                (input && output)
                    || (input && self.is_vertical_end(e, PortDirection::Input))
                    || (output && self.is_vertical_end(e, PortDirection::Output))
            })
            .cloned()
            .collect();

        let groups = self
            .groups
            .iter()
            .filter(|g| g.inner_node_ids.iter().any(|id| selected.contains(id)))
            .map(|g| {
                let mut group = g.clone();
                group.inner_node_ids.retain(|id| selected.contains(id));
                group
            })
            .collect();

        Clipboard { nodes, groups, edges }
    }

    fn is_vertical_end(&self, edge: &Edge, direction: PortDirection) -> bool {
        let end = edge.endpoint(direction);
        self.nodes
            .get(&end.node)
            .and_then(|n| n.port(direction, &end.field, end.port_id.as_deref()))
            .is_some_and(|p| p.data.vertical)
    }

    /// Paste a copied selection; returns the id of every pasted node keyed by
    /// its copied id.
    ///
    /// Nodes get fresh ids from the id policy and move by [`PASTE_OFFSET`].
    /// Edges are recreated through [`Graph::connect`]. An edge whose far end
    /// was not copied reattaches to the original node when it is still in
    /// the graph, unless that port takes a single edge and would lose its
    /// current one.
    pub fn paste(&mut self, clipboard: &Clipboard) -> Result<IndexMap<NodeId, NodeId>> {
        if self.registry().is_none() {
            return Err(GraphError::NotInitialized);
        }

        let mut remap = IndexMap::new();
        for node in &clipboard.nodes {
            let mut copy = node.detached_copy();
            copy.id = NodeId::default();
            copy.position = copy.position.offset(PASTE_OFFSET, PASTE_OFFSET);
            match self.add_node(copy) {
                Ok(id) => {
                    remap.insert(node.id.clone(), id);
                }
                Err(err) => tracing::warn!(node = %node.id, "Skipping pasted node: {err}"),
            }
        }

        for group in &clipboard.groups {
            let mut group = group.clone();
            group.position = group.position.offset(PASTE_OFFSET, PASTE_OFFSET);
            group.inner_node_ids = group
                .inner_node_ids
                .iter()
                .filter_map(|id| remap.get(id).cloned())
                .collect();
            self.add_group(group);
        }

        for edge in &clipboard.edges {
            let (Some(input), Some(output)) = (
                self.paste_endpoint(edge, PortDirection::Input, &remap),
                self.paste_endpoint(edge, PortDirection::Output, &remap),
            ) else {
                tracing::debug!(edge = %edge.id, "Skipping pasted edge without both endpoints");
                continue;
            };
            self.connect(&input, &output);
        }

        tracing::debug!(nodes = remap.len(), "Pasted selection");
        Ok(remap)
    }

    /// Where one end of a pasted edge lands: the pasted copy, or the original
    /// node if it is still present and its port accepts another edge
    fn paste_endpoint(
        &self,
        edge: &Edge,
        direction: PortDirection,
        remap: &IndexMap<NodeId, NodeId>,
    ) -> Option<PortRef> {
        let end = edge.endpoint(direction);
        let other = edge.node(direction.opposite());
        if let Some(copied) = remap.get(&end.node) {
            return Some(PortRef {
                node: copied.clone(),
                ..end
            });
        }
        if !remap.contains_key(other) {
            return None;
        }
        let port = self
            .nodes
            .get(&end.node)?
            .port(direction, &end.field, end.port_id.as_deref())?;
        port.accepts_multiple_edges().then_some(end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{RandomIdPolicy, Rect};
    use crate::registry::NodeRegistry;
    use crate::schema::{FieldAttribute, FieldDecl, NodeCategory, NodeSchema};
    use crate::value::FieldType;
    use std::sync::Arc;

    fn graph() -> Graph {
        let mut registry = NodeRegistry::new();
        registry
            .register(
                NodeSchema::builder("Link", NodeCategory::Custom)
                    .field(FieldDecl::new("from", FieldType::Int).with(FieldAttribute::input_multiple("From")))
                    .field(FieldDecl::new("solo", FieldType::Int).with(FieldAttribute::input("Solo")))
                    .field(
                        FieldDecl::new("to", FieldType::Int)
                            .with_default(3i64)
                            .with(FieldAttribute::output("To")),
                    )
                    .build()
                    .unwrap(),
            )
            .unwrap();
        Graph::with_registry("clip", Arc::new(registry), Arc::new(RandomIdPolicy))
    }

    fn port(node: &NodeId, field: &str) -> PortRef {
        PortRef::new(node.clone(), field)
    }

    #[test]
    fn test_copy_captures_inner_edges() {
        let mut graph = graph();
        let a = graph.create_node("Link", Rect::default()).unwrap();
        let b = graph.create_node("Link", Rect::default()).unwrap();
        let c = graph.create_node("Link", Rect::default()).unwrap();
        graph.connect(&port(&b, "from"), &port(&a, "to"));
        graph.connect(&port(&c, "from"), &port(&b, "to"));
        graph.add_group(Group::new("pair", 0.0, 0.0).with_nodes([a.clone(), c.clone()]));

        let clip = graph.copy(&[a.clone(), b.clone()]);
        assert_eq!(clip.nodes.len(), 2);
        assert_eq!(clip.edges.len(), 1);
        assert_eq!(clip.groups.len(), 1);
        assert_eq!(clip.groups[0].inner_node_ids, vec![a]);
    }

    #[test]
    fn test_paste_assigns_fresh_ids_and_offsets() {
        let mut graph = graph();
        let a = graph.create_node("Link", Rect::at(5.0, 5.0)).unwrap();
        let b = graph.create_node("Link", Rect::default()).unwrap();
        graph.connect(&port(&b, "from"), &port(&a, "to"));

        let clip = Clipboard::from_json(&graph.copy(&[a.clone(), b.clone()]).to_json().unwrap()).unwrap();
        let remap = graph.paste(&clip).unwrap();

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 2);
        let pasted_a = &remap[&a];
        assert_ne!(pasted_a, &a);
        assert_eq!(graph.node(pasted_a).unwrap().position, Rect::at(25.0, 25.0));
        let targets: Vec<_> = graph.output_nodes_of(pasted_a).into_iter().map(|n| n.id.clone()).collect();
        assert_eq!(targets, vec![remap[&b].clone()]);
    }

    #[test]
    fn test_paste_reattaches_only_multi_edge_ports() {
        let mut graph = graph();
        let src = graph.create_node("Link", Rect::default()).unwrap();
        let multi = graph.create_node("Link", Rect::default()).unwrap();
        let solo = graph.create_node("Link", Rect::default()).unwrap();
        graph.connect(&port(&multi, "from"), &port(&src, "to"));
        graph.connect(&port(&solo, "solo"), &port(&src, "to"));

        let clip = Clipboard {
            nodes: graph.copy(&[src.clone()]).nodes,
            groups: Vec::new(),
            edges: graph.edges().cloned().collect(),
        };
        graph.paste(&clip).unwrap();

        // the multi-edge input gains a second edge, the single one is untouched
        assert_eq!(graph.input_nodes_of(&multi).len(), 2);
        let feeding: Vec<_> = graph.input_nodes_of(&solo).into_iter().map(|n| n.id.clone()).collect();
        assert_eq!(feeding, vec![src]);
    }

    #[test]
    fn test_paste_requires_initialized_graph() {
        let mut graph = Graph::new("bare");
        assert_eq!(graph.paste(&Clipboard::default()), Err(GraphError::NotInitialized));
    }
}
