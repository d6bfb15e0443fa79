// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.
//!
//! Ports are never serialized: a node's port containers are rebuilt from its
//! field schema and the edges attached to it.

use crate::edge::EdgeId;
use crate::node::NodeId;
use crate::value::{Coercion, FieldType};
use indexmap::IndexMap;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

impl PortDirection {
    /// The other side of an edge
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

/// Descriptor of one port: what a field wants its port(s) to look like
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PortData {
    /// Port id within its field; `None` when the field has a single port
    pub id: Option<String>,
    /// Display name
    pub display_name: String,
    /// Type used for connectivity checks; `None` means the field type
    pub display_type: Option<FieldType>,
    /// Whether more than one edge may attach
    pub accept_multiple_edges: bool,
    /// Tooltip
    pub tooltip: Option<String>,
    /// Drawn vertically by the host
    pub vertical: bool,
    /// Size hint for the host
    pub size_in_pixel: u32,
    /// Host draws the field's value next to the port
    pub show_input_drawer: bool,
}

impl PortData {
    /// Create a descriptor with the given id and display name
    pub fn new(id: Option<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: crate::edge::normalize_port_id(id),
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    /// Set the display type
    pub fn with_type(mut self, display_type: FieldType) -> Self {
        self.display_type = Some(display_type);
        self
    }

    /// Set the edge cardinality
    pub fn multiple(mut self, accept_multiple_edges: bool) -> Self {
        self.accept_multiple_edges = accept_multiple_edges;
        self
    }

    /// Whether this descriptor addresses the port `id`
    pub fn matches_id(&self, id: Option<&str>) -> bool {
        self.id.as_deref() == id
    }
}

/// A node field reference used by value transfers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Node owning the field
    pub node: NodeId,
    /// Field name
    pub field: String,
}

/// Copies the source field's value into the destination field of an edge
#[derive(Debug, Clone)]
pub struct ValueTransfer {
    /// Output side field
    pub source: FieldRef,
    /// Input side field
    pub target: FieldRef,
    /// Conversion between the two field types
    pub coercion: Coercion,
}

/// A port on a node
#[derive(Debug, Clone)]
pub struct NodePort {
    /// Field this port belongs to
    pub field_name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Current descriptor
    pub data: PortData,
    edges: Vec<EdgeId>,
    transfers: IndexMap<EdgeId, ValueTransfer>,
}

impl NodePort {
    /// Create a port with no edges
    pub fn new(field_name: impl Into<String>, direction: PortDirection, data: PortData) -> Self {
        Self {
            field_name: field_name.into(),
            direction,
            data,
            edges: Vec::new(),
            transfers: IndexMap::new(),
        }
    }

    /// Port id within its field
    pub fn id(&self) -> Option<&str> {
        self.data.id.as_deref()
    }

    /// Resolved display type
    pub fn display_type(&self) -> Option<&FieldType> {
        self.data.display_type.as_ref()
    }

    /// Whether the port accepts more than one edge
    pub fn accepts_multiple_edges(&self) -> bool {
        self.data.accept_multiple_edges
    }

    /// Attach an edge, registering its value transfer when one exists
    pub fn attach(&mut self, edge: &EdgeId, transfer: Option<ValueTransfer>) {
        if !self.edges.contains(edge) {
            self.edges.push(edge.clone());
        }
        if let Some(transfer) = transfer {
            self.transfers.insert(edge.clone(), transfer);
        }
    }

    /// Detach an edge; returns false if it was not attached
    pub fn detach(&mut self, edge: &EdgeId) -> bool {
        let Some(index) = self.edges.iter().position(|e| e == edge) else {
            return false;
        };
        self.transfers.shift_remove(edge);
        self.edges.remove(index);
        true
    }

    /// Edges attached to this port, in registration order
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    /// Whether any edge is attached
    pub fn is_connected(&self) -> bool {
        !self.edges.is_empty()
    }

    /// Whether the edge has a live value transfer
    pub fn has_transfer(&self, edge: &EdgeId) -> bool {
        self.transfers.contains_key(edge)
    }

    /// Registered value transfers, in edge registration order
    pub fn transfers(&self) -> impl Iterator<Item = &ValueTransfer> {
        self.edges.iter().filter_map(|edge| self.transfers.get(edge))
    }
}

/// Ordered ports of one direction on a node
#[derive(Debug, Clone, Default)]
pub struct PortContainer {
    ports: Vec<NodePort>,
}

impl PortContainer {
    /// Number of ports
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Whether there are no ports
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// All ports in display order
    pub fn iter(&self) -> impl Iterator<Item = &NodePort> {
        self.ports.iter()
    }

    /// Ports belonging to one field, in display order
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a NodePort> + 'a {
        self.ports.iter().filter(move |p| p.field_name == field)
    }

    /// Find a port by field and id.
    ///
    /// A `None` id matches the field's default (id-less) port.
    pub fn find(&self, field: &str, id: Option<&str>) -> Option<&NodePort> {
        self.ports
            .iter()
            .find(|p| p.field_name == field && p.data.matches_id(id))
    }

    /// Mutable variant of [`Self::find`]
    pub fn find_mut(&mut self, field: &str, id: Option<&str>) -> Option<&mut NodePort> {
        self.ports
            .iter_mut()
            .find(|p| p.field_name == field && p.data.matches_id(id))
    }

    pub(crate) fn push(&mut self, port: NodePort) {
        self.ports.push(port);
    }

    pub(crate) fn clear(&mut self) {
        self.ports.clear();
    }

    /// Remove the ports of `field` whose ids are not in `keep`; returns how many were removed
    pub(crate) fn retain_field(&mut self, field: &str, keep: &[Option<String>]) -> usize {
        let before = self.ports.len();
        self.ports
            .retain(|p| p.field_name != field || keep.iter().any(|id| p.data.matches_id(id.as_deref())));
        before - self.ports.len()
    }

    /// Detach an edge from whichever port holds it
    pub(crate) fn detach_edge(&mut self, edge: &EdgeId) -> bool {
        self.ports.iter_mut().fold(false, |found, p| p.detach(edge) || found)
    }

    /// Reorder the ports of `field` to follow `order`, leaving the slots
    /// occupied by other fields untouched. Returns true if anything moved.
    pub(crate) fn reorder_field(&mut self, field: &str, order: &[Option<String>]) -> bool {
        let slots: Vec<usize> = self
            .ports
            .iter()
            .enumerate()
            .filter(|(_, p)| p.field_name == field)
            .map(|(i, _)| i)
            .collect();
        let rank = |p: &NodePort| {
            order
                .iter()
                .position(|id| p.data.matches_id(id.as_deref()))
                .unwrap_or(usize::MAX)
        };
        let mut field_ports: Vec<NodePort> = slots.iter().map(|&i| self.ports[i].clone()).collect();
        let before: Vec<usize> = field_ports.iter().map(rank).collect();
        field_ports.sort_by_key(rank);
        let moved = field_ports.iter().map(rank).ne(before.into_iter());
        for (slot, port) in slots.into_iter().zip(field_ports) {
            self.ports[slot] = port;
        }
        moved
    }
}
