// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge definitions for the graph.
//!
//! An edge stores its endpoints by identifier (node id, field name, port id)
//! rather than by reference, so it can be resolved again against a graph
//! after deserialization.

use crate::node::NodeId;
use crate::port::PortDirection;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    /// Create a new random edge ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for EdgeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of one port: owning node, field, and port id within the field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortRef {
    /// Owning node
    pub node: NodeId,
    /// Field the port belongs to
    pub field: String,
    /// Port id within the field; `None` for the single default port
    pub port_id: Option<String>,
}

impl PortRef {
    /// Reference the default port of a field
    pub fn new(node: NodeId, field: impl Into<String>) -> Self {
        Self {
            node,
            field: field.into(),
            port_id: None,
        }
    }

    /// Reference a specific port of a field
    pub fn with_id(mut self, port_id: impl Into<String>) -> Self {
        self.port_id = normalize_port_id(Some(port_id.into()));
        self
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.port_id {
            Some(id) => write!(f, "{}:{}[{}]", self.node, self.field, id),
            None => write!(f, "{}:{}", self.node, self.field),
        }
    }
}

/// Empty port ids are stored as `None`
pub(crate) fn normalize_port_id(id: Option<String>) -> Option<String> {
    id.filter(|id| !id.is_empty())
}

/// A directed connection from an output port to an input port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique edge ID
    pub id: EdgeId,
    /// Source node ID
    pub output_node_id: NodeId,
    /// Source field name
    pub output_field_name: String,
    /// Source port id
    #[serde(default)]
    pub output_port_id: Option<String>,
    /// Destination node ID
    pub input_node_id: NodeId,
    /// Destination field name
    pub input_field_name: String,
    /// Destination port id
    #[serde(default)]
    pub input_port_id: Option<String>,
}

impl Edge {
    /// Create a new edge with a fresh id, capturing both endpoints by value
    pub(crate) fn between(output: &PortRef, input: &PortRef) -> Self {
        Self {
            id: EdgeId::new(),
            output_node_id: output.node.clone(),
            output_field_name: output.field.clone(),
            output_port_id: normalize_port_id(output.port_id.clone()),
            input_node_id: input.node.clone(),
            input_field_name: input.field.clone(),
            input_port_id: normalize_port_id(input.port_id.clone()),
        }
    }

    /// Endpoint on the given side of the edge
    pub fn endpoint(&self, direction: PortDirection) -> PortRef {
        match direction {
            PortDirection::Input => PortRef {
                node: self.input_node_id.clone(),
                field: self.input_field_name.clone(),
                port_id: self.input_port_id.clone(),
            },
            PortDirection::Output => PortRef {
                node: self.output_node_id.clone(),
                field: self.output_field_name.clone(),
                port_id: self.output_port_id.clone(),
            },
        }
    }

    /// Node on the given side of the edge
    pub fn node(&self, direction: PortDirection) -> &NodeId {
        match direction {
            PortDirection::Input => &self.input_node_id,
            PortDirection::Output => &self.output_node_id,
        }
    }

    /// Field on the given side of the edge
    pub fn field(&self, direction: PortDirection) -> &str {
        match direction {
            PortDirection::Input => &self.input_field_name,
            PortDirection::Output => &self.output_field_name,
        }
    }

    /// Check if this edge involves a specific node
    pub fn involves_node(&self, node_id: &NodeId) -> bool {
        self.output_node_id == *node_id || self.input_node_id == *node_id
    }

    /// Serialized port ids may come back as empty strings
    pub(crate) fn normalize(&mut self) {
        self.output_port_id = normalize_port_id(self.output_port_id.take());
        self.input_port_id = normalize_port_id(self.input_port_id.take());
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.endpoint(PortDirection::Output),
            self.endpoint(PortDirection::Input)
        )
    }
}
