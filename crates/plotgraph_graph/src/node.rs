// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.
//!
//! A node is stored as its kind plus field values. Its port containers are
//! derived state: they are rebuilt from the kind's schema and the attached
//! edges whenever the owning graph initializes.

use crate::graph::Graph;
use crate::port::{NodePort, PortContainer, PortDirection};
use crate::schema::{NodeCategory, NodeSchema};
use crate::value::FieldValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a new random node ID
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether no id has been assigned yet
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Storage key for the id-less node at `position` while it waits for an
    /// id; never a valid serialized id
    pub(crate) fn pending(position: usize) -> Self {
        Self(format!("\0pending-{position}"))
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Placement rectangle, carried for the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left
    pub x: f32,
    /// Top
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl Rect {
    /// Rectangle at the given position with the default size
    pub fn at(x: f32, y: f32) -> Self {
        Self { x, y, ..Self::default() }
    }

    /// The same rectangle moved by `(dx, dy)`
    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        }
    }
}

/// A node instance in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique instance ID; empty until the graph assigns one
    #[serde(default)]
    pub id: NodeId,
    /// Registered kind
    pub kind: String,
    /// Position in the graph view
    pub position: Rect,
    /// Whether the node is expanded in the view
    #[serde(default = "default_expanded")]
    pub expanded: bool,
    /// Field values, in declaration order once bound
    #[serde(default)]
    fields: IndexMap<String, FieldValue>,
    #[serde(skip)]
    schema: Option<Arc<NodeSchema>>,
    #[serde(skip)]
    inputs: PortContainer,
    #[serde(skip)]
    outputs: PortContainer,
}

fn default_expanded() -> bool {
    true
}

impl Node {
    /// Create an unbound node; values not set explicitly take their declared
    /// defaults when the node is bound to its schema
    pub fn new(id: NodeId, kind: impl Into<String>, position: Rect) -> Self {
        Self {
            id,
            kind: kind.into(),
            position,
            expanded: true,
            fields: IndexMap::new(),
            schema: None,
            inputs: PortContainer::default(),
            outputs: PortContainer::default(),
        }
    }

    /// Set a field value before the node is added to a graph
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Bound schema, once the node belongs to an initialized graph
    pub fn schema(&self) -> Option<&Arc<NodeSchema>> {
        self.schema.as_ref()
    }

    /// Category of the bound schema
    pub fn category(&self) -> Option<NodeCategory> {
        self.schema.as_ref().map(|s| s.category)
    }

    /// Whether the node belongs to `category`
    pub fn is(&self, category: NodeCategory) -> bool {
        self.category() == Some(category)
    }

    /// Current value of a field
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// All field values, in declaration order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Values of the input-tagged fields, in declaration order
    pub fn input_values(&self) -> Vec<(&str, &FieldValue)> {
        let Some(schema) = &self.schema else {
            return Vec::new();
        };
        schema
            .input_fields()
            .filter_map(|f| {
                self.fields
                    .get_key_value(&f.field_name)
                    .map(|(k, v)| (k.as_str(), v))
            })
            .collect()
    }

    /// Input ports
    pub fn inputs(&self) -> &PortContainer {
        &self.inputs
    }

    /// Output ports
    pub fn outputs(&self) -> &PortContainer {
        &self.outputs
    }

    /// Ports of one direction
    pub fn ports(&self, direction: PortDirection) -> &PortContainer {
        match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        }
    }

    pub(crate) fn ports_mut(&mut self, direction: PortDirection) -> &mut PortContainer {
        match direction {
            PortDirection::Input => &mut self.inputs,
            PortDirection::Output => &mut self.outputs,
        }
    }

    /// Find a port by direction, field and port id
    pub fn port(&self, direction: PortDirection, field: &str, id: Option<&str>) -> Option<&NodePort> {
        self.ports(direction).find(field, id)
    }

    /// All ports, inputs first
    pub fn all_ports(&self) -> impl Iterator<Item = &NodePort> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Bind the node to its schema, normalizing the stored values.
    ///
    /// Loaded values are brought to their declared types, missing fields take
    /// the declared default and unknown fields are dropped.
    pub(crate) fn bind_schema(&mut self, schema: Arc<NodeSchema>) {
        let mut loaded = std::mem::take(&mut self.fields);
        for decl in schema.fields() {
            let value = match loaded.shift_remove(&decl.name) {
                Some(value) => decl.ty.normalize(value.clone()).unwrap_or_else(|| {
                    tracing::warn!(
                        node = %self.id,
                        field = %decl.name,
                        ?value,
                        "Stored value does not fit {}, using default", decl.ty
                    );
                    decl.default.clone()
                }),
                None => decl.default.clone(),
            };
            self.fields.insert(decl.name.clone(), value);
        }
        for name in loaded.keys() {
            tracing::debug!(node = %self.id, field = %name, "Dropping undeclared field");
        }
        self.schema = Some(schema);
    }

    pub(crate) fn set_field_unchecked(&mut self, name: &str, value: FieldValue) {
        if let Some(slot) = self.fields.get_mut(name) {
            *slot = value;
        }
    }

    /// Restore a field to the type-appropriate default: empty collection,
    /// null for references, a fresh value otherwise
    pub(crate) fn reset_field(&mut self, name: &str) -> bool {
        let Some(ty) = self
            .schema
            .as_ref()
            .and_then(|s| s.field(name))
            .map(|decl| decl.ty.clone())
        else {
            return false;
        };
        self.set_field_unchecked(name, ty.default_value());
        true
    }

    pub(crate) fn clear_ports(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
    }

    /// Copy of the serialized state only: no schema binding, no ports
    pub(crate) fn detached_copy(&self) -> Self {
        let mut copy = Self::new(self.id.clone(), self.kind.clone(), self.position);
        copy.expanded = self.expanded;
        copy.fields = self.fields.clone();
        copy
    }
}

/// Assigns identifiers to nodes joining a graph
pub trait NodeIdPolicy: fmt::Debug + Send + Sync {
    /// Pick an id for `node`, unique within `graph`
    fn allocate(&self, graph: &Graph, node: &Node) -> NodeId;
}

/// Random unique token for every node
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdPolicy;

impl NodeIdPolicy for RandomIdPolicy {
    fn allocate(&self, _graph: &Graph, _node: &Node) -> NodeId {
        NodeId::random()
    }
}
