// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and edges.
//!
//! The graph is the sole owner of its nodes and edges. Nodes and edges are
//! stored in insertion order and indexed by id; port containers are derived
//! and rebuilt by [`Graph::initialize`].

use crate::edge::{Edge, EdgeId, PortRef};
use crate::elements::{Group, PinnedElement, StickyNote};
use crate::events::{ChangeListener, GraphChange, GraphEvents, ListenerId};
use crate::node::{Node, NodeId, NodeIdPolicy, RandomIdPolicy, Rect};
use crate::parameter::{ExposedParameter, ParameterKind};
use crate::port::{FieldRef, NodePort, PortData, PortDirection, ValueTransfer};
use crate::registry::NodeRegistry;
use crate::schema::NodeHooks;
use crate::serialize::keyed_list;
use crate::value::{FieldType, FieldValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by explicit graph lookups and edits
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The graph has no registry yet
    #[error("graph is not initialized")]
    NotInitialized,

    /// No schema is registered for the kind
    #[error("unknown node kind `{0}`")]
    UnknownKind(String),

    /// No node with that id
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// The node has no such field
    #[error("node {node} has no field `{field}`")]
    FieldNotFound {
        /// Node
        node: NodeId,
        /// Field name
        field: String,
    },

    /// The value cannot be stored in the field
    #[error("value does not fit field `{field}` of type {ty} on node {node}")]
    FieldTypeMismatch {
        /// Node
        node: NodeId,
        /// Field name
        field: String,
        /// Declared field type
        ty: FieldType,
    },

    /// An exposed parameter with that name already exists
    #[error("exposed parameter `{0}` already exists")]
    DuplicateParameterName(String),

    /// No exposed parameter with that id or name
    #[error("exposed parameter not found: {0}")]
    ParameterNotFound(String),

    /// The value does not match the parameter's type
    #[error("exposed parameter `{name}` holds {expected:?}, got {found:?}")]
    ParameterTypeMismatch {
        /// Parameter name
        name: String,
        /// Parameter kind
        expected: ParameterKind,
        /// Kind of the rejected value
        found: ParameterKind,
    },

    /// The settings mode does not apply to the parameter's type
    #[error("exposed parameter `{name}` of type {kind:?} does not support that mode")]
    UnsupportedParameterMode {
        /// Parameter name
        name: String,
        /// Parameter kind
        kind: ParameterKind,
    },
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// What [`Graph::initialize`] discarded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitReport {
    /// Nodes whose kind is not registered
    pub dropped_nodes: Vec<NodeId>,
    /// Edges that failed resolution or were invalidated by port synchronization
    pub pruned_edges: Vec<EdgeId>,
}

impl InitReport {
    /// Whether nothing was discarded
    pub fn is_clean(&self) -> bool {
        self.dropped_nodes.is_empty() && self.pruned_edges.is_empty()
    }
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_id_policy() -> Arc<dyn NodeIdPolicy> {
    Arc::new(RandomIdPolicy)
}

/// A node graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    /// Graph name
    pub display_name: String,
    /// View position, carried for the host
    #[serde(default)]
    pub position: [f32; 3],
    /// View scale, carried for the host
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
    #[serde(with = "keyed_list")]
    pub(crate) nodes: IndexMap<NodeId, Node>,
    #[serde(with = "keyed_list")]
    pub(crate) edges: IndexMap<EdgeId, Edge>,
    #[serde(default)]
    pub(crate) groups: Vec<Group>,
    #[serde(default)]
    pub(crate) sticky_notes: Vec<StickyNote>,
    #[serde(default)]
    pub(crate) exposed_parameters: Vec<ExposedParameter>,
    #[serde(default)]
    pub(crate) pinned_elements: Vec<PinnedElement>,
    #[serde(skip)]
    registry: Option<Arc<NodeRegistry>>,
    #[serde(skip, default = "default_id_policy")]
    id_policy: Arc<dyn NodeIdPolicy>,
    #[serde(skip)]
    events: GraphEvents,
    #[serde(skip)]
    initialized: bool,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            position: [0.0; 3],
            scale: default_scale(),
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            groups: Vec::new(),
            sticky_notes: Vec::new(),
            exposed_parameters: Vec::new(),
            pinned_elements: Vec::new(),
            registry: None,
            id_policy: default_id_policy(),
            events: GraphEvents::default(),
            initialized: false,
        }
    }

    /// Create an empty graph and initialize it right away
    pub fn with_registry(
        display_name: impl Into<String>,
        registry: Arc<NodeRegistry>,
        id_policy: Arc<dyn NodeIdPolicy>,
    ) -> Self {
        let mut graph = Self::new(display_name);
        graph.initialize(registry, id_policy);
        graph
    }

    /// Whether [`Self::initialize`] has run
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Registry the graph was initialized with
    pub fn registry(&self) -> Option<&Arc<NodeRegistry>> {
        self.registry.as_ref()
    }

    /// Id allocation policy
    pub fn id_policy(&self) -> &Arc<dyn NodeIdPolicy> {
        &self.id_policy
    }

    /// Register a change listener
    pub fn subscribe(&mut self, listener: ChangeListener) -> ListenerId {
        self.events.subscribe(listener)
    }

    /// Remove a change listener
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Events are only delivered once the graph is initialized
    pub(crate) fn emit(&self, change: GraphChange) {
        if self.initialized {
            self.events.emit(change);
        }
    }

    /// Bind every node to its schema, rebuild ports and indices, and resolve
    /// edges.
    ///
    /// Nodes of unknown kind are dropped and edges whose endpoints do not
    /// resolve are pruned without running any hook. Running it again on an
    /// initialized graph leaves the observable state unchanged.
    pub fn initialize(&mut self, registry: Arc<NodeRegistry>, id_policy: Arc<dyn NodeIdPolicy>) -> InitReport {
        self.registry = Some(registry.clone());
        self.id_policy = id_policy;
        self.initialized = false;
        let mut report = InitReport::default();

        let loaded = std::mem::take(&mut self.nodes);
        let mut unassigned = Vec::new();
        for (_, mut node) in loaded {
            let Some(schema) = registry.get(&node.kind).cloned() else {
                tracing::warn!(node = %node.id, kind = %node.kind, "Dropping node of unknown kind");
                report.dropped_nodes.push(node.id);
                continue;
            };
            node.clear_ports();
            node.bind_schema(schema);
            let position = self.nodes.len();
            let key = if node.id.is_empty() || self.nodes.contains_key(&node.id) {
                node.id = NodeId::default();
                unassigned.push(position);
                NodeId::pending(position)
            } else {
                node.id.clone()
            };
            self.nodes.insert(key, node);
        }
        for index in unassigned {
            self.assign_id_at(index);
        }

        let mut edges = std::mem::take(&mut self.edges);
        for edge in edges.values_mut() {
            edge.normalize();
        }
        self.edges = edges;

        let node_ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        for id in &node_ids {
            self.init_ports(id);
            self.with_hooks(id, |hooks, node| hooks.enable(node));
        }

        let candidates: Vec<Edge> = self.edges.values().cloned().collect();
        let mut linked = Vec::new();
        for edge in candidates {
            if self.link_edge(&edge) {
                linked.push(edge.id);
            } else {
                tracing::warn!(edge = %edge.id, "Pruning edge with unresolved endpoint: {edge}");
                self.edges.shift_remove(&edge.id);
                report.pruned_edges.push(edge.id);
            }
        }

        for id in &node_ids {
            self.update_all_ports(id);
        }
        report
            .pruned_edges
            .extend(linked.into_iter().filter(|id| !self.edges.contains_key(id)));

        self.initialized = true;
        tracing::info!(
            graph = %self.display_name,
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            dropped = report.dropped_nodes.len(),
            pruned = report.pruned_edges.len(),
            "Graph initialized"
        );
        report
    }

    /// Give the node at `index` a fresh id, keeping its position in the list
    fn assign_id_at(&mut self, index: usize) {
        let Some((_, node)) = self.nodes.get_index(index) else {
            return;
        };
        let id = self.id_policy.allocate(self, node);
        let nodes = std::mem::take(&mut self.nodes);
        self.nodes = nodes
            .into_iter()
            .enumerate()
            .map(|(i, (key, mut node))| {
                if i == index {
                    node.id = id.clone();
                    (id.clone(), node)
                } else {
                    (key, node)
                }
            })
            .collect();
    }

    /// Disable every node
    pub fn disable(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        for id in &ids {
            self.with_hooks(id, |hooks, node| hooks.disable(node));
        }
    }

    pub(crate) fn with_hooks(&mut self, id: &NodeId, f: impl FnOnce(&dyn NodeHooks, &mut Node)) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let Some(hooks) = node.schema().and_then(|s| s.hooks()).cloned() else {
            return;
        };
        f(hooks.as_ref(), node);
    }

    // Nodes

    /// Instantiate a node of `kind` and add it
    pub fn create_node(&mut self, kind: &str, position: Rect) -> Result<NodeId> {
        let registry = self.registry.clone().ok_or(GraphError::NotInitialized)?;
        let node = registry
            .create_node(kind, position)
            .ok_or_else(|| GraphError::UnknownKind(kind.to_string()))?;
        self.add_node(node)
    }

    /// Add a node, assigning a fresh id when it has none or its id is taken
    pub fn add_node(&mut self, mut node: Node) -> Result<NodeId> {
        let registry = self.registry.clone().ok_or(GraphError::NotInitialized)?;
        let schema = registry
            .get(&node.kind)
            .cloned()
            .ok_or_else(|| GraphError::UnknownKind(node.kind.clone()))?;

        node.clear_ports();
        node.bind_schema(schema);
        if node.id.is_empty() || self.nodes.contains_key(&node.id) {
            node.id = self.id_policy.allocate(self, &node);
        }
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);

        self.init_ports(&id);
        self.with_hooks(&id, |hooks, node| hooks.enable(node));
        self.update_all_ports(&id);

        tracing::debug!(node = %id, "Node added");
        self.emit(GraphChange::NodeAdded(id.clone()));
        Ok(id)
    }

    /// Remove a node after running its teardown hook.
    ///
    /// Edges referencing the node are left in place; disconnect them first or
    /// use [`Self::remove_node_cascade`]. Leftover edges are pruned on the
    /// next [`Self::initialize`].
    pub fn remove_node(&mut self, id: &NodeId) -> Option<Node> {
        self.with_hooks(id, |hooks, node| hooks.destroy(node));
        let node = self.nodes.shift_remove(id)?;
        tracing::debug!(node = %id, "Node removed");
        self.emit(GraphChange::NodeRemoved(id.clone()));
        Some(node)
    }

    /// Disconnect every edge touching the node, then remove it
    pub fn remove_node_cascade(&mut self, id: &NodeId) -> Option<Node> {
        let touching: Vec<EdgeId> = self.edges_of(id).map(|e| e.id.clone()).collect();
        for edge in &touching {
            self.disconnect(edge);
        }
        self.remove_node(id)
    }

    /// Get a node by ID
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Move a node
    pub fn set_node_position(&mut self, id: &NodeId, position: Rect) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        node.position = position;
        self.notify_node_changed(id);
        Ok(())
    }

    /// Expand or collapse a node
    pub fn set_node_expanded(&mut self, id: &NodeId, expanded: bool) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        node.expanded = expanded;
        self.notify_node_changed(id);
        Ok(())
    }

    /// All nodes, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Report an unspecified change on a node to listeners
    pub fn notify_node_changed(&self, id: &NodeId) {
        self.emit(GraphChange::NodeChanged(id.clone()));
    }

    /// Set a field value, converting it to the declared type when possible
    pub fn set_node_field(&mut self, id: &NodeId, field: &str, value: impl Into<FieldValue>) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        let ty = node
            .schema()
            .and_then(|s| s.field(field))
            .map(|decl| decl.ty.clone())
            .ok_or_else(|| GraphError::FieldNotFound {
                node: id.clone(),
                field: field.to_string(),
            })?;
        let value = ty.normalize(value.into()).ok_or_else(|| GraphError::FieldTypeMismatch {
            node: id.clone(),
            field: field.to_string(),
            ty: ty.clone(),
        })?;
        node.set_field_unchecked(field, value);
        self.emit(GraphChange::FieldChanged {
            node: id.clone(),
            field: field.to_string(),
        });
        Ok(())
    }

    /// Restore a field to its type-appropriate default
    pub fn reset_field(&mut self, id: &NodeId, field: &str) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        if !node.reset_field(field) {
            return Err(GraphError::FieldNotFound {
                node: id.clone(),
                field: field.to_string(),
            });
        }
        self.emit(GraphChange::FieldChanged {
            node: id.clone(),
            field: field.to_string(),
        });
        Ok(())
    }

    /// Nodes feeding into `id`, one entry per edge, in edge order
    pub fn input_nodes_of(&self, id: &NodeId) -> Vec<&Node> {
        self.edges
            .values()
            .filter(|e| e.input_node_id == *id)
            .filter_map(|e| self.nodes.get(&e.output_node_id))
            .collect()
    }

    /// Nodes fed by `id`, one entry per edge, in edge order
    pub fn output_nodes_of(&self, id: &NodeId) -> Vec<&Node> {
        self.edges
            .values()
            .filter(|e| e.output_node_id == *id)
            .filter_map(|e| self.nodes.get(&e.input_node_id))
            .collect()
    }

    // Edges

    /// Get an edge by ID
    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// All edges, in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Get the number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges touching a node
    pub fn edges_of(&self, id: &NodeId) -> impl Iterator<Item = &Edge> {
        let id = id.clone();
        self.edges.values().filter(move |e| e.involves_node(&id))
    }

    fn resolve_port(&self, port: &PortRef, direction: PortDirection) -> Option<&NodePort> {
        self.nodes
            .get(&port.node)?
            .port(direction, &port.field, port.port_id.as_deref())
    }

    /// Whether the two ports exist and their display types are connectable
    pub fn can_connect(&self, input: &PortRef, output: &PortRef) -> bool {
        match (
            self.resolve_port(input, PortDirection::Input),
            self.resolve_port(output, PortDirection::Output),
        ) {
            (Some(i), Some(o)) => self.ports_connectable(i.display_type(), o.display_type()),
            _ => false,
        }
    }

    pub(crate) fn ports_connectable(&self, a: Option<&FieldType>, b: Option<&FieldType>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => match &self.registry {
                Some(registry) => registry.is_connectable(a, b),
                None => a == b,
            },
            _ => true,
        }
    }

    /// Connect an output port to an input port, displacing existing edges on
    /// single-edge ports
    pub fn connect(&mut self, input: &PortRef, output: &PortRef) -> Option<EdgeId> {
        self.connect_with(input, output, true)
    }

    /// Connect an output port to an input port.
    ///
    /// Returns `None` when either port does not resolve. With
    /// `auto_disconnect`, existing edges on a single-edge input port are
    /// disconnected first, and the same is done for the output port.
    pub fn connect_with(&mut self, input: &PortRef, output: &PortRef, auto_disconnect: bool) -> Option<EdgeId> {
        let Some(input_port) = self.resolve_port(input, PortDirection::Input) else {
            tracing::warn!(port = %input, "Cannot connect: input port not found");
            return None;
        };
        let Some(output_port) = self.resolve_port(output, PortDirection::Output) else {
            tracing::warn!(port = %output, "Cannot connect: output port not found");
            return None;
        };
        let displaced_inputs = (auto_disconnect && !input_port.accepts_multiple_edges())
            .then(|| input_port.edges().to_vec())
            .unwrap_or_default();
        let output_single = auto_disconnect && !output_port.accepts_multiple_edges();

        let edge = Edge::between(output, input);
        for id in &displaced_inputs {
            self.disconnect(id);
        }
        if output_single {
            let displaced = self
                .resolve_port(output, PortDirection::Output)
                .map(|p| p.edges().to_vec())
                .unwrap_or_default();
            for id in &displaced {
                self.disconnect(id);
            }
        }

        self.edges.insert(edge.id.clone(), edge.clone());
        if !self.link_edge(&edge) {
            tracing::warn!(edge = %edge, "Port vanished while connecting");
            self.edges.shift_remove(&edge.id);
            return None;
        }
        tracing::debug!(edge = %edge.id, "Connected {edge}");
        self.emit(GraphChange::EdgeAdded(edge.id.clone()));

        self.sync_nodes(&[&edge.input_node_id, &edge.output_node_id]);
        Some(edge.id)
    }

    /// Attach a registered edge to both endpoint ports; false if either
    /// endpoint does not resolve
    pub(crate) fn link_edge(&mut self, edge: &Edge) -> bool {
        let output = edge.endpoint(PortDirection::Output);
        let input = edge.endpoint(PortDirection::Input);
        let (Some(output_port), Some(input_port)) = (
            self.resolve_port(&output, PortDirection::Output),
            self.resolve_port(&input, PortDirection::Input),
        ) else {
            return false;
        };
        let display_ok = self.ports_connectable(input_port.display_type(), output_port.display_type());
        let transfer = if display_ok {
            self.value_transfer(edge)
        } else {
            tracing::error!(
                edge = %edge.id,
                "Incompatible port types {:?} and {:?}; edge kept without value transfer",
                output_port.display_type(),
                input_port.display_type()
            );
            None
        };

        for (direction, port) in [(PortDirection::Output, &output), (PortDirection::Input, &input)] {
            if let Some(port) = self
                .nodes
                .get_mut(&port.node)
                .and_then(|n| n.ports_mut(direction).find_mut(&port.field, port.port_id.as_deref()))
            {
                port.attach(&edge.id, transfer.clone());
            }
        }
        true
    }

    /// Derive the value transfer of an edge from the two field types
    fn value_transfer(&self, edge: &Edge) -> Option<ValueTransfer> {
        let field_type = |direction: PortDirection| {
            self.nodes
                .get(edge.node(direction))
                .and_then(|n| n.schema())
                .and_then(|s| s.field(edge.field(direction)))
                .map(|decl| decl.ty.clone())
        };
        let source_ty = field_type(PortDirection::Output)?;
        let target_ty = field_type(PortDirection::Input)?;
        let coercion = self
            .registry
            .as_ref()
            .and_then(|r| r.coercions().find(&source_ty, &target_ty));
        let Some(coercion) = coercion else {
            tracing::error!(
                edge = %edge.id,
                "No conversion from {source_ty} to {target_ty}; edge kept without value transfer"
            );
            return None;
        };
        Some(ValueTransfer {
            source: FieldRef {
                node: edge.output_node_id.clone(),
                field: edge.output_field_name.clone(),
            },
            target: FieldRef {
                node: edge.input_node_id.clone(),
                field: edge.input_field_name.clone(),
            },
            coercion,
        })
    }

    /// Whether the edge carries a live value transfer
    pub fn has_value_transfer(&self, id: &EdgeId) -> bool {
        let Some(edge) = self.edges.get(id) else {
            return false;
        };
        self.resolve_port(&edge.endpoint(PortDirection::Input), PortDirection::Input)
            .is_some_and(|p| p.has_transfer(id))
    }

    /// Disconnect an edge.
    ///
    /// Detaches it from both endpoints, resetting the input field when its
    /// last edge goes and the node allows it. Unknown ids are a no-op.
    pub fn disconnect(&mut self, id: &EdgeId) -> Option<Edge> {
        let edge = self.remove_edge(id)?;
        self.sync_nodes(&[&edge.input_node_id, &edge.output_node_id]);
        Some(edge)
    }

    /// Remove and detach an edge without synchronizing the endpoint ports
    pub(crate) fn remove_edge(&mut self, id: &EdgeId) -> Option<Edge> {
        let edge = self.edges.shift_remove(id)?;
        self.unlink_edge(&edge);
        tracing::debug!(edge = %edge.id, "Disconnected {edge}");
        self.emit(GraphChange::EdgeRemoved(edge.id.clone()));
        Some(edge)
    }

    fn unlink_edge(&mut self, edge: &Edge) {
        for direction in [PortDirection::Output, PortDirection::Input] {
            let node_id = edge.node(direction).clone();
            let Some(node) = self.nodes.get_mut(&node_id) else {
                tracing::debug!(node = %node_id, edge = %edge.id, "Endpoint node is gone");
                continue;
            };
            if !node.ports_mut(direction).detach_edge(&edge.id) {
                tracing::warn!(node = %node_id, edge = %edge.id, "Edge was not attached to any port");
            }
            if direction == PortDirection::Input {
                let field = &edge.input_field_name;
                let still_connected = node.inputs().for_field(field).any(NodePort::is_connected);
                let can_reset = {
                    let node: &Node = node;
                    node.schema()
                        .and_then(|s| s.hooks())
                        .map_or(true, |hooks| hooks.can_reset_port(node, field))
                };
                if !still_connected && can_reset && node.reset_field(field) {
                    self.emit(GraphChange::FieldChanged {
                        node: node_id.clone(),
                        field: field.clone(),
                    });
                }
            }
        }
    }

    /// Disconnect every edge between two fields; returns how many were removed
    pub fn disconnect_ports(
        &mut self,
        input_node: &NodeId,
        input_field: &str,
        output_node: &NodeId,
        output_field: &str,
    ) -> usize {
        let matching: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| {
                e.input_node_id == *input_node
                    && e.input_field_name == input_field
                    && e.output_node_id == *output_node
                    && e.output_field_name == output_field
            })
            .map(|e| e.id.clone())
            .collect();
        matching.iter().filter(|id| self.disconnect(id).is_some()).count()
    }

    // Value transfer

    /// Run the transfers of every output port of a node, in edge order
    pub fn push_data(&mut self, id: &NodeId) -> usize {
        self.run_port_transfers(id, PortDirection::Output, None)
    }

    /// Run the transfers of every input port of a node, in edge order
    pub fn pull_data(&mut self, id: &NodeId) -> usize {
        self.run_port_transfers(id, PortDirection::Input, None)
    }

    /// Run the transfers of one output port
    pub fn push_port(&mut self, port: &PortRef) -> usize {
        self.run_port_transfers(&port.node, PortDirection::Output, Some(port))
    }

    /// Run the transfers of one input port
    pub fn pull_port(&mut self, port: &PortRef) -> usize {
        self.run_port_transfers(&port.node, PortDirection::Input, Some(port))
    }

    fn run_port_transfers(&mut self, id: &NodeId, direction: PortDirection, only: Option<&PortRef>) -> usize {
        let Some(node) = self.nodes.get(id) else {
            return 0;
        };
        let transfers: Vec<ValueTransfer> = node
            .ports(direction)
            .iter()
            .filter(|p| only.map_or(true, |r| p.field_name == r.field && p.data.matches_id(r.port_id.as_deref())))
            .flat_map(|p| p.transfers().cloned())
            .collect();
        transfers.iter().filter(|t| self.apply_transfer(t)).count()
    }

    fn apply_transfer(&mut self, transfer: &ValueTransfer) -> bool {
        let Some(value) = self
            .nodes
            .get(&transfer.source.node)
            .and_then(|n| n.field(&transfer.source.field))
        else {
            return false;
        };
        let Some(value) = transfer.coercion.apply(value) else {
            tracing::warn!(
                from = %transfer.source.node,
                to = %transfer.target.node,
                field = %transfer.target.field,
                "Value does not fit the destination field"
            );
            return false;
        };
        let Some(target) = self.nodes.get_mut(&transfer.target.node) else {
            return false;
        };
        target.set_field_unchecked(&transfer.target.field, value);
        self.emit(GraphChange::FieldChanged {
            node: transfer.target.node.clone(),
            field: transfer.target.field.clone(),
        });
        true
    }

    // Port construction

    /// Build a node's ports from its schema, before any edge is attached.
    ///
    /// Dynamic fields see the graph edges that reference them, so ports
    /// addressed by stored edges exist when those edges resolve.
    pub(crate) fn init_ports(&mut self, id: &NodeId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let Some(schema) = node.schema().cloned() else {
            return;
        };
        let mut built = Vec::new();
        for field in schema.port_fields() {
            let ports = match &field.behavior {
                Some(behavior) => {
                    let edges: Vec<Edge> = self
                        .edges
                        .values()
                        .filter(|e| {
                            e.node(field.direction) == id && e.field(field.direction) == field.field_name
                        })
                        .cloned()
                        .collect();
                    behavior.ports_for(&edges)
                }
                None => vec![field.static_port()],
            };
            for data in resolve_descriptors(ports, &field.ty) {
                built.push(NodePort::new(field.field_name.clone(), field.direction, data));
            }
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.clear_ports();
            for port in built {
                let direction = port.direction;
                node.ports_mut(direction).push(port);
            }
        }
    }

    // Groups, sticky notes and pinned elements

    /// Add a group
    pub fn add_group(&mut self, group: Group) {
        let title = group.title.clone();
        self.groups.push(group);
        self.emit(GraphChange::GroupAdded(title));
    }

    /// Remove a group by index
    pub fn remove_group(&mut self, index: usize) -> Option<Group> {
        if index >= self.groups.len() {
            return None;
        }
        let group = self.groups.remove(index);
        self.emit(GraphChange::GroupRemoved(group.title.clone()));
        Some(group)
    }

    /// Groups
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Add a sticky note
    pub fn add_sticky_note(&mut self, note: StickyNote) {
        let title = note.title.clone();
        self.sticky_notes.push(note);
        self.emit(GraphChange::StickyNoteAdded(title));
    }

    /// Remove a sticky note by index
    pub fn remove_sticky_note(&mut self, index: usize) -> Option<StickyNote> {
        if index >= self.sticky_notes.len() {
            return None;
        }
        let note = self.sticky_notes.remove(index);
        self.emit(GraphChange::StickyNoteRemoved(note.title.clone()));
        Some(note)
    }

    /// Sticky notes
    pub fn sticky_notes(&self) -> &[StickyNote] {
        &self.sticky_notes
    }

    /// Open the pinned element of an editor type, creating it if needed
    pub fn open_pinned(&mut self, editor_type: &str) -> &PinnedElement {
        let index = match self.pinned_elements.iter().position(|p| p.editor_type == editor_type) {
            Some(index) => index,
            None => {
                self.pinned_elements.push(PinnedElement::new(editor_type));
                self.pinned_elements.len() - 1
            }
        };
        self.pinned_elements[index].opened = true;
        self.emit(GraphChange::PinnedOpened(editor_type.to_string()));
        &self.pinned_elements[index]
    }

    /// Close the pinned element of an editor type
    pub fn close_pinned(&mut self, editor_type: &str) -> bool {
        let Some(pinned) = self.pinned_elements.iter_mut().find(|p| p.editor_type == editor_type) else {
            return false;
        };
        pinned.opened = false;
        self.emit(GraphChange::PinnedClosed(editor_type.to_string()));
        true
    }

    /// Pinned elements
    pub fn pinned_elements(&self) -> &[PinnedElement] {
        &self.pinned_elements
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Fill in display types and normalize ids of a desired port list, keeping
/// the first descriptor of each id
pub(crate) fn resolve_descriptors(ports: Vec<PortData>, field_type: &FieldType) -> Vec<PortData> {
    let mut resolved: Vec<PortData> = Vec::with_capacity(ports.len());
    for mut data in ports {
        data.id = crate::edge::normalize_port_id(data.id.take());
        if data.display_type.is_none() {
            data.display_type = Some(field_type.clone());
        }
        if resolved.iter().any(|d| d.id == data.id) {
            tracing::warn!(port = ?data.id, "Duplicate port id in dynamic port list, ignoring");
            continue;
        }
        resolved.push(data);
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldAttribute, FieldDecl, NodeCategory, NodeSchema};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct KeepValues;

    impl NodeHooks for KeepValues {
        fn can_reset_port(&self, _node: &Node, _field: &str) -> bool {
            false
        }
    }

    fn registry() -> Arc<NodeRegistry> {
        let mut registry = NodeRegistry::new();
        registry
            .register(
                NodeSchema::builder("Number", NodeCategory::Custom)
                    .field(
                        FieldDecl::new("value", FieldType::Int)
                            .with_default(5i64)
                            .with(FieldAttribute::output("Value")),
                    )
                    .field(FieldDecl::new("text", FieldType::String).with(FieldAttribute::output("Text")))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                NodeSchema::builder("Sink", NodeCategory::Custom)
                    .field(FieldDecl::new("single", FieldType::Float).with(FieldAttribute::input("Single")))
                    .field(FieldDecl::new("many", FieldType::Int).with(FieldAttribute::input_multiple("Many")))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                NodeSchema::builder("Sticky", NodeCategory::Custom)
                    .hooks(Arc::new(KeepValues))
                    .field(
                        FieldDecl::new("single", FieldType::Int)
                            .with_default(9i64)
                            .with(FieldAttribute::input("Single")),
                    )
                    .build()
                    .unwrap(),
            )
            .unwrap();
        Arc::new(registry)
    }

    fn graph() -> Graph {
        Graph::with_registry("test", registry(), Arc::new(RandomIdPolicy))
    }

    fn input(node: &NodeId, field: &str) -> PortRef {
        PortRef::new(node.clone(), field)
    }

    #[test]
    fn test_single_input_displaces_previous_edge() {
        let mut graph = graph();
        let a = graph.create_node("Number", Rect::default()).unwrap();
        let b = graph.create_node("Number", Rect::default()).unwrap();
        let sink = graph.create_node("Sink", Rect::default()).unwrap();

        let first = graph.connect(&input(&sink, "single"), &input(&a, "value")).unwrap();
        let second = graph.connect(&input(&sink, "single"), &input(&b, "value")).unwrap();

        assert!(graph.edge(&first).is_none());
        assert!(graph.edge(&second).is_some());
        let port = graph.node(&sink).unwrap().port(PortDirection::Input, "single", None).unwrap();
        assert_eq!(port.edges(), &[second]);
        assert!(graph.node(&a).unwrap().outputs().iter().all(|p| !p.is_connected()));
    }

    #[test]
    fn test_multi_input_keeps_edges() {
        let mut graph = graph();
        let a = graph.create_node("Number", Rect::default()).unwrap();
        let sink = graph.create_node("Sink", Rect::default()).unwrap();
        graph.connect(&input(&sink, "many"), &input(&a, "value"));
        graph.connect(&input(&sink, "many"), &input(&a, "value"));
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_connect_missing_port_is_refused() {
        let mut graph = graph();
        let a = graph.create_node("Number", Rect::default()).unwrap();
        let sink = graph.create_node("Sink", Rect::default()).unwrap();
        assert!(graph.connect(&input(&sink, "nope"), &input(&a, "value")).is_none());
        assert!(graph.connect(&input(&sink, "single"), &input(&NodeId::from("ghost"), "value")).is_none());
        // an output field used as input does not resolve
        assert!(graph.connect(&input(&a, "value"), &input(&sink, "single")).is_none());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_push_data_converts_value() {
        let mut graph = graph();
        let a = graph.create_node("Number", Rect::default()).unwrap();
        let sink = graph.create_node("Sink", Rect::default()).unwrap();
        let edge = graph.connect(&input(&sink, "single"), &input(&a, "value")).unwrap();
        assert!(graph.has_value_transfer(&edge));

        assert_eq!(graph.push_data(&a), 1);
        assert_eq!(graph.node(&sink).unwrap().field("single"), Some(&FieldValue::Float(5.0)));
    }

    #[test]
    fn test_incompatible_edge_has_no_transfer() {
        let mut graph = graph();
        let a = graph.create_node("Number", Rect::default()).unwrap();
        let sink = graph.create_node("Sink", Rect::default()).unwrap();
        let edge = graph.connect(&input(&sink, "single"), &input(&a, "text")).unwrap();
        assert!(graph.edge(&edge).is_some());
        assert!(!graph.has_value_transfer(&edge));
        assert_eq!(graph.push_data(&a), 0);
    }

    #[test]
    fn test_disconnect_resets_input_field() {
        let mut graph = graph();
        let a = graph.create_node("Number", Rect::default()).unwrap();
        let sink = graph.create_node("Sink", Rect::default()).unwrap();
        let edge = graph.connect(&input(&sink, "single"), &input(&a, "value")).unwrap();
        graph.push_data(&a);

        let removed = graph.disconnect(&edge).unwrap();
        assert_eq!(removed.id, edge);
        assert_eq!(graph.node(&sink).unwrap().field("single"), Some(&FieldValue::Float(0.0)));
        assert!(graph.disconnect(&edge).is_none());
    }

    #[test]
    fn test_reset_veto() {
        let mut graph = graph();
        let a = graph.create_node("Number", Rect::default()).unwrap();
        let sticky = graph.create_node("Sticky", Rect::default()).unwrap();
        let edge = graph.connect(&input(&sticky, "single"), &input(&a, "value")).unwrap();
        graph.push_data(&a);
        graph.disconnect(&edge);
        assert_eq!(graph.node(&sticky).unwrap().field("single"), Some(&FieldValue::Int(5)));
    }

    #[test]
    fn test_remove_node_does_not_cascade() {
        let mut graph = graph();
        let a = graph.create_node("Number", Rect::default()).unwrap();
        let sink = graph.create_node("Sink", Rect::default()).unwrap();
        let edge = graph.connect(&input(&sink, "single"), &input(&a, "value")).unwrap();

        graph.remove_node(&a).unwrap();
        assert!(graph.edge(&edge).is_some());
        // dangling edge is a safe disconnect
        assert!(graph.disconnect(&edge).is_some());

        let b = graph.create_node("Number", Rect::default()).unwrap();
        let edge = graph.connect(&input(&sink, "single"), &input(&b, "value")).unwrap();
        assert_eq!(graph.edges_of(&b).count(), 1);
        graph.remove_node_cascade(&b).unwrap();
        assert!(graph.edge(&edge).is_none());
        assert!(!graph.node(&sink).unwrap().inputs().iter().any(NodePort::is_connected));
    }

    #[test]
    fn test_disconnect_ports() {
        let mut graph = graph();
        let a = graph.create_node("Number", Rect::default()).unwrap();
        let sink = graph.create_node("Sink", Rect::default()).unwrap();
        graph.connect(&input(&sink, "many"), &input(&a, "value"));
        graph.connect(&input(&sink, "many"), &input(&a, "value"));
        assert_eq!(graph.disconnect_ports(&sink, "many", &a, "value"), 2);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_set_node_field_is_type_checked() {
        let mut graph = graph();
        let a = graph.create_node("Number", Rect::default()).unwrap();
        graph.set_node_field(&a, "value", 7i64).unwrap();
        assert_eq!(graph.node(&a).unwrap().field("value"), Some(&FieldValue::Int(7)));
        assert!(matches!(
            graph.set_node_field(&a, "value", "seven"),
            Err(GraphError::FieldTypeMismatch { .. })
        ));
        assert!(matches!(
            graph.set_node_field(&a, "missing", 1i64),
            Err(GraphError::FieldNotFound { .. })
        ));
    }

    #[test]
    fn test_port_transfers_run_per_port() {
        let mut graph = graph();
        let a = graph.create_node("Number", Rect::default()).unwrap();
        let sink = graph.create_node("Sink", Rect::default()).unwrap();
        graph.connect(&input(&sink, "single"), &input(&a, "value")).unwrap();
        graph.connect(&input(&sink, "many"), &input(&a, "value")).unwrap();

        assert_eq!(graph.push_port(&input(&a, "text")), 0);
        assert_eq!(graph.pull_port(&input(&sink, "many")), 1);
        assert_eq!(graph.node(&sink).unwrap().field("many"), Some(&FieldValue::Int(5)));
        assert_eq!(graph.node(&sink).unwrap().field("single"), Some(&FieldValue::Float(0.0)));

        assert_eq!(graph.push_port(&input(&a, "value")), 2);
        assert_eq!(graph.node(&sink).unwrap().field("single"), Some(&FieldValue::Float(5.0)));
    }

    #[test]
    fn test_node_edits_notify_listeners() {
        let mut graph = graph();
        let a = graph.create_node("Number", Rect::default()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_events = seen.clone();
        graph.subscribe(Box::new(move |c| sink_events.lock().unwrap().push(c.clone())));

        graph.set_node_position(&a, Rect::at(40.0, 80.0)).unwrap();
        graph.set_node_expanded(&a, false).unwrap();
        graph.notify_node_changed(&a);
        assert!(matches!(
            graph.set_node_position(&NodeId::from("missing"), Rect::default()),
            Err(GraphError::NodeNotFound(_))
        ));

        let node = graph.node(&a).unwrap();
        assert_eq!(node.position, Rect::at(40.0, 80.0));
        assert!(!node.expanded);
        assert_eq!(*seen.lock().unwrap(), vec![GraphChange::NodeChanged(a.clone()); 3]);
    }

    #[test]
    fn test_events_are_emitted() {
        let mut graph = graph();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_events = seen.clone();
        graph.subscribe(Box::new(move |c| sink_events.lock().unwrap().push(c.clone())));

        let a = graph.create_node("Number", Rect::default()).unwrap();
        let sink = graph.create_node("Sink", Rect::default()).unwrap();
        let edge = graph.connect(&input(&sink, "single"), &input(&a, "value")).unwrap();
        graph.disconnect(&edge);

        let seen = seen.lock().unwrap();
        assert!(seen.contains(&GraphChange::NodeAdded(a.clone())));
        assert!(seen.contains(&GraphChange::EdgeAdded(edge.clone())));
        assert!(seen.contains(&GraphChange::EdgeRemoved(edge.clone())));
        assert!(seen.contains(&GraphChange::FieldChanged {
            node: sink.clone(),
            field: "single".into()
        }));
    }

    #[test]
    fn test_unknown_kind() {
        let mut graph = graph();
        assert_eq!(
            graph.create_node("Missing", Rect::default()),
            Err(GraphError::UnknownKind("Missing".into()))
        );
        let mut bare = Graph::new("bare");
        assert_eq!(bare.create_node("Number", Rect::default()), Err(GraphError::NotInitialized));
    }

    #[test]
    fn test_traversal_in_edge_order() {
        let mut graph = graph();
        let a = graph.create_node("Number", Rect::default()).unwrap();
        let b = graph.create_node("Number", Rect::default()).unwrap();
        let sink = graph.create_node("Sink", Rect::default()).unwrap();
        graph.connect(&input(&sink, "many"), &input(&b, "value"));
        graph.connect(&input(&sink, "many"), &input(&a, "value"));

        let ids: Vec<_> = graph.input_nodes_of(&sink).into_iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids, vec![b.clone(), a.clone()]);
        assert_eq!(graph.output_nodes_of(&a).len(), 1);
    }

    #[test]
    fn test_pinned_elements() {
        let mut graph = graph();
        assert!(graph.open_pinned("ExposedParameterView").opened);
        assert!(graph.close_pinned("ExposedParameterView"));
        assert!(!graph.pinned_elements()[0].opened);
        graph.open_pinned("ExposedParameterView");
        assert_eq!(graph.pinned_elements().len(), 1);
        assert!(!graph.close_pinned("Other"));
    }
}
