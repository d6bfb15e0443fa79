// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port synchronization.
//!
//! Reconciles the ports of a field with the descriptors its schema asks for:
//! one static descriptor, or whatever a dynamic behavior returns for the
//! edges currently attached. Ports whose type changes incompatibly, or that
//! disappear, lose their edges; the far endpoints go back on the same work
//! queue.

use crate::edge::{Edge, EdgeId};
use crate::events::GraphChange;
use crate::graph::{resolve_descriptors, Graph};
use crate::node::NodeId;
use crate::port::{NodePort, PortData, PortDirection};
use std::collections::{HashSet, VecDeque};

/// Work item: a node and the fields to synchronize on it
type PortUpdate = (NodeId, Vec<String>);

impl Graph {
    /// Synchronize every port field of a node, following dynamic dependents
    /// across the graph. Returns true if any port changed.
    pub fn update_all_ports(&mut self, node: &NodeId) -> bool {
        self.sync_nodes(&[node])
    }

    /// Synchronize one field of a node, then every dynamic field on the other
    /// side of its edges whose ports may depend on it.
    pub fn update_ports_for_field(&mut self, node: &NodeId, field: &str) -> bool {
        self.drain_port_updates(vec![(node.clone(), vec![field.to_string()])])
    }

    /// Synchronize every port field of each node in one pass
    pub(crate) fn sync_nodes(&mut self, nodes: &[&NodeId]) -> bool {
        let seeds = nodes
            .iter()
            .filter_map(|id| self.port_fields_of(id).map(|fields| ((*id).clone(), fields)))
            .collect();
        self.drain_port_updates(seeds)
    }

    fn port_fields_of(&self, node: &NodeId) -> Option<Vec<String>> {
        let schema = self.nodes.get(node)?.schema()?;
        Some(schema.port_fields().map(|f| f.field_name.clone()).collect())
    }

    /// Run the work queue until it is empty.
    ///
    /// The visited set is keyed by (node, fields), so feedback cycles between
    /// dynamic fields terminate. Nodes that lose an edge while a port is
    /// rebuilt are queued again in full; each requeue follows an edge removal,
    /// which bounds the pass.
    fn drain_port_updates(&mut self, seeds: Vec<PortUpdate>) -> bool {
        let mut queue: VecDeque<PortUpdate> = seeds.into();
        let mut visited: HashSet<PortUpdate> = HashSet::new();

        let mut changed = false;
        while let Some(update) = queue.pop_front() {
            if !visited.insert(update.clone()) {
                continue;
            }
            let (node, fields) = update;
            for field in &fields {
                let mut touched = Vec::new();
                if self.sync_field(&node, field, &mut touched) {
                    changed = true;
                    queue.extend(self.dynamic_dependents(&node, field));
                }
                for id in touched {
                    if let Some(fields) = self.port_fields_of(&id) {
                        let requeued = (id, fields);
                        visited.remove(&requeued);
                        queue.push_back(requeued);
                    }
                }
            }
        }
        changed
    }

    /// Synchronize the ports of one field of one node. Endpoint nodes of
    /// edges removed along the way are pushed to `touched`.
    fn sync_field(&mut self, node_id: &NodeId, field: &str, touched: &mut Vec<NodeId>) -> bool {
        let mut changed = false;
        loop {
            let Some(node) = self.nodes.get(node_id) else {
                return changed;
            };
            let Some(schema) = node.schema().cloned() else {
                return changed;
            };
            let Some(port_field) = schema.port_field(field) else {
                return changed;
            };
            let direction = port_field.direction;
            let container = node.ports(direction);

            let desired = match &port_field.behavior {
                Some(behavior) => {
                    let edges: Vec<Edge> = container
                        .for_field(field)
                        .flat_map(NodePort::edges)
                        .filter_map(|id| self.edges.get(id).cloned())
                        .collect();
                    behavior.ports_for(&edges)
                }
                None => vec![port_field.static_port()],
            };
            let desired = resolve_descriptors(desired, &port_field.ty);

            let doomed: Vec<EdgeId> = container
                .for_field(field)
                .filter(|port| match desired.iter().find(|d| d.matches_id(port.id())) {
                    Some(data) => !self.ports_connectable(port.display_type(), data.display_type.as_ref()),
                    None => true,
                })
                .flat_map(|port| port.edges().iter().cloned())
                .collect();

            if doomed.is_empty() {
                changed |= self.apply_port_layout(node_id, field, direction, &desired);
                if changed {
                    self.emit(GraphChange::PortsUpdated {
                        node: node_id.clone(),
                        field: field.to_string(),
                    });
                }
                return changed;
            }

            tracing::debug!(
                node = %node_id,
                field,
                edges = doomed.len(),
                "Disconnecting edges invalidated by a port change"
            );
            for edge in &doomed {
                match self.remove_edge(edge) {
                    Some(removed) => touched.extend([removed.output_node_id, removed.input_node_id]),
                    None => {
                        tracing::warn!(node = %node_id, edge = %edge, "Port held an edge unknown to the graph");
                        if let Some(node) = self.nodes.get_mut(node_id) {
                            node.ports_mut(direction).detach_edge(edge);
                        }
                    }
                }
            }
            changed = true;
        }
    }

    /// Patch, add, remove and reorder the ports of a field to match `desired`
    fn apply_port_layout(
        &mut self,
        node_id: &NodeId,
        field: &str,
        direction: PortDirection,
        desired: &[PortData],
    ) -> bool {
        let Some(node) = self.nodes.get_mut(node_id) else {
            return false;
        };
        let container = node.ports_mut(direction);
        let mut changed = false;
        for data in desired {
            match container.find_mut(field, data.id.as_deref()) {
                Some(port) => {
                    if port.data != *data {
                        port.data = data.clone();
                        changed = true;
                    }
                }
                None => {
                    container.push(NodePort::new(field, direction, data.clone()));
                    changed = true;
                }
            }
        }
        let order: Vec<Option<String>> = desired.iter().map(|d| d.id.clone()).collect();
        changed |= container.retain_field(field, &order) > 0;
        changed |= container.reorder_field(field, &order);
        changed
    }

    /// Dynamic fields on the far side of a field's edges, grouped per node
    fn dynamic_dependents(&self, node_id: &NodeId, field: &str) -> Vec<PortUpdate> {
        let Some(node) = self.nodes.get(node_id) else {
            return Vec::new();
        };
        let Some(direction) = node
            .schema()
            .and_then(|s| s.port_field(field))
            .map(|f| f.direction)
        else {
            return Vec::new();
        };

        let mut grouped: Vec<PortUpdate> = Vec::new();
        let edges = node
            .ports(direction)
            .for_field(field)
            .flat_map(NodePort::edges)
            .filter_map(|id| self.edges.get(id));
        for edge in edges {
            let far = direction.opposite();
            let far_node = edge.node(far);
            let far_field = edge.field(far);
            let is_dynamic = self
                .nodes
                .get(far_node)
                .and_then(|n| n.schema())
                .and_then(|s| s.port_field(far_field))
                .is_some_and(|f| f.behavior.is_some());
            if !is_dynamic {
                continue;
            }
            match grouped.iter_mut().find(|(n, _)| n == far_node) {
                Some((_, fields)) => {
                    if !fields.iter().any(|f| f == far_field) {
                        fields.push(far_field.to_string());
                    }
                }
                None => grouped.push((far_node.clone(), vec![far_field.to_string()])),
            }
        }
        grouped
    }
}
