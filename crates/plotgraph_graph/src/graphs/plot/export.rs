// SPDX-License-Identifier: MIT OR Apache-2.0
//! Step extraction: turns a plot graph into the per-step tables consumed by
//! the script runtime.
//!
//! Field names of the exported structures are part of the runtime's data
//! format and must not change.

use super::nodes::step_fields;
use super::nodes::PlotNodeType;
use crate::graph::Graph;
use crate::node::{Node, NodeId};
use crate::schema::NodeCategory;
use crate::serialize::GraphDict;
use crate::value::FieldValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that abort an export
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExportError {
    /// A step id is not an integer
    #[error("step node id `{id}` in graph `{graph}` is not an integer")]
    InvalidStepId {
        /// Graph name
        graph: String,
        /// Offending id
        id: NodeId,
    },

    /// Two step nodes share an integer id
    #[error("step id {id} appears more than once in graph `{graph}`")]
    DuplicateStepId {
        /// Graph name
        graph: String,
        /// Repeated id
        id: i64,
    },

    /// Two graphs of a dictionary share a display name
    #[error("more than one graph is named `{0}`")]
    DuplicateGraphName(String),

    /// The graph has not been bound to a registry
    #[error("graph `{0}` is not initialized")]
    NotInitialized(String),
}

/// Result type for exports
pub type Result<T> = std::result::Result<T, ExportError>;

/// A script function call: name plus string arguments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeFunc {
    /// Function name
    pub name: String,
    /// Arguments, in field declaration order
    pub param: IndexMap<String, String>,
}

/// One exported step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotStep {
    /// Step id
    pub id: i64,
    /// Step type ordinal
    pub node_type: i64,
    /// Arguments of the attached parameter node
    pub node_param: IndexMap<String, String>,
    /// Trigger calls
    pub triggers: Vec<NodeFunc>,
    /// Condition calls
    pub conditions: Vec<NodeFunc>,
    /// Action calls
    pub acts: Vec<NodeFunc>,
    /// Ids of the previous steps
    pub prev_nodes: Vec<i64>,
    /// Ids of the next steps
    pub next_nodes: Vec<i64>,
}

/// One exported graph, steps ordered by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotGraph {
    /// Graph name
    pub name: String,
    /// Steps keyed by id
    pub nodes: BTreeMap<i64, PlotStep>,
}

/// Argument names renamed for older runtime scripts, keyed by function name
fn legacy_param_name<'a>(func: &str, field: &'a str) -> &'a str {
    match (func, field) {
        ("PlayMiniGame", "gameName") | ("PlayEffect", "effectName") => "name",
        ("PlayMiniGame", "gameId") => "id",
        ("PlayEffect", "effectType") => "type",
        _ => field,
    }
}

fn step_id(graph: &Graph, node: &Node) -> Result<i64> {
    node.id.as_str().parse().map_err(|_| ExportError::InvalidStepId {
        graph: graph.display_name.clone(),
        id: node.id.clone(),
    })
}

fn node_func(node: &Node) -> NodeFunc {
    let name = node
        .schema()
        .and_then(|s| s.func_name.clone())
        .unwrap_or_else(|| node.kind.clone());
    let param = node
        .input_values()
        .into_iter()
        .map(|(field, value)| (legacy_param_name(&name, field).to_string(), value.to_string()))
        .collect();
    NodeFunc { name, param }
}

fn node_param(node: &Node) -> IndexMap<String, String> {
    node.input_values()
        .into_iter()
        .map(|(field, value)| (field.to_string(), value.to_string()))
        .collect()
}

fn export_step(graph: &Graph, node: &Node, id: i64) -> Result<PlotStep> {
    let mut step = PlotStep {
        id,
        node_type: node
            .field(step_fields::NODE_TYPE)
            .and_then(FieldValue::as_int)
            .unwrap_or_else(|| PlotNodeType::default().ordinal()),
        ..PlotStep::default()
    };

    for upstream in graph.input_nodes_of(&node.id) {
        match upstream.category() {
            Some(NodeCategory::Action) => step.acts.push(node_func(upstream)),
            Some(NodeCategory::Condition) => step.conditions.push(node_func(upstream)),
            Some(NodeCategory::Trigger) => step.triggers.push(node_func(upstream)),
            Some(NodeCategory::Parameter) => step.node_param = node_param(upstream),
            Some(NodeCategory::Step) => step.prev_nodes.push(step_id(graph, upstream)?),
            Some(NodeCategory::Custom) | None => {
                tracing::debug!(step = id, node = %upstream.id, "Ignoring upstream node of kind {}", upstream.kind);
            }
        }
    }
    for downstream in graph.output_nodes_of(&node.id) {
        if downstream.is(NodeCategory::Step) {
            step.next_nodes.push(step_id(graph, downstream)?);
        }
    }
    Ok(step)
}

/// Export every step of an initialized graph.
///
/// Calls are listed in edge order. A step id that is not an integer fails
/// the whole export.
pub fn export_graph(graph: &Graph) -> Result<PlotGraph> {
    if !graph.is_initialized() {
        return Err(ExportError::NotInitialized(graph.display_name.clone()));
    }

    let mut nodes = BTreeMap::new();
    for node in graph.nodes().filter(|n| n.is(NodeCategory::Step)) {
        let id = step_id(graph, node)?;
        let step = export_step(graph, node, id)?;
        if nodes.insert(id, step).is_some() {
            return Err(ExportError::DuplicateStepId {
                graph: graph.display_name.clone(),
                id,
            });
        }
    }

    tracing::debug!(graph = %graph.display_name, steps = nodes.len(), "Exported graph");
    Ok(PlotGraph {
        name: graph.display_name.clone(),
        nodes,
    })
}

/// Export a dictionary of initialized graphs, keyed by graph display name
pub fn export_dict(graphs: &GraphDict) -> Result<BTreeMap<String, PlotGraph>> {
    let mut exported = BTreeMap::new();
    for graph in graphs.values() {
        let plot = export_graph(graph)?;
        if exported.contains_key(&plot.name) {
            return Err(ExportError::DuplicateGraphName(plot.name));
        }
        exported.insert(plot.name.clone(), plot);
    }
    Ok(exported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::PortRef;
    use crate::graphs::plot::nodes::{new_plot_graph, AUX_OUTPUT, PLOT_NODE};
    use crate::node::Rect;

    fn link(graph: &mut Graph, from: &NodeId, from_field: &str, to: &NodeId, to_field: &str) {
        graph
            .connect(&PortRef::new(to.clone(), to_field), &PortRef::new(from.clone(), from_field))
            .unwrap();
    }

    #[test]
    fn test_legacy_names() {
        assert_eq!(legacy_param_name("PlayMiniGame", "gameName"), "name");
        assert_eq!(legacy_param_name("PlayEffect", "effectType"), "type");
        assert_eq!(legacy_param_name("PlayEffect", "endTime"), "endTime");
        assert_eq!(legacy_param_name("PlayDialog", "gameId"), "gameId");
    }

    #[test]
    fn test_calls_and_parameters() {
        let mut graph = new_plot_graph("intro").unwrap();
        let step = graph.create_node(PLOT_NODE, Rect::default()).unwrap();
        let game = graph.create_node("ActionPlayGame", Rect::default()).unwrap();
        let dialog = graph.create_node("ActionPlayDialog", Rect::default()).unwrap();
        let check = graph.create_node("ConditionCheckItem", Rect::default()).unwrap();
        let param = graph.create_node("BaseParameterNode", Rect::default()).unwrap();
        graph.set_node_field(&game, "gameName", "fishing").unwrap();
        graph.set_node_field(&game, "gameId", "7").unwrap();
        graph.set_node_field(&param, "backTo", "3").unwrap();

        link(&mut graph, &game, AUX_OUTPUT, &step, step_fields::ACTIONS);
        link(&mut graph, &dialog, AUX_OUTPUT, &step, step_fields::ACTIONS);
        link(&mut graph, &check, AUX_OUTPUT, &step, step_fields::CONDITIONS);
        link(&mut graph, &param, AUX_OUTPUT, &step, step_fields::PARAM);

        let plot = export_graph(&graph).unwrap();
        let exported = &plot.nodes[&1];
        assert_eq!(exported.node_type, 1);
        assert_eq!(exported.acts.len(), 2);
        assert_eq!(exported.acts[0].name, "PlayMiniGame");
        assert_eq!(exported.acts[0].param["name"], "fishing");
        assert_eq!(exported.acts[0].param["id"], "7");
        assert_eq!(exported.acts[1].name, "PlayDialog");
        let keys: Vec<_> = exported.acts[1].param.keys().cloned().collect();
        assert_eq!(keys, vec!["dialogId", "typeId", "picName"]);
        assert_eq!(exported.conditions[0].param["hasOwn"], "");
        assert_eq!(exported.node_param["backTo"], "3");
        assert!(exported.triggers.is_empty());
    }

    #[test]
    fn test_step_links() {
        let mut graph = new_plot_graph("intro").unwrap();
        let a = graph.create_node(PLOT_NODE, Rect::default()).unwrap();
        let b = graph.create_node(PLOT_NODE, Rect::default()).unwrap();
        let c = graph.create_node(PLOT_NODE, Rect::default()).unwrap();
        link(&mut graph, &a, step_fields::NEXT_NODES, &b, step_fields::PRE_NODES);
        link(&mut graph, &a, step_fields::NEXT_NODES, &c, step_fields::PRE_NODES);
        graph.set_node_field(&c, step_fields::NODE_TYPE, PlotNodeType::BranchPlot.ordinal()).unwrap();

        let plot = export_graph(&graph).unwrap();
        assert_eq!(plot.nodes[&1].next_nodes, vec![2, 3]);
        assert_eq!(plot.nodes[&3].prev_nodes, vec![1]);
        assert_eq!(plot.nodes[&3].node_type, 2);

        let json = serde_json::to_value(&plot).unwrap();
        assert_eq!(json["nodes"]["1"]["nextNodes"], serde_json::json!([2, 3]));
        assert!(json["nodes"]["1"].get("nodeParam").is_some());
    }

    #[test]
    fn test_non_integer_step_id_is_fatal() {
        let mut graph = new_plot_graph("intro").unwrap();
        graph.create_node(PLOT_NODE, Rect::default()).unwrap();
        let node = Node::new(NodeId::from("start"), PLOT_NODE, Rect::default());
        graph.add_node(node).unwrap();
        assert!(matches!(export_graph(&graph), Err(ExportError::InvalidStepId { .. })));
    }

    #[test]
    fn test_uninitialized_graph() {
        assert_eq!(
            export_graph(&Graph::new("raw")),
            Err(ExportError::NotInitialized("raw".into()))
        );
    }
}
