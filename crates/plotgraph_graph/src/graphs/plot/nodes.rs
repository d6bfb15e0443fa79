// SPDX-License-Identifier: MIT OR Apache-2.0
//! Plot node library: the step node and the trigger, condition, action and
//! parameter nodes feeding it.

use crate::graph::Graph;
use crate::node::{Node, NodeId, NodeIdPolicy};
use crate::registry::NodeRegistry;
use crate::schema::{FieldAttribute, FieldDecl, NodeCategory, NodeSchema, SchemaError};
use crate::value::FieldType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

/// Kind of the step node
pub const PLOT_NODE: &str = "PlotNode";

/// Enum type of the step's `nodeType` field
pub const PLOT_NODE_TYPE: &str = "PlotNodeType";

/// Link type between steps
pub const PLOT_NODE_DATA: &str = "PlotNodeData";
/// Link type of trigger nodes
pub const TRIGGER_DATA: &str = "TriggerData";
/// Link type of condition nodes
pub const CONDITION_DATA: &str = "ConditionData";
/// Link type of action nodes
pub const ACTION_DATA: &str = "ActionData";
/// Link type of parameter nodes
pub const PARAMETER_DATA: &str = "ParameterData";

/// Output field of every auxiliary node
pub const AUX_OUTPUT: &str = "outPut";

/// Step node fields
pub mod step_fields {
    /// Previous steps
    pub const PRE_NODES: &str = "preNodes";
    /// Triggers
    pub const TRIGGERS: &str = "triggers";
    /// Conditions
    pub const CONDITIONS: &str = "conditions";
    /// Actions
    pub const ACTIONS: &str = "actions";
    /// Step parameters
    pub const PARAM: &str = "param";
    /// Next steps
    pub const NEXT_NODES: &str = "nextNodes";
    /// Step type
    pub const NODE_TYPE: &str = "nodeType";
    /// Step comment
    pub const NODE_DES: &str = "nodeDes";
}

/// Step type, stored as its ordinal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlotNodeType {
    /// Main story line
    #[default]
    MainPlot = 1,
    /// Side story
    BranchPlot = 2,
    /// Always-active step
    PersistedNode = 3,
}

impl PlotNodeType {
    /// Stored ordinal
    pub fn ordinal(self) -> i64 {
        self as i64
    }
}

/// A function-call node: kind, display name, script function and its
/// string arguments as (field, label) pairs
struct FuncNode {
    kind: &'static str,
    name: &'static str,
    func: &'static str,
    params: &'static [(&'static str, &'static str)],
}

const TRIGGER_NODES: &[FuncNode] = &[
    FuncNode {
        kind: "TriggerEnterMap",
        name: "Enter map",
        func: "EnterMap",
        params: &[],
    },
    FuncNode {
        kind: "TriggerClickBubble",
        name: "Click bubble",
        func: "ClickBubble",
        params: &[("charaId", "Character id")],
    },
    FuncNode {
        kind: "TriggerFinishAllPrevNodes",
        name: "Finish all previous steps",
        func: "FinishAllPrevNodes",
        params: &[],
    },
    FuncNode {
        kind: "TriggerMainCharaMoveEnd",
        name: "Main character stops",
        func: "MainCharaMoveEnd",
        params: &[],
    },
    FuncNode {
        kind: "TriggerClickItem",
        name: "Click item",
        func: "ClickItem",
        params: &[("itemId", "Item id")],
    },
];

const CONDITION_NODES: &[FuncNode] = &[
    FuncNode {
        kind: "ConditionCheckItem",
        name: "Owns item",
        func: "CheckItem",
        params: &[("itemId", "Item id"), ("itemCount", "Item count"), ("hasOwn", "Owned")],
    },
    FuncNode {
        kind: "ConditionCheckCharaCell",
        name: "Character past cell",
        func: "CheckCharaCell",
        params: &[("charaId", "Character id"), ("x", "X"), ("y", "Y")],
    },
];

const ACTION_NODES: &[FuncNode] = &[
    FuncNode {
        kind: "ActionPlayDialog",
        name: "Dialog",
        func: "PlayDialog",
        params: &[("dialogId", "Dialog id"), ("typeId", "Dialog type"), ("picName", "Background")],
    },
    FuncNode {
        kind: "ActionPlayGame",
        name: "Play game",
        func: "PlayMiniGame",
        params: &[("gameName", "Game name"), ("gameId", "Game id")],
    },
    FuncNode {
        kind: "ActionPlayEffect",
        name: "Play effect",
        func: "PlayEffect",
        params: &[
            ("effectName", "Effect name"),
            ("effectType", "Effect type"),
            ("endByClick", "End on click"),
            ("endTime", "End time"),
        ],
    },
    FuncNode {
        kind: "ActionGoNextStory",
        name: "Next map",
        func: "GoNextStory",
        params: &[("storyId", "Story id")],
    },
    FuncNode {
        kind: "ActionPlayBubble",
        name: "Show bubble",
        func: "PlayBubble",
        params: &[
            ("charaId", "Character id"),
            ("bubbleType", "Bubble type"),
            ("dialogId", "Dialog id"),
            ("dialogStep", "Dialog step"),
        ],
    },
    FuncNode {
        kind: "ActionCharaMoveToCell",
        name: "Move character to cell",
        func: "CharaMoveToCell",
        params: &[("charaId", "Character id"), ("x", "X"), ("y", "Y")],
    },
    FuncNode {
        kind: "ActionPlayerMoveToActor",
        name: "Move player to NPC",
        func: "PlayerMoveToActor",
        params: &[("charaId", "Character id")],
    },
    FuncNode {
        kind: "ActionPlayDialogAndBack",
        name: "Dialog and step back",
        func: "PlayDialogAndBack",
        params: &[("dialogId", "Dialog id"), ("typeId", "Dialog type"), ("picName", "Background")],
    },
    FuncNode {
        kind: "ActionJumpToSpecificNode",
        name: "Jump to step",
        func: "JumpToSpecificNode",
        params: &[("nodeId", "Step id")],
    },
    FuncNode {
        kind: "ActionChangeAnim",
        name: "Change animation",
        func: "ChangeAnim",
        params: &[("charaId", "Character id"), ("animState", "Animation")],
    },
    FuncNode {
        kind: "ActionActiveChara",
        name: "Show or hide character",
        func: "ActiveChara",
        params: &[("charaId", "Character id"), ("isActive", "Active")],
    },
    FuncNode {
        kind: "ActionActiveItem",
        name: "Show or hide item",
        func: "ActiveItem",
        params: &[
            ("itemId", "Item id"),
            ("isActive", "Active"),
            ("x", "X"),
            ("y", "Y"),
            ("effectOn", "Effect"),
        ],
    },
    FuncNode {
        kind: "ActionGetItem",
        name: "Get item",
        func: "GetItem",
        params: &[("itemId", "Item id"), ("count", "Count")],
    },
    FuncNode {
        kind: "ActionSetOperationData",
        name: "Set map interactable",
        func: "SetOperationData",
        params: &[
            ("x", "X"),
            ("y", "Y"),
            ("type", "Type"),
            ("itemId", "Item id"),
            ("itemCount", "Item count"),
        ],
    },
    FuncNode {
        kind: "ActionCondToAction",
        name: "Dispatch by condition",
        func: "CondToAction",
        params: &[("condEnum", "Condition")],
    },
];

/// Kind of the step parameter node
pub const PARAMETER_NODE: &str = "BaseParameterNode";

fn string_input(field: &str, label: &str) -> FieldDecl {
    FieldDecl::new(field, FieldType::String)
        .with_default("")
        .with(FieldAttribute::input(label))
        .with(FieldAttribute::ShowAsDrawer)
}

fn func_schema(
    def: &FuncNode,
    category: NodeCategory,
    menu: &str,
    marker: &str,
    color: [u8; 3],
) -> Result<NodeSchema, SchemaError> {
    let mut builder = NodeSchema::builder(def.kind, category)
        .display_name(def.name)
        .func_name(def.func)
        .menu_path(format!("{menu}/{}", def.name))
        .color(color)
        .field(FieldDecl::new(AUX_OUTPUT, FieldType::marker(marker)).with(FieldAttribute::output("Node")));
    for (field, label) in def.params {
        builder = builder.field(string_input(field, label));
    }
    builder.build()
}

fn step_schema() -> Result<NodeSchema, SchemaError> {
    use step_fields::*;

    NodeSchema::builder(PLOT_NODE, NodeCategory::Step)
        .display_name("Step")
        .menu_path("Step")
        .field(
            FieldDecl::new(PRE_NODES, FieldType::marker(PLOT_NODE_DATA))
                .with(FieldAttribute::input_multiple("Previous steps")),
        )
        .field(
            FieldDecl::new(TRIGGERS, FieldType::marker(TRIGGER_DATA)).with(FieldAttribute::input_multiple("Triggers")),
        )
        .field(
            FieldDecl::new(CONDITIONS, FieldType::marker(CONDITION_DATA))
                .with(FieldAttribute::input_multiple("Conditions")),
        )
        .field(
            FieldDecl::new(ACTIONS, FieldType::marker(ACTION_DATA)).with(FieldAttribute::input_multiple("Actions")),
        )
        .field(FieldDecl::new(PARAM, FieldType::marker(PARAMETER_DATA)).with(FieldAttribute::input("Parameters")))
        .field(FieldDecl::new(NEXT_NODES, FieldType::marker(PLOT_NODE_DATA)).with(FieldAttribute::output("Next steps")))
        .field(
            FieldDecl::new(NODE_TYPE, FieldType::enumeration(PLOT_NODE_TYPE))
                .with_default(PlotNodeType::default().ordinal())
                .with(FieldAttribute::output("Step type"))
                .with(FieldAttribute::ShowAsDrawer),
        )
        .field(
            FieldDecl::new(NODE_DES, FieldType::String)
                .with_default("")
                .with(FieldAttribute::output("Comment"))
                .with(FieldAttribute::ShowAsDrawer),
        )
        .build()
}

/// Create the plot graph node registry
pub fn create_plot_registry() -> Result<NodeRegistry, SchemaError> {
    let mut registry = NodeRegistry::new();

    // Steps
    registry.register(step_schema()?)?;

    // Triggers
    for def in TRIGGER_NODES {
        registry.register(func_schema(def, NodeCategory::Trigger, "Trigger", TRIGGER_DATA, [255, 0, 0])?)?;
    }

    // Conditions
    for def in CONDITION_NODES {
        registry.register(func_schema(
            def,
            NodeCategory::Condition,
            "Condition",
            CONDITION_DATA,
            [255, 0, 255],
        )?)?;
    }

    // Actions
    for def in ACTION_NODES {
        registry.register(func_schema(def, NodeCategory::Action, "Action", ACTION_DATA, [0, 255, 0])?)?;
    }

    // Parameters
    registry.register(
        NodeSchema::builder(PARAMETER_NODE, NodeCategory::Parameter)
            .display_name("Node parameter")
            .menu_path("Parameter/Node parameter")
            .field(
                FieldDecl::new(AUX_OUTPUT, FieldType::marker(PARAMETER_DATA)).with(FieldAttribute::output("Step")),
            )
            .field(string_input("backTo", "Fallback step"))
            .build()?,
    )?;

    Ok(registry)
}

/// The process-wide plot registry, built on first use
pub fn plot_registry() -> Result<Arc<NodeRegistry>, SchemaError> {
    static REGISTRY: OnceLock<Arc<NodeRegistry>> = OnceLock::new();
    if let Some(registry) = REGISTRY.get() {
        return Ok(registry.clone());
    }
    let registry = Arc::new(create_plot_registry()?);
    Ok(REGISTRY.get_or_init(|| registry).clone())
}

/// Create an empty plot graph, initialized with the plot registry
pub fn new_plot_graph(name: impl Into<String>) -> Result<Graph, SchemaError> {
    Ok(Graph::with_registry(name, plot_registry()?, Arc::new(StepIdPolicy)))
}

/// Title shown for a step node: its comment after a fixed prefix
pub fn step_title(node: &Node) -> String {
    let comment = node.field(step_fields::NODE_DES).map(ToString::to_string).unwrap_or_default();
    format!("Step{comment}")
}

/// Step nodes get dense integer ids, one past the largest integer id among
/// the graph's step nodes (starting at 1); other nodes get random ids.
///
/// When the largest id is `i64::MAX` the smallest unused positive id is
/// taken instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepIdPolicy;

impl NodeIdPolicy for StepIdPolicy {
    fn allocate(&self, graph: &Graph, node: &Node) -> NodeId {
        if !node.is(NodeCategory::Step) {
            return NodeId::random();
        }
        let used: BTreeSet<i64> = graph
            .nodes()
            .filter(|n| n.is(NodeCategory::Step))
            .filter_map(|n| n.id.as_str().parse::<i64>().ok())
            .collect();
        let next = match used.last() {
            None => 1,
            Some(max) => max
                .checked_add(1)
                .or_else(|| (1..i64::MAX).find(|id| !used.contains(id)))
                .unwrap_or(i64::MAX),
        };
        NodeId(next.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::PortRef;
    use crate::node::Rect;
    use crate::port::PortDirection;
    use crate::value::FieldValue;

    #[test]
    fn test_registry_contents() {
        let registry = create_plot_registry().unwrap();
        assert!(registry.contains(PLOT_NODE));
        assert!(registry.contains("ActionPlayGame"));
        assert_eq!(registry.by_category(NodeCategory::Trigger).count(), 5);
        assert_eq!(registry.by_category(NodeCategory::Condition).count(), 2);
        assert_eq!(registry.by_category(NodeCategory::Action).count(), 15);
        assert_eq!(
            registry.get("ActionPlayGame").unwrap().func_name.as_deref(),
            Some("PlayMiniGame")
        );
        let menu = registry.menu_entries();
        assert!(menu.iter().any(|e| e.path == "Trigger/Enter map" && e.kind == "TriggerEnterMap"));
    }

    #[test]
    fn test_shared_registry_is_reused() {
        let a = plot_registry().unwrap();
        let b = plot_registry().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_step_defaults() {
        let mut graph = new_plot_graph("plot").unwrap();
        let id = graph.create_node(PLOT_NODE, Rect::default()).unwrap();
        let node = graph.node(&id).unwrap();
        assert_eq!(node.field(step_fields::NODE_TYPE), Some(&FieldValue::Int(1)));
        assert_eq!(node.field(step_fields::NODE_DES), Some(&FieldValue::from("")));
        assert_eq!(step_title(node), "Step");
        assert!(node.port(PortDirection::Input, step_fields::TRIGGERS, None).unwrap().accepts_multiple_edges());
        assert!(!node.port(PortDirection::Input, step_fields::PARAM, None).unwrap().accepts_multiple_edges());
    }

    #[test]
    fn test_step_ids_are_dense() {
        let mut graph = new_plot_graph("plot").unwrap();
        let first = graph.create_node(PLOT_NODE, Rect::default()).unwrap();
        let trigger = graph.create_node("TriggerEnterMap", Rect::default()).unwrap();
        let second = graph.create_node(PLOT_NODE, Rect::default()).unwrap();
        assert_eq!(first.as_str(), "1");
        assert_eq!(second.as_str(), "2");
        assert!(trigger.as_str().parse::<i64>().is_err());

        graph.remove_node(&first);
        let third = graph.create_node(PLOT_NODE, Rect::default()).unwrap();
        assert_eq!(third.as_str(), "3");
    }

    #[test]
    fn test_step_ids_after_largest_id_fill_gaps() {
        let mut graph = new_plot_graph("plot").unwrap();
        let top = Node::new(NodeId::from(i64::MAX.to_string().as_str()), PLOT_NODE, Rect::default());
        let top = graph.add_node(top).unwrap();
        assert_eq!(top.as_str(), i64::MAX.to_string());

        let first = graph.create_node(PLOT_NODE, Rect::default()).unwrap();
        let second = graph.create_node(PLOT_NODE, Rect::default()).unwrap();
        assert_eq!(first.as_str(), "1");
        assert_eq!(second.as_str(), "2");
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn test_marker_types_gate_connections() {
        let mut graph = new_plot_graph("plot").unwrap();
        let step = graph.create_node(PLOT_NODE, Rect::default()).unwrap();
        let action = graph.create_node("ActionGetItem", Rect::default()).unwrap();
        let output = PortRef::new(action.clone(), AUX_OUTPUT);
        assert!(graph.can_connect(&PortRef::new(step.clone(), step_fields::ACTIONS), &output));
        assert!(!graph.can_connect(&PortRef::new(step, step_fields::TRIGGERS), &output));
    }
}
