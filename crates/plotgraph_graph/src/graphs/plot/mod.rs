// SPDX-License-Identifier: MIT OR Apache-2.0
//! Plot graphs: story steps wired to the triggers, conditions and actions
//! that drive them, exported as per-step tables for the script runtime.

pub mod export;
pub mod lua;
pub mod nodes;

pub use export::{export_dict, export_graph, ExportError, NodeFunc, PlotGraph, PlotStep};
pub use lua::{to_lua, DEFAULT_TABLE};
pub use nodes::{
    create_plot_registry, new_plot_graph, plot_registry, step_fields, step_title, PlotNodeType, StepIdPolicy,
    AUX_OUTPUT, PARAMETER_NODE, PLOT_NODE,
};
