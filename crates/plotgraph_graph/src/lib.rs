// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph framework for plot scripting.
//!
//! This crate provides the graph core behind the plot editor:
//! - Declarative node schemas and a node registry
//! - Ports derived from tagged fields, with dynamic port lists
//! - Edges with cardinality rules and typed value transfer
//! - Change notifications for the host
//! - Step export for the script runtime
//!
//! ## Architecture
//!
//! The framework is built on a generic graph model with:
//! - Typed input/output ports
//! - Connection validation through a coercion table
//! - Worklist-driven port synchronization
//! - Serialization support

pub mod clipboard;
pub mod edge;
pub mod elements;
pub mod events;
pub mod graph;
pub mod graphs;
pub mod node;
pub mod parameter;
pub mod port;
pub mod registry;
pub mod schema;
pub mod serialize;
mod sync;
pub mod value;

pub use clipboard::Clipboard;
pub use edge::{Edge, EdgeId, PortRef};
pub use elements::{Group, PinnedElement, StickyNote};
pub use events::{ChangeListener, GraphChange, ListenerId};
pub use graph::{Graph, GraphError, InitReport};
pub use node::{Node, NodeId, NodeIdPolicy, RandomIdPolicy, Rect};
pub use parameter::{ExposedParameter, ParameterKind, ParameterMode, ParameterSettings, ParameterValue};
pub use port::{NodePort, PortContainer, PortData, PortDirection};
pub use registry::NodeRegistry;
pub use schema::{FieldAttribute, FieldDecl, NodeCategory, NodeHooks, NodeSchema, PortBehavior, SchemaError};
pub use serialize::{load_dict, load_graph, save_dict, save_graph, GraphDict, SerializeError};
pub use value::{CoercionTable, FieldType, FieldValue};
