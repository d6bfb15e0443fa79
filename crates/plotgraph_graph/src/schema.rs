// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative node schemas.
//!
//! A node kind declares its fields once, tagging each with attributes. The
//! builder derives the port metadata from those tags and rejects
//! inconsistent declarations up front.

use crate::edge::Edge;
use crate::node::Node;
use crate::port::{PortData, PortDirection};
use crate::value::{FieldType, FieldValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Node configuration errors: bugs in a node kind's declaration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// A field carries both an input and an output tag
    #[error("field `{field}` of `{kind}` is tagged both input and output")]
    ConflictingPortTags {
        /// Node kind
        kind: String,
        /// Field name
        field: String,
    },

    /// A field carries the same direction tag twice
    #[error("field `{field}` of `{kind}` has more than one port tag")]
    DuplicatePortTag {
        /// Node kind
        kind: String,
        /// Field name
        field: String,
    },

    /// Two fields share a name
    #[error("field `{field}` is declared twice on `{kind}`")]
    DuplicateField {
        /// Node kind
        kind: String,
        /// Field name
        field: String,
    },

    /// The declared default does not fit the declared type
    #[error("default value of `{kind}.{field}` does not match type {ty}")]
    DefaultTypeMismatch {
        /// Node kind
        kind: String,
        /// Field name
        field: String,
        /// Declared type
        ty: FieldType,
    },

    /// A dynamic port behavior is attached to a field that is not a port
    #[error("field `{field}` of `{kind}` has a port behavior but no port tag")]
    BehaviorWithoutPort {
        /// Node kind
        kind: String,
        /// Field name
        field: String,
    },

    /// A kind is registered twice
    #[error("node kind `{0}` is already registered")]
    DuplicateKind(String),
}

/// Field-level tag
#[derive(Debug, Clone, PartialEq)]
pub enum FieldAttribute {
    /// The field is an input port
    Input {
        /// Display name; the field name when absent
        name: Option<String>,
        /// Accept more than one edge
        allow_multiple: bool,
    },
    /// The field is an output port
    Output {
        /// Display name; the field name when absent
        name: Option<String>,
        /// Accept more than one edge
        allow_multiple: bool,
    },
    /// Tooltip shown by the host
    Tooltip(String),
    /// Port drawn vertically
    Vertical,
    /// Host draws the value next to the port
    ShowAsDrawer,
}

impl FieldAttribute {
    /// Input tag with the default single-edge cardinality
    pub fn input(name: impl Into<String>) -> Self {
        Self::Input {
            name: Some(name.into()),
            allow_multiple: false,
        }
    }

    /// Input tag accepting many edges
    pub fn input_multiple(name: impl Into<String>) -> Self {
        Self::Input {
            name: Some(name.into()),
            allow_multiple: true,
        }
    }

    /// Output tag with the default multi-edge cardinality
    pub fn output(name: impl Into<String>) -> Self {
        Self::Output {
            name: Some(name.into()),
            allow_multiple: true,
        }
    }

    /// Output tag accepting a single edge
    pub fn output_single(name: impl Into<String>) -> Self {
        Self::Output {
            name: Some(name.into()),
            allow_multiple: false,
        }
    }
}

/// Dynamic port behavior: maps the edges currently attached to a field's
/// ports to the list of ports the field should expose
#[derive(Clone)]
pub struct PortBehavior(Arc<dyn Fn(&[Edge]) -> Vec<PortData> + Send + Sync>);

impl PortBehavior {
    /// Wrap a behavior function
    pub fn new(f: impl Fn(&[Edge]) -> Vec<PortData> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Compute the desired ports
    pub fn ports_for(&self, edges: &[Edge]) -> Vec<PortData> {
        (self.0)(edges)
    }
}

impl fmt::Debug for PortBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PortBehavior(..)")
    }
}

/// One declared field
#[derive(Debug, Clone)]
pub struct FieldDecl {
    /// Field name (serialization key)
    pub name: String,
    /// Declared type
    pub ty: FieldType,
    /// Declared default
    pub default: FieldValue,
    /// Tags
    pub attributes: Vec<FieldAttribute>,
    /// Optional dynamic port behavior
    pub behavior: Option<PortBehavior>,
}

impl FieldDecl {
    /// Declare a plain field with the type's default value
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        let default = ty.default_value();
        Self {
            name: name.into(),
            ty,
            default,
            attributes: Vec::new(),
            behavior: None,
        }
    }

    /// Set the declared default
    pub fn with_default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = value.into();
        self
    }

    /// Add a tag
    pub fn with(mut self, attribute: FieldAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Attach a dynamic port behavior
    pub fn with_behavior(mut self, behavior: PortBehavior) -> Self {
        self.behavior = Some(behavior);
        self
    }
}

/// Port metadata derived from a tagged field
#[derive(Debug, Clone)]
pub struct PortField {
    /// Field name
    pub field_name: String,
    /// Input or output
    pub direction: PortDirection,
    /// Accept more than one edge
    pub allow_multiple: bool,
    /// Display name
    pub display_name: String,
    /// Tooltip
    pub tooltip: Option<String>,
    /// Drawn vertically
    pub vertical: bool,
    /// Host draws the value next to the port
    pub show_as_drawer: bool,
    /// Declared field type
    pub ty: FieldType,
    /// Dynamic port behavior
    pub behavior: Option<PortBehavior>,
}

impl PortField {
    /// Whether this is an input field
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    /// The single port a static field exposes
    pub fn static_port(&self) -> PortData {
        PortData {
            id: None,
            display_name: self.display_name.clone(),
            display_type: Some(self.ty.clone()),
            accept_multiple_edges: self.allow_multiple,
            tooltip: self.tooltip.clone(),
            vertical: self.vertical,
            size_in_pixel: 0,
            show_input_drawer: self.show_as_drawer,
        }
    }
}

/// Node kind category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Sequential script step
    Step,
    /// Step trigger
    Trigger,
    /// Step condition
    Condition,
    /// Step action
    Action,
    /// Step parameters
    Parameter,
    /// Anything else
    Custom,
}

/// Per-kind lifecycle hooks
pub trait NodeHooks: fmt::Debug + Send + Sync {
    /// Called when the node joins an initialized graph
    fn enable(&self, _node: &mut Node) {}

    /// Called when the owning graph is disabled
    fn disable(&self, _node: &mut Node) {}

    /// Called before the node is removed from its graph
    fn destroy(&self, _node: &mut Node) {}

    /// Whether an input field may be reset once its last edge is detached
    fn can_reset_port(&self, _node: &Node, _field: &str) -> bool {
        true
    }
}

/// Validated declaration of one node kind
#[derive(Debug, Clone)]
pub struct NodeSchema {
    /// Unique kind identifier (serialization key)
    pub kind: String,
    /// Display name
    pub display_name: String,
    /// Category
    pub category: NodeCategory,
    /// Script function name, for function-call nodes
    pub func_name: Option<String>,
    /// Creation menu path
    pub menu_path: Option<String>,
    /// Host color hint
    pub color: Option<[u8; 3]>,
    /// Whether the host may delete the node
    pub deletable: bool,
    fields: IndexMap<String, FieldDecl>,
    port_fields: IndexMap<String, PortField>,
    hooks: Option<Arc<dyn NodeHooks>>,
}

impl NodeSchema {
    /// Start declaring a node kind
    pub fn builder(kind: impl Into<String>, category: NodeCategory) -> NodeSchemaBuilder {
        let kind = kind.into();
        NodeSchemaBuilder {
            display_name: kind.clone(),
            kind,
            category,
            func_name: None,
            menu_path: None,
            color: None,
            deletable: true,
            fields: Vec::new(),
            hooks: None,
        }
    }

    /// All declared fields, in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.fields.values()
    }

    /// One declared field
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.get(name)
    }

    /// Port fields, in declaration order
    pub fn port_fields(&self) -> impl Iterator<Item = &PortField> {
        self.port_fields.values()
    }

    /// Port metadata of one field
    pub fn port_field(&self, name: &str) -> Option<&PortField> {
        self.port_fields.get(name)
    }

    /// Input-tagged fields, in declaration order
    pub fn input_fields(&self) -> impl Iterator<Item = &PortField> {
        self.port_fields.values().filter(|f| f.is_input())
    }

    /// Lifecycle hooks, if any
    pub fn hooks(&self) -> Option<&Arc<dyn NodeHooks>> {
        self.hooks.as_ref()
    }
}

/// Builder for [`NodeSchema`]
#[derive(Debug)]
pub struct NodeSchemaBuilder {
    kind: String,
    display_name: String,
    category: NodeCategory,
    func_name: Option<String>,
    menu_path: Option<String>,
    color: Option<[u8; 3]>,
    deletable: bool,
    fields: Vec<FieldDecl>,
    hooks: Option<Arc<dyn NodeHooks>>,
}

impl NodeSchemaBuilder {
    /// Set the display name
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Set the script function name
    pub fn func_name(mut self, name: impl Into<String>) -> Self {
        self.func_name = Some(name.into());
        self
    }

    /// Set the creation menu path
    pub fn menu_path(mut self, path: impl Into<String>) -> Self {
        self.menu_path = Some(path.into());
        self
    }

    /// Set the color hint
    pub fn color(mut self, color: [u8; 3]) -> Self {
        self.color = Some(color);
        self
    }

    /// Mark the node as not deletable by the host
    pub fn undeletable(mut self) -> Self {
        self.deletable = false;
        self
    }

    /// Declare a field
    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    /// Install lifecycle hooks
    pub fn hooks(mut self, hooks: Arc<dyn NodeHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Validate the declaration and derive port metadata
    pub fn build(self) -> Result<NodeSchema, SchemaError> {
        let mut fields = IndexMap::new();
        let mut port_fields = IndexMap::new();

        for decl in self.fields {
            if fields.contains_key(&decl.name) {
                return Err(SchemaError::DuplicateField {
                    kind: self.kind,
                    field: decl.name,
                });
            }
            if !decl.ty.accepts(&decl.default) {
                return Err(SchemaError::DefaultTypeMismatch {
                    kind: self.kind,
                    field: decl.name,
                    ty: decl.ty,
                });
            }
            if let Some(port) = derive_port_field(&self.kind, &decl)? {
                port_fields.insert(decl.name.clone(), port);
            } else if decl.behavior.is_some() {
                return Err(SchemaError::BehaviorWithoutPort {
                    kind: self.kind,
                    field: decl.name,
                });
            }
            fields.insert(decl.name.clone(), decl);
        }

        Ok(NodeSchema {
            kind: self.kind,
            display_name: self.display_name,
            category: self.category,
            func_name: self.func_name,
            menu_path: self.menu_path,
            color: self.color,
            deletable: self.deletable,
            fields,
            port_fields,
            hooks: self.hooks,
        })
    }
}

fn derive_port_field(kind: &str, decl: &FieldDecl) -> Result<Option<PortField>, SchemaError> {
    let mut tag: Option<(PortDirection, Option<String>, bool)> = None;
    let mut tooltip = None;
    let mut vertical = false;
    let mut show_as_drawer = false;

    for attribute in &decl.attributes {
        let (direction, name, allow_multiple) = match attribute {
            FieldAttribute::Input { name, allow_multiple } => (PortDirection::Input, name, *allow_multiple),
            FieldAttribute::Output { name, allow_multiple } => (PortDirection::Output, name, *allow_multiple),
            FieldAttribute::Tooltip(text) => {
                tooltip = Some(text.clone());
                continue;
            }
            FieldAttribute::Vertical => {
                vertical = true;
                continue;
            }
            FieldAttribute::ShowAsDrawer => {
                show_as_drawer = true;
                continue;
            }
        };
        match &tag {
            Some((existing, _, _)) if *existing != direction => {
                return Err(SchemaError::ConflictingPortTags {
                    kind: kind.to_string(),
                    field: decl.name.clone(),
                });
            }
            Some(_) => {
                return Err(SchemaError::DuplicatePortTag {
                    kind: kind.to_string(),
                    field: decl.name.clone(),
                });
            }
            None => tag = Some((direction, name.clone(), allow_multiple)),
        }
    }

    Ok(tag.map(|(direction, name, allow_multiple)| PortField {
        field_name: decl.name.clone(),
        direction,
        allow_multiple,
        display_name: name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| decl.name.clone()),
        tooltip,
        vertical,
        show_as_drawer,
        ty: decl.ty.clone(),
        behavior: decl.behavior.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_fields_have_no_port() {
        let schema = NodeSchema::builder("Note", NodeCategory::Custom)
            .field(FieldDecl::new("text", FieldType::String))
            .build()
            .unwrap();
        assert!(schema.field("text").is_some());
        assert_eq!(schema.port_fields().count(), 0);
    }

    #[test]
    fn test_default_cardinality() {
        let schema = NodeSchema::builder("Pass", NodeCategory::Custom)
            .field(FieldDecl::new("in", FieldType::Int).with(FieldAttribute::Input {
                name: None,
                allow_multiple: false,
            }))
            .field(FieldDecl::new("out", FieldType::Int).with(FieldAttribute::output("Out")))
            .build()
            .unwrap();

        let input = schema.port_field("in").unwrap();
        assert!(input.is_input());
        assert!(!input.allow_multiple);
        assert_eq!(input.display_name, "in");

        let output = schema.port_field("out").unwrap();
        assert!(!output.is_input());
        assert!(output.allow_multiple);
        assert_eq!(output.display_name, "Out");
    }

    #[test]
    fn test_input_and_output_tag_is_rejected() {
        let err = NodeSchema::builder("Broken", NodeCategory::Custom)
            .field(
                FieldDecl::new("value", FieldType::Int)
                    .with(FieldAttribute::input("In"))
                    .with(FieldAttribute::output("Out")),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::ConflictingPortTags { .. }));
    }

    #[test]
    fn test_bad_default_is_rejected() {
        let err = NodeSchema::builder("Broken", NodeCategory::Custom)
            .field(FieldDecl::new("count", FieldType::Int).with_default("three"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DefaultTypeMismatch { .. }));
    }

    #[test]
    fn test_duplicate_field_is_rejected() {
        let err = NodeSchema::builder("Broken", NodeCategory::Custom)
            .field(FieldDecl::new("a", FieldType::Int))
            .field(FieldDecl::new("a", FieldType::Float))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField { .. }));
    }

    #[test]
    fn test_behavior_requires_port() {
        let err = NodeSchema::builder("Broken", NodeCategory::Custom)
            .field(FieldDecl::new("a", FieldType::Int).with_behavior(PortBehavior::new(|_| Vec::new())))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::BehaviorWithoutPort { .. }));
    }

    #[test]
    fn test_static_port_descriptor() {
        let schema = NodeSchema::builder("Step", NodeCategory::Step)
            .field(
                FieldDecl::new("nodeDes", FieldType::String)
                    .with_default("")
                    .with(FieldAttribute::output("Comment"))
                    .with(FieldAttribute::Tooltip("free text".into()))
                    .with(FieldAttribute::ShowAsDrawer),
            )
            .build()
            .unwrap();
        let port = schema.port_field("nodeDes").unwrap().static_port();
        assert_eq!(port.id, None);
        assert_eq!(port.display_type, Some(FieldType::String));
        assert_eq!(port.tooltip.as_deref(), Some("free text"));
        assert!(port.show_input_drawer);
    }
}
