// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of available node kinds.

use crate::node::{Node, NodeId, Rect};
use crate::port::PortDirection;
use crate::schema::{NodeCategory, NodeSchema, SchemaError};
use crate::value::{CoercionTable, FieldType};
use indexmap::IndexMap;
use std::sync::Arc;

/// A creation menu entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    /// Menu path, `/`-separated
    pub path: String,
    /// Node kind created by the entry
    pub kind: String,
}

/// A field of some registered kind that could take one end of a dragged edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    /// Node kind
    pub kind: String,
    /// Field name
    pub field: String,
    /// Port display name
    pub display_name: String,
}

/// Registry of node schemas plus the coercion table used for connectivity
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    schemas: IndexMap<String, Arc<NodeSchema>>,
    coercions: CoercionTable,
}

impl NodeRegistry {
    /// Create an empty registry using the standard coercion table
    pub fn new() -> Self {
        Self::with_coercions(CoercionTable::standard())
    }

    /// Create an empty registry with a custom coercion table
    pub fn with_coercions(coercions: CoercionTable) -> Self {
        Self {
            schemas: IndexMap::new(),
            coercions,
        }
    }

    /// Register a node kind
    pub fn register(&mut self, schema: NodeSchema) -> Result<(), SchemaError> {
        if self.schemas.contains_key(&schema.kind) {
            return Err(SchemaError::DuplicateKind(schema.kind));
        }
        self.schemas.insert(schema.kind.clone(), Arc::new(schema));
        Ok(())
    }

    /// Get a schema by kind
    pub fn get(&self, kind: &str) -> Option<&Arc<NodeSchema>> {
        self.schemas.get(kind)
    }

    /// Whether a kind is registered
    pub fn contains(&self, kind: &str) -> bool {
        self.schemas.contains_key(kind)
    }

    /// All registered kinds, in registration order
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Schemas of one category
    pub fn by_category(&self, category: NodeCategory) -> impl Iterator<Item = &Arc<NodeSchema>> {
        self.schemas.values().filter(move |s| s.category == category)
    }

    /// Kinds that declare a menu path, sorted by path
    pub fn menu_entries(&self) -> Vec<MenuEntry> {
        let mut entries: Vec<MenuEntry> = self
            .schemas
            .values()
            .filter_map(|s| {
                s.menu_path.as_ref().map(|path| MenuEntry {
                    path: path.clone(),
                    kind: s.kind.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    /// Coercion table shared by every graph using this registry
    pub fn coercions(&self) -> &CoercionTable {
        &self.coercions
    }

    /// Port connectivity rule: assignable either way or convertible
    pub fn is_connectable(&self, a: &FieldType, b: &FieldType) -> bool {
        self.coercions.is_connectable(a, b)
    }

    /// Instantiate an unbound node of `kind` with its declared defaults.
    ///
    /// The id is left empty; the graph assigns one when the node is added.
    pub fn create_node(&self, kind: &str, position: Rect) -> Option<Node> {
        let schema = self.get(kind)?;
        let mut node = Node::new(NodeId::default(), kind, position);
        node.bind_schema(schema.clone());
        Some(node)
    }

    /// Fields of registered kinds whose static port could connect to a port
    /// of type `ty` sitting on the `direction` side of the dragged edge
    pub fn compatible_ports(&self, ty: &FieldType, direction: PortDirection) -> Vec<PortCandidate> {
        let wanted = direction.opposite();
        self.schemas
            .values()
            .flat_map(|schema| {
                schema
                    .port_fields()
                    .filter(move |f| f.direction == wanted && f.behavior.is_none())
                    .map(move |f| (schema, f))
            })
            .filter(|(_, f)| self.is_connectable(&f.ty, ty))
            .map(|(schema, f)| PortCandidate {
                kind: schema.kind.clone(),
                field: f.field_name.clone(),
                display_name: f.display_name.clone(),
            })
            .collect()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldAttribute, FieldDecl};
    use crate::value::FieldValue;

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry
            .register(
                NodeSchema::builder("Source", NodeCategory::Custom)
                    .menu_path("Math/Source")
                    .field(FieldDecl::new("out", FieldType::Int).with(FieldAttribute::output("Out")))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                NodeSchema::builder("Sink", NodeCategory::Custom)
                    .menu_path("Debug/Sink")
                    .field(
                        FieldDecl::new("in", FieldType::Float)
                            .with_default(1.5)
                            .with(FieldAttribute::input("In")),
                    )
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_duplicate_kind() {
        let mut registry = registry();
        let schema = NodeSchema::builder("Sink", NodeCategory::Custom).build().unwrap();
        assert_eq!(
            registry.register(schema),
            Err(SchemaError::DuplicateKind("Sink".to_string()))
        );
    }

    #[test]
    fn test_menu_entries_sorted() {
        let paths: Vec<_> = registry().menu_entries().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["Debug/Sink", "Math/Source"]);
    }

    #[test]
    fn test_create_node_uses_defaults() {
        let node = registry().create_node("Sink", Rect::default()).unwrap();
        assert_eq!(node.kind, "Sink");
        assert_eq!(node.field("in"), Some(&FieldValue::Float(1.5)));
        assert!(registry().create_node("Missing", Rect::default()).is_none());
    }

    #[test]
    fn test_compatible_ports() {
        let registry = registry();
        let found = registry.compatible_ports(&FieldType::Int, PortDirection::Output);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, "Sink");

        let found = registry.compatible_ports(&FieldType::String, PortDirection::Output);
        assert!(found.is_empty());
    }
}
