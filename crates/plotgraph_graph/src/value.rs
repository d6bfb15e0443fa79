// SPDX-License-Identifier: MIT OR Apache-2.0
//! Field types, field values and the coercion table used for value transfer.
//!
//! Every node field has a declared [`FieldType`]. Ports carry a display type
//! (usually the field type) that decides whether two ports may be connected,
//! and edges move [`FieldValue`]s between fields through a [`Coercion`]
//! looked up in the [`CoercionTable`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Declared type of a node field (and display type of a port)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Boolean value
    Bool,
    /// Signed integer
    Int,
    /// Floating point value
    Float,
    /// Text
    String,
    /// Named enumeration, stored as its integer ordinal
    Enum(String),
    /// Homogeneous collection
    List(Box<FieldType>),
    /// Data-less link type, only used to type connections
    Marker(String),
    /// Accepts anything
    Any,
}

/// Coarse classification of a [`FieldType`], used as the coercion table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    /// [`FieldType::Bool`]
    Bool,
    /// [`FieldType::Int`]
    Int,
    /// [`FieldType::Float`]
    Float,
    /// [`FieldType::String`]
    String,
    /// [`FieldType::Enum`]
    Enum,
    /// [`FieldType::List`]
    List,
    /// [`FieldType::Marker`]
    Marker,
    /// [`FieldType::Any`]
    Any,
}

impl FieldType {
    /// Shorthand for a named enum type
    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::Enum(name.into())
    }

    /// Shorthand for a named marker type
    pub fn marker(name: impl Into<String>) -> Self {
        Self::Marker(name.into())
    }

    /// Shorthand for a list type
    pub fn list(element: FieldType) -> Self {
        Self::List(Box::new(element))
    }

    /// Coarse class of this type
    pub fn class(&self) -> TypeClass {
        match self {
            Self::Bool => TypeClass::Bool,
            Self::Int => TypeClass::Int,
            Self::Float => TypeClass::Float,
            Self::String => TypeClass::String,
            Self::Enum(_) => TypeClass::Enum,
            Self::List(_) => TypeClass::List,
            Self::Marker(_) => TypeClass::Marker,
            Self::Any => TypeClass::Any,
        }
    }

    /// Whether a value of type `other` can be stored in a field of this type as is
    pub fn is_assignable_from(&self, other: &FieldType) -> bool {
        match (self, other) {
            (Self::Any, _) => true,
            (Self::List(a), Self::List(b)) => a.is_assignable_from(b),
            (a, b) => a == b,
        }
    }

    /// Reference-like types reset to null (or empty) rather than to a fresh value
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::String | Self::List(_) | Self::Marker(_) | Self::Any)
    }

    /// Type-appropriate default: empty collection, null for references,
    /// a fresh default value otherwise
    pub fn default_value(&self) -> FieldValue {
        match self {
            Self::Bool => FieldValue::Bool(false),
            Self::Int | Self::Enum(_) => FieldValue::Int(0),
            Self::Float => FieldValue::Float(0.0),
            Self::List(_) => FieldValue::List(Vec::new()),
            Self::String | Self::Marker(_) | Self::Any => FieldValue::Null,
        }
    }

    /// Whether `value` is a valid value for this type without conversion
    pub fn accepts(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (t, FieldValue::Null) => t.is_reference(),
            (Self::Bool, FieldValue::Bool(_)) => true,
            (Self::Int | Self::Enum(_), FieldValue::Int(_)) => true,
            (Self::Float, FieldValue::Float(_)) => true,
            (Self::String, FieldValue::String(_)) => true,
            (Self::List(element), FieldValue::List(items)) => items.iter().all(|v| element.accepts(v)),
            _ => false,
        }
    }

    /// Bring a loaded or user-supplied value to this type.
    ///
    /// Integer values are widened to floats and floats with no fractional part
    /// are narrowed to integers (text formats do not always keep the
    /// distinction). Returns `None` when the value cannot represent this type.
    pub fn normalize(&self, value: FieldValue) -> Option<FieldValue> {
        if self.accepts(&value) {
            return Some(value);
        }
        match (self, value) {
            (Self::Float, FieldValue::Int(i)) => Some(FieldValue::Float(i as f64)),
            (Self::Int | Self::Enum(_), FieldValue::Float(f)) if f.fract() == 0.0 => {
                Some(FieldValue::Int(f as i64))
            }
            (Self::List(element), FieldValue::List(items)) => items
                .into_iter()
                .map(|v| element.normalize(v))
                .collect::<Option<Vec<_>>>()
                .map(FieldValue::List),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::String => f.write_str("string"),
            Self::Enum(name) | Self::Marker(name) => f.write_str(name),
            Self::List(element) => write!(f, "list<{element}>"),
            Self::Any => f.write_str("any"),
        }
    }
}

/// Value stored in a node field
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// No value (reference-typed fields)
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer, also used for enum ordinals
    Int(i64),
    /// Floating point
    Float(f64),
    /// Text
    String(String),
    /// Collection
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Whether this is [`FieldValue::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer payload, if any
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// String payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Script-facing text form; null renders as the empty string
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// Explicit conversion between two type classes
pub type Conversion = fn(&FieldValue) -> Option<FieldValue>;

/// How a value moves from a source field type to a destination field type
#[derive(Debug, Clone)]
pub enum Coercion {
    /// Destination is assignable from the source
    Identity,
    /// Source is assignable from the destination; checked at transfer time
    Narrowing(FieldType),
    /// Registered conversion function
    Convert(Conversion),
}

impl Coercion {
    /// Convert a source value; `None` when the value does not fit
    pub fn apply(&self, value: &FieldValue) -> Option<FieldValue> {
        match self {
            Self::Identity => Some(value.clone()),
            Self::Narrowing(target) => target.accepts(value).then(|| value.clone()),
            Self::Convert(convert) => convert(value),
        }
    }
}

/// Table of (source class, destination class) conversions
#[derive(Debug, Clone, Default)]
pub struct CoercionTable {
    conversions: HashMap<(TypeClass, TypeClass), Conversion>,
}

impl CoercionTable {
    /// Create a table with no registered conversions (assignability only)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create the standard table: numeric widening/narrowing and enum ordinals
    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.register(TypeClass::Int, TypeClass::Float, |v| match v {
            FieldValue::Int(i) => Some(FieldValue::Float(*i as f64)),
            _ => None,
        });
        table.register(TypeClass::Float, TypeClass::Int, |v| match v {
            FieldValue::Float(f) => Some(FieldValue::Int(f.trunc() as i64)),
            _ => None,
        });
        table.register(TypeClass::Enum, TypeClass::Int, |v| match v {
            FieldValue::Int(i) => Some(FieldValue::Int(*i)),
            _ => None,
        });
        table.register(TypeClass::Int, TypeClass::Enum, |v| match v {
            FieldValue::Int(i) => Some(FieldValue::Int(*i)),
            _ => None,
        });
        table
    }

    /// Register (or replace) a conversion
    pub fn register(&mut self, from: TypeClass, to: TypeClass, conversion: Conversion) {
        self.conversions.insert((from, to), conversion);
    }

    /// Find how to move a value of type `from` into a field of type `to`
    pub fn find(&self, from: &FieldType, to: &FieldType) -> Option<Coercion> {
        if to.is_assignable_from(from) {
            return Some(Coercion::Identity);
        }
        if from.is_assignable_from(to) {
            return Some(Coercion::Narrowing(to.clone()));
        }
        self.conversions
            .get(&(from.class(), to.class()))
            .map(|convert| Coercion::Convert(*convert))
    }

    /// Two port types are connectable when either direction has a coercion.
    ///
    /// Evaluated pairwise; never chained through intermediate types.
    pub fn is_connectable(&self, a: &FieldType, b: &FieldType) -> bool {
        self.find(b, a).is_some() || self.find(a, b).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignability() {
        assert!(FieldType::Any.is_assignable_from(&FieldType::Int));
        assert!(!FieldType::Int.is_assignable_from(&FieldType::Any));
        assert!(FieldType::marker("A").is_assignable_from(&FieldType::marker("A")));
        assert!(!FieldType::marker("A").is_assignable_from(&FieldType::marker("B")));
        assert!(FieldType::list(FieldType::Any).is_assignable_from(&FieldType::list(FieldType::Int)));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(FieldType::list(FieldType::Int).default_value(), FieldValue::List(vec![]));
        assert_eq!(FieldType::String.default_value(), FieldValue::Null);
        assert_eq!(FieldType::marker("PlotNodeData").default_value(), FieldValue::Null);
        assert_eq!(FieldType::Float.default_value(), FieldValue::Float(0.0));
        assert_eq!(FieldType::enumeration("Kind").default_value(), FieldValue::Int(0));
    }

    #[test]
    fn test_connectable_is_bidirectional() {
        let table = CoercionTable::standard();
        assert!(table.is_connectable(&FieldType::Any, &FieldType::String));
        assert!(table.is_connectable(&FieldType::String, &FieldType::Any));
        assert!(table.is_connectable(&FieldType::Int, &FieldType::Float));
        assert!(table.is_connectable(&FieldType::enumeration("Kind"), &FieldType::Int));
        assert!(!table.is_connectable(&FieldType::String, &FieldType::Int));
        assert!(!table.is_connectable(&FieldType::marker("A"), &FieldType::marker("B")));
        // Enum -> Int -> Float is two hops and stays disconnected
        assert!(!table.is_connectable(&FieldType::enumeration("Kind"), &FieldType::Float));
    }

    #[test]
    fn test_coercions() {
        let table = CoercionTable::standard();
        let widen = table.find(&FieldType::Int, &FieldType::Float).unwrap();
        assert_eq!(widen.apply(&FieldValue::Int(3)), Some(FieldValue::Float(3.0)));

        let narrow = table.find(&FieldType::Any, &FieldType::String).unwrap();
        assert_eq!(narrow.apply(&"a".into()), Some(FieldValue::from("a")));
        assert_eq!(narrow.apply(&FieldValue::Int(1)), None);

        let truncate = table.find(&FieldType::Float, &FieldType::Int).unwrap();
        assert_eq!(truncate.apply(&FieldValue::Float(2.9)), Some(FieldValue::Int(2)));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(FieldType::Float.normalize(FieldValue::Int(2)), Some(FieldValue::Float(2.0)));
        assert_eq!(
            FieldType::enumeration("Kind").normalize(FieldValue::Float(3.0)),
            Some(FieldValue::Int(3))
        );
        assert_eq!(FieldType::Int.normalize(FieldValue::from("x")), None);
    }

    #[test]
    fn test_untagged_json() {
        let values = vec![
            FieldValue::Null,
            FieldValue::Int(1),
            FieldValue::Float(1.5),
            FieldValue::from("x"),
            FieldValue::Bool(true),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,1,1.5,"x",true]"#);
        let back: Vec<FieldValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldValue::Null.to_string(), "");
        assert_eq!(FieldValue::from("7").to_string(), "7");
        assert_eq!(FieldValue::List(vec![FieldValue::Int(1), FieldValue::Int(2)]).to_string(), "1,2");
    }
}
