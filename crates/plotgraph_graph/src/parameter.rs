// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exposed parameters: named, typed graph-level variables.

use crate::events::GraphChange;
use crate::graph::{Graph, GraphError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of an exposed parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Boolean
    Bool,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// Text
    String,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// RGBA color
    Color,
}

impl ParameterKind {
    /// Fresh default value of this kind
    pub fn default_value(self) -> ParameterValue {
        match self {
            Self::Bool => ParameterValue::Bool(false),
            Self::Int => ParameterValue::Int(0),
            Self::Long => ParameterValue::Long(0),
            Self::Float => ParameterValue::Float(0.0),
            Self::Double => ParameterValue::Double(0.0),
            Self::String => ParameterValue::String(String::new()),
            Self::Vector2 => ParameterValue::Vector2([0.0; 2]),
            Self::Vector3 => ParameterValue::Vector3([0.0; 3]),
            Self::Vector4 => ParameterValue::Vector4([0.0; 4]),
            Self::Color => ParameterValue::Color([0.0, 0.0, 0.0, 1.0]),
        }
    }
}

/// Value of an exposed parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ParameterValue {
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Text
    String(String),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// RGBA color
    Color([f32; 4]),
}

impl ParameterValue {
    /// Kind of this value
    pub fn kind(&self) -> ParameterKind {
        match self {
            Self::Bool(_) => ParameterKind::Bool,
            Self::Int(_) => ParameterKind::Int,
            Self::Long(_) => ParameterKind::Long,
            Self::Float(_) => ParameterKind::Float,
            Self::Double(_) => ParameterKind::Double,
            Self::String(_) => ParameterKind::String,
            Self::Vector2(_) => ParameterKind::Vector2,
            Self::Vector3(_) => ParameterKind::Vector3,
            Self::Vector4(_) => ParameterKind::Vector4,
            Self::Color(_) => ParameterKind::Color,
        }
    }
}

/// How the host edits a parameter
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ParameterMode {
    /// Plain field
    #[default]
    Default,
    /// Slider between `min` and `max` (int, float)
    Slider {
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },
    /// Range slider between `min` and `max` (2D vector)
    MinMaxSlider {
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },
    /// High dynamic range picker (color)
    Hdr,
}

impl ParameterMode {
    /// Whether the mode applies to parameters of `kind`
    pub fn supports(&self, kind: ParameterKind) -> bool {
        match self {
            Self::Default => true,
            Self::Slider { .. } => matches!(kind, ParameterKind::Int | ParameterKind::Float),
            Self::MinMaxSlider { .. } => kind == ParameterKind::Vector2,
            Self::Hdr => kind == ParameterKind::Color,
        }
    }
}

/// Host-side presentation settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSettings {
    /// Hidden from the parameter list
    #[serde(default)]
    pub is_hidden: bool,
    /// Expanded in the parameter list
    #[serde(default)]
    pub expanded: bool,
    /// Editing mode
    #[serde(default)]
    pub mode: ParameterMode,
}

/// A named, typed graph variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposedParameter {
    /// Stable id
    pub id: String,
    /// Unique display name
    pub name: String,
    /// Whether the parameter feeds the graph (as opposed to being read back)
    #[serde(default = "default_input")]
    pub input: bool,
    /// Current value
    pub value: ParameterValue,
    /// Presentation settings
    #[serde(default)]
    pub settings: ParameterSettings,
}

fn default_input() -> bool {
    true
}

impl ExposedParameter {
    /// Kind of the parameter
    pub fn kind(&self) -> ParameterKind {
        self.value.kind()
    }

    fn check(&self, value: &ParameterValue) -> Result<()> {
        if value.kind() == self.kind() {
            Ok(())
        } else {
            Err(GraphError::ParameterTypeMismatch {
                name: self.name.clone(),
                expected: self.kind(),
                found: value.kind(),
            })
        }
    }
}

impl Graph {
    /// Add an exposed parameter; `value` defaults to the kind's default.
    /// Returns the new parameter's id.
    pub fn add_exposed_parameter(
        &mut self,
        name: impl Into<String>,
        kind: ParameterKind,
        value: Option<ParameterValue>,
    ) -> Result<String> {
        let name = name.into();
        if self.exposed_parameter(&name).is_some() {
            return Err(GraphError::DuplicateParameterName(name));
        }
        let value = value.unwrap_or_else(|| kind.default_value());
        if value.kind() != kind {
            return Err(GraphError::ParameterTypeMismatch {
                name,
                expected: kind,
                found: value.kind(),
            });
        }
        let id = Uuid::new_v4().to_string();
        self.exposed_parameters.push(ExposedParameter {
            id: id.clone(),
            name,
            input: true,
            value,
            settings: ParameterSettings::default(),
        });
        self.emit(GraphChange::ParameterListChanged);
        Ok(id)
    }

    /// Remove a parameter by id
    pub fn remove_exposed_parameter(&mut self, id: &str) -> Option<ExposedParameter> {
        let index = self.exposed_parameters.iter().position(|p| p.id == id)?;
        let removed = self.exposed_parameters.remove(index);
        self.emit(GraphChange::ParameterListChanged);
        Some(removed)
    }

    /// All exposed parameters, in creation order
    pub fn exposed_parameters(&self) -> &[ExposedParameter] {
        &self.exposed_parameters
    }

    /// Look a parameter up by name
    pub fn exposed_parameter(&self, name: &str) -> Option<&ExposedParameter> {
        self.exposed_parameters.iter().find(|p| p.name == name)
    }

    /// Look a parameter up by id
    pub fn exposed_parameter_by_id(&self, id: &str) -> Option<&ExposedParameter> {
        self.exposed_parameters.iter().find(|p| p.id == id)
    }

    fn parameter_index(&self, id: &str) -> Result<usize> {
        self.exposed_parameters
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| GraphError::ParameterNotFound(id.to_string()))
    }

    /// Value of a parameter by name
    pub fn parameter_value(&self, name: &str) -> Option<&ParameterValue> {
        self.exposed_parameter(name).map(|p| &p.value)
    }

    /// Set the value of a parameter by name
    pub fn set_parameter_value(&mut self, name: &str, value: ParameterValue) -> Result<()> {
        let param = self
            .exposed_parameters
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| GraphError::ParameterNotFound(name.to_string()))?;
        param.check(&value)?;
        param.value = value;
        let id = param.id.clone();
        self.emit(GraphChange::ParameterValueChanged(id));
        Ok(())
    }

    /// Replace the value of a parameter by id
    pub fn update_exposed_parameter(&mut self, id: &str, value: ParameterValue) -> Result<()> {
        let index = self.parameter_index(id)?;
        let param = &mut self.exposed_parameters[index];
        param.check(&value)?;
        param.value = value;
        self.emit(GraphChange::ParameterModified(id.to_string()));
        Ok(())
    }

    /// Rename a parameter, keeping names unique
    pub fn rename_exposed_parameter(&mut self, id: &str, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let index = self.parameter_index(id)?;
        if self.exposed_parameters.iter().any(|p| p.name == name && p.id != id) {
            return Err(GraphError::DuplicateParameterName(name));
        }
        self.exposed_parameters[index].name = name;
        self.emit(GraphChange::ParameterModified(id.to_string()));
        Ok(())
    }

    /// Replace the presentation settings of a parameter
    pub fn set_parameter_settings(&mut self, id: &str, settings: ParameterSettings) -> Result<()> {
        let index = self.parameter_index(id)?;
        let param = &mut self.exposed_parameters[index];
        if !settings.mode.supports(param.kind()) {
            return Err(GraphError::UnsupportedParameterMode {
                name: param.name.clone(),
                kind: param.kind(),
            });
        }
        param.settings = settings;
        self.emit(GraphChange::ParameterModified(id.to_string()));
        Ok(())
    }
}
