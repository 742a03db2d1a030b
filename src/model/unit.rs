//! A single unit as held by a model.

use crate::dsp::{ParameterDefinition, UnitKind, UnitRegistry};

use super::{ModelError, UnitId};

/// A live-valued parameter on a model unit.
///
/// The value here is the single source of truth; the running pipeline's copy
/// is a derived mirror updated through the parameter bridge.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    name: &'static str,
    value: f32,
    min: f32,
    max: f32,
}

impl Parameter {
    /// Creates a parameter at its default value.
    pub fn from_definition(def: &ParameterDefinition) -> Self {
        Self {
            name: def.name,
            value: def.default,
            min: def.min,
            max: def.max,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    /// Sets the value, silently clamping into range, and returns the value
    /// actually applied. Clamping is intentional, not an error.
    pub fn set(&mut self, value: f32) -> f32 {
        self.value = value.clamp(self.min, self.max);
        self.value
    }
}

/// One processing stage as described by the model.
///
/// Identity (`id`) is stable across reorders; the model owns this
/// exclusively, and the engine keeps only a weak id-to-stage mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelUnit {
    pub id: UnitId,
    pub kind: UnitKind,
    pub enabled: bool,
    params: Vec<Parameter>,
}

impl ModelUnit {
    /// Creates a unit with the registry's deterministic defaults.
    pub fn from_registry(
        id: UnitId,
        kind: UnitKind,
        registry: &UnitRegistry,
    ) -> Result<Self, ModelError> {
        let spec = registry.spec(kind)?;
        Ok(Self {
            id,
            kind,
            enabled: true,
            params: spec.parameters.iter().map(Parameter::from_definition).collect(),
        })
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name() == name)
    }

    /// Sets a parameter by name, clamping into range.
    pub fn set_parameter(&mut self, name: &str, value: f32) -> Result<f32, ModelError> {
        let id = self.id;
        self.params
            .iter_mut()
            .find(|p| p.name() == name)
            .map(|p| p.set(value))
            .ok_or_else(|| ModelError::UnknownParameter {
                unit: id,
                name: name.to_string(),
            })
    }

    /// Current parameter values in process-index order.
    pub fn values(&self) -> Vec<f32> {
        self.params.iter().map(|p| p.value()).collect()
    }
}
