//! Unit registry: maps a unit type to its default parameters and factory.
//!
//! The registry is a pure lookup table. Adding a unit of a known kind to a
//! model always succeeds with a deterministic default parameter vector;
//! an unknown kind is a caller error, never a silent default.

use std::collections::HashMap;

use thiserror::Error;

use super::parameter::ParameterDefinition;
use super::unit::{UnitKind, UnitProcessor};

/// Factory function type for creating live unit instances.
pub type UnitFactory = fn() -> Box<dyn UnitProcessor>;

/// Errors from registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No spec is registered for the requested unit kind.
    #[error("no unit registered for kind '{0}'")]
    UnknownKind(UnitKind),
}

/// Static description of one unit type: its parameter layout and the
/// instantiation descriptor (factory) the engine uses to realize it.
#[derive(Clone, Debug)]
pub struct UnitSpec {
    /// The unit type this spec describes.
    pub kind: UnitKind,
    /// Parameter definitions, in process-index order.
    pub parameters: &'static [ParameterDefinition],
    /// Factory producing a fresh, unprepared live instance.
    pub factory: UnitFactory,
}

/// Central catalog of available unit types.
pub struct UnitRegistry {
    specs: HashMap<UnitKind, UnitSpec>,
}

impl UnitRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            specs: HashMap::new(),
        }
    }

    /// Registers a unit spec.
    ///
    /// # Panics
    ///
    /// Panics if the kind is already registered; duplicate registration is
    /// a programming error, not a runtime condition.
    pub fn register(&mut self, spec: UnitSpec) {
        if self.specs.contains_key(&spec.kind) {
            panic!("unit kind '{}' is already registered", spec.kind);
        }
        self.specs.insert(spec.kind, spec);
    }

    /// Looks up the spec for a unit kind.
    pub fn spec(&self, kind: UnitKind) -> Result<&UnitSpec, RegistryError> {
        self.specs.get(&kind).ok_or(RegistryError::UnknownKind(kind))
    }

    /// Returns the deterministic default parameter values for a kind.
    ///
    /// Every value is within its declared range by construction.
    pub fn default_values(&self, kind: UnitKind) -> Result<Vec<f32>, RegistryError> {
        Ok(self.spec(kind)?.parameters.iter().map(|p| p.default).collect())
    }

    /// Creates a fresh live instance of a unit kind.
    pub fn instantiate(&self, kind: UnitKind) -> Result<Box<dyn UnitProcessor>, RegistryError> {
        Ok((self.spec(kind)?.factory)())
    }

    /// Returns the number of registered unit kinds.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Returns true if no unit kinds are registered.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Checks whether a kind is registered.
    pub fn contains(&self, kind: UnitKind) -> bool {
        self.specs.contains_key(&kind)
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::context::ProcessContext;
    use crate::dsp::parameter::ParameterDisplay;

    struct TestBooster;

    impl UnitProcessor for TestBooster {
        fn kind(&self) -> UnitKind {
            UnitKind::Gain
        }

        fn prepare(&mut self, _sample_rate: f32, _max_block_size: usize) {}

        fn process(&mut self, buffer: &mut [f32], params: &[f32], _context: &ProcessContext) {
            for sample in buffer.iter_mut() {
                *sample *= params[0];
            }
        }

        fn reset(&mut self) {}
    }

    const TEST_PARAMS: &[ParameterDefinition] = &[ParameterDefinition {
        name: "amount",
        label: "Amount",
        min: 0.0,
        max: 2.0,
        default: 1.0,
        display: ParameterDisplay::Linear { unit: "x" },
    }];

    fn test_spec() -> UnitSpec {
        UnitSpec {
            kind: UnitKind::Gain,
            parameters: TEST_PARAMS,
            factory: || Box::new(TestBooster),
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = UnitRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(
            registry.spec(UnitKind::Gain).unwrap_err(),
            RegistryError::UnknownKind(UnitKind::Gain)
        );
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = UnitRegistry::new();
        registry.register(test_spec());

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(UnitKind::Gain));

        let spec = registry.spec(UnitKind::Gain).unwrap();
        assert_eq!(spec.parameters.len(), 1);
        assert_eq!(spec.parameters[0].name, "amount");
    }

    #[test]
    fn test_default_values_within_range() {
        let mut registry = UnitRegistry::new();
        registry.register(test_spec());

        let defaults = registry.default_values(UnitKind::Gain).unwrap();
        assert_eq!(defaults, vec![1.0]);
        for (value, def) in defaults.iter().zip(TEST_PARAMS) {
            assert!(*value >= def.min && *value <= def.max);
        }
    }

    #[test]
    fn test_instantiate_is_functional() {
        let mut registry = UnitRegistry::new();
        registry.register(test_spec());

        let mut unit = registry.instantiate(UnitKind::Gain).unwrap();
        unit.prepare(44100.0, 4);

        let mut buffer = [1.0, 0.5, -0.5, -1.0];
        let ctx = ProcessContext::new(44100.0, 4);
        unit.process(&mut buffer, &[2.0], &ctx);
        assert_eq!(buffer, [2.0, 1.0, -1.0, -2.0]);
    }

    #[test]
    fn test_unknown_kind_is_error() {
        let mut registry = UnitRegistry::new();
        registry.register(test_spec());

        assert!(registry.instantiate(UnitKind::Reverb).is_err());
        assert!(registry.default_values(UnitKind::Reverb).is_err());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_registration_panics() {
        let mut registry = UnitRegistry::new();
        registry.register(test_spec());
        registry.register(test_spec());
    }
}
