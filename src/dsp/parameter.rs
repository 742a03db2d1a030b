//! Parameter definitions for processing units.
//!
//! Definitions are static metadata: the declared range, default value and
//! display hints for one knob on a unit. The live value lives in the model
//! (`model::Parameter`) and, mirrored, in the running pipeline.

/// How a parameter value should be displayed and interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterDisplay {
    /// Linear scaling with a unit suffix (e.g., "Hz", "ms", "%").
    Linear { unit: &'static str },
    /// Logarithmic scaling, common for frequency and gain controls.
    Logarithmic { unit: &'static str },
    /// On/off toggle switch.
    Toggle,
}

impl ParameterDisplay {
    /// Returns the unit string, if applicable.
    pub fn unit(&self) -> Option<&'static str> {
        match self {
            Self::Linear { unit } | Self::Logarithmic { unit } => Some(unit),
            Self::Toggle => None,
        }
    }

    /// Returns true if this is a logarithmic parameter.
    pub fn is_logarithmic(&self) -> bool {
        matches!(self, Self::Logarithmic { .. })
    }
}

/// Static definition of a parameter on a processing unit.
///
/// The order of definitions in a unit's parameter list fixes the indices
/// used in the `params` slice passed to `UnitProcessor::process` and in
/// parameter-bridge updates.
#[derive(Clone, Copy, Debug)]
pub struct ParameterDefinition {
    /// Unique identifier for this parameter within the unit (e.g. "drive").
    pub name: &'static str,
    /// Human-readable label.
    pub label: &'static str,
    /// Minimum value.
    pub min: f32,
    /// Maximum value.
    pub max: f32,
    /// Default value when the unit is created. Always within `[min, max]`.
    pub default: f32,
    /// Display hint.
    pub display: ParameterDisplay,
}

impl ParameterDefinition {
    /// Clamps a value into this parameter's declared range.
    ///
    /// Out-of-range values are not an error anywhere in the engine; they are
    /// silently clamped. This is intentional.
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    /// Normalizes a value from the parameter's range to 0.0-1.0.
    pub fn normalize(&self, value: f32) -> f32 {
        if (self.max - self.min).abs() < f32::EPSILON {
            0.0
        } else {
            (value - self.min) / (self.max - self.min)
        }
    }

    /// Denormalizes a 0.0-1.0 value to the parameter's range.
    pub fn denormalize(&self, normalized: f32) -> f32 {
        self.min + normalized * (self.max - self.min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PARAM: ParameterDefinition = ParameterDefinition {
        name: "cutoff",
        label: "Cutoff",
        min: 20.0,
        max: 20000.0,
        default: 1000.0,
        display: ParameterDisplay::Logarithmic { unit: "Hz" },
    };

    #[test]
    fn test_clamp() {
        assert_eq!(TEST_PARAM.clamp(-5.0), 20.0);
        assert_eq!(TEST_PARAM.clamp(440.0), 440.0);
        assert_eq!(TEST_PARAM.clamp(99999.0), 20000.0);
    }

    #[test]
    fn test_normalize_denormalize() {
        let normalized = TEST_PARAM.normalize(440.0);
        let denormalized = TEST_PARAM.denormalize(normalized);
        assert!((denormalized - 440.0).abs() < 0.001);

        assert_eq!(TEST_PARAM.normalize(20.0), 0.0);
        assert_eq!(TEST_PARAM.normalize(20000.0), 1.0);
        assert_eq!(TEST_PARAM.denormalize(0.0), 20.0);
        assert_eq!(TEST_PARAM.denormalize(1.0), 20000.0);
    }

    #[test]
    fn test_display_unit() {
        assert_eq!(TEST_PARAM.display.unit(), Some("Hz"));
        assert!(TEST_PARAM.display.is_logarithmic());
        assert_eq!(ParameterDisplay::Toggle.unit(), None);
    }

    #[test]
    fn test_default_within_range() {
        assert!(TEST_PARAM.default >= TEST_PARAM.min);
        assert!(TEST_PARAM.default <= TEST_PARAM.max);
    }
}
