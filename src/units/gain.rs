//! Clean gain stage.

use crate::dsp::{
    context::ProcessContext,
    parameter::{ParameterDefinition, ParameterDisplay},
    registry::UnitSpec,
    unit::{UnitKind, UnitProcessor},
};

pub const PARAMETERS: &[ParameterDefinition] = &[ParameterDefinition {
    name: "gain",
    label: "Gain",
    min: -24.0,
    max: 24.0,
    default: 0.0,
    display: ParameterDisplay::Linear { unit: "dB" },
}];

const PARAM_GAIN: usize = 0;

pub struct Gain;

impl Gain {
    pub fn spec() -> UnitSpec {
        UnitSpec {
            kind: UnitKind::Gain,
            parameters: PARAMETERS,
            factory: || Box::new(Gain),
        }
    }
}

impl UnitProcessor for Gain {
    fn kind(&self) -> UnitKind {
        UnitKind::Gain
    }

    fn prepare(&mut self, _sample_rate: f32, _max_block_size: usize) {}

    fn process(&mut self, buffer: &mut [f32], params: &[f32], _context: &ProcessContext) {
        let amplitude = 10.0_f32.powf(params[PARAM_GAIN] / 20.0);
        for sample in buffer.iter_mut() {
            *sample *= amplitude;
        }
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unity_at_zero_db() {
        let mut unit = Gain;
        let mut buffer = [0.5, -0.25];
        let ctx = ProcessContext::default();
        unit.process(&mut buffer, &[0.0], &ctx);
        assert_relative_eq!(buffer[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(buffer[1], -0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_six_db_doubles() {
        let mut unit = Gain;
        let mut buffer = [0.25];
        let ctx = ProcessContext::default();
        unit.process(&mut buffer, &[6.0], &ctx);
        assert_relative_eq!(buffer[0], 0.5, epsilon = 0.01);
    }

    #[test]
    fn test_negative_gain_attenuates() {
        let mut unit = Gain;
        let mut buffer = [0.8];
        let ctx = ProcessContext::default();
        unit.process(&mut buffer, &[-12.0], &ctx);
        assert!(buffer[0] < 0.25);
    }
}
