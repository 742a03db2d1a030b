//! Master output stage at the tail of the chain.

use crate::dsp::{
    context::ProcessContext,
    parameter::{ParameterDefinition, ParameterDisplay},
    registry::UnitSpec,
    unit::{UnitKind, UnitProcessor},
};

pub const PARAMETERS: &[ParameterDefinition] = &[ParameterDefinition {
    name: "level",
    label: "Level",
    min: 0.0,
    max: 1.0,
    default: 1.0,
    display: ParameterDisplay::Linear { unit: "%" },
}];

const PARAM_LEVEL: usize = 0;

pub struct OutputStage;

impl OutputStage {
    pub fn spec() -> UnitSpec {
        UnitSpec {
            kind: UnitKind::Output,
            parameters: PARAMETERS,
            factory: || Box::new(OutputStage),
        }
    }
}

impl UnitProcessor for OutputStage {
    fn kind(&self) -> UnitKind {
        UnitKind::Output
    }

    fn prepare(&mut self, _sample_rate: f32, _max_block_size: usize) {}

    fn process(&mut self, buffer: &mut [f32], params: &[f32], _context: &ProcessContext) {
        let level = params[PARAM_LEVEL];
        for sample in buffer.iter_mut() {
            // Hard ceiling at full scale; the device never sees values
            // beyond +/-1.0.
            *sample = (*sample * level).clamp(-1.0, 1.0);
        }
    }

    fn reset(&mut self) {}
}
