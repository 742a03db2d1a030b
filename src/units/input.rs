//! Input source at the head of the chain.
//!
//! The engine does not capture from an input device; the source either
//! produces silence (the host feeds real audio further down, or nothing is
//! playing) or a fixed monitor tone for auditioning the chain.

use crate::dsp::{
    context::ProcessContext,
    parameter::{ParameterDefinition, ParameterDisplay},
    registry::UnitSpec,
    unit::{UnitKind, UnitProcessor},
};

/// Monitor tone frequency in Hz.
const MONITOR_FREQ: f32 = 220.0;

pub const PARAMETERS: &[ParameterDefinition] = &[
    ParameterDefinition {
        name: "monitor",
        label: "Monitor",
        min: 0.0,
        max: 1.0,
        default: 0.0,
        display: ParameterDisplay::Toggle,
    },
    ParameterDefinition {
        name: "level",
        label: "Level",
        min: 0.0,
        max: 1.0,
        default: 0.8,
        display: ParameterDisplay::Linear { unit: "%" },
    },
];

const PARAM_MONITOR: usize = 0;
const PARAM_LEVEL: usize = 1;

/// Signal source unit.
pub struct InputSource {
    phase: f32,
}

impl InputSource {
    pub fn new() -> Self {
        Self { phase: 0.0 }
    }

    pub fn spec() -> UnitSpec {
        UnitSpec {
            kind: UnitKind::Input,
            parameters: PARAMETERS,
            factory: || Box::new(InputSource::new()),
        }
    }
}

impl Default for InputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitProcessor for InputSource {
    fn kind(&self) -> UnitKind {
        UnitKind::Input
    }

    fn prepare(&mut self, _sample_rate: f32, _max_block_size: usize) {
        self.phase = 0.0;
    }

    fn process(&mut self, buffer: &mut [f32], params: &[f32], context: &ProcessContext) {
        if params[PARAM_MONITOR] < 0.5 {
            buffer.fill(0.0);
            return;
        }

        let level = params[PARAM_LEVEL];
        let phase_increment = MONITOR_FREQ / context.sample_rate;
        for sample in buffer.iter_mut() {
            *sample = (self.phase * 2.0 * std::f32::consts::PI).sin() * level;
            self.phase += phase_increment;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}
