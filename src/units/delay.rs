//! Feedback delay line.

use crate::dsp::{
    context::ProcessContext,
    parameter::{ParameterDefinition, ParameterDisplay},
    registry::UnitSpec,
    unit::{UnitKind, UnitProcessor},
};

/// Longest supported delay time in seconds; the line is sized for this at
/// prepare time so process never allocates.
const MAX_DELAY_SECONDS: f32 = 2.0;

pub const PARAMETERS: &[ParameterDefinition] = &[
    ParameterDefinition {
        name: "time",
        label: "Time",
        min: 0.01,
        max: MAX_DELAY_SECONDS,
        default: 0.35,
        display: ParameterDisplay::Linear { unit: "s" },
    },
    ParameterDefinition {
        name: "feedback",
        label: "Feedback",
        min: 0.0,
        max: 0.95,
        default: 0.4,
        display: ParameterDisplay::Linear { unit: "%" },
    },
    ParameterDefinition {
        name: "mix",
        label: "Mix",
        min: 0.0,
        max: 1.0,
        default: 0.35,
        display: ParameterDisplay::Linear { unit: "%" },
    },
];

const PARAM_TIME: usize = 0;
const PARAM_FEEDBACK: usize = 1;
const PARAM_MIX: usize = 2;

pub struct Delay {
    line: Vec<f32>,
    write_pos: usize,
    sample_rate: f32,
}

impl Delay {
    pub fn new() -> Self {
        Self {
            line: Vec::new(),
            write_pos: 0,
            sample_rate: 44100.0,
        }
    }

    pub fn spec() -> UnitSpec {
        UnitSpec {
            kind: UnitKind::Delay,
            parameters: PARAMETERS,
            factory: || Box::new(Delay::new()),
        }
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitProcessor for Delay {
    fn kind(&self) -> UnitKind {
        UnitKind::Delay
    }

    fn prepare(&mut self, sample_rate: f32, _max_block_size: usize) {
        self.sample_rate = sample_rate;
        let len = (MAX_DELAY_SECONDS * sample_rate).ceil() as usize + 1;
        self.line = vec![0.0; len];
        self.write_pos = 0;
    }

    fn process(&mut self, buffer: &mut [f32], params: &[f32], _context: &ProcessContext) {
        if self.line.is_empty() {
            return;
        }

        let delay_samples =
            ((params[PARAM_TIME] * self.sample_rate) as usize).clamp(1, self.line.len() - 1);
        let feedback = params[PARAM_FEEDBACK];
        let mix = params[PARAM_MIX];
        let len = self.line.len();

        for sample in buffer.iter_mut() {
            let read_pos = (self.write_pos + len - delay_samples) % len;
            let delayed = self.line[read_pos];

            self.line[self.write_pos] = *sample + delayed * feedback;
            self.write_pos = (self.write_pos + 1) % len;

            *sample = *sample * (1.0 - mix) + delayed * mix;
        }
    }

    fn reset(&mut self) {
        self.line.fill(0.0);
        self.write_pos = 0;
    }
}
