//! Small comb-based reverb.
//!
//! Three parallel feedback combs with damping in the loop. Not a studio
//! algorithm; enough to give the chain a real time-smearing stage.

use crate::dsp::{
    context::ProcessContext,
    parameter::{ParameterDefinition, ParameterDisplay},
    registry::UnitSpec,
    unit::{UnitKind, UnitProcessor},
};

/// Comb delay times in seconds, mutually prime-ish to avoid flutter.
const COMB_TIMES: [f32; 3] = [0.0297, 0.0371, 0.0411];

pub const PARAMETERS: &[ParameterDefinition] = &[
    ParameterDefinition {
        name: "size",
        label: "Size",
        min: 0.0,
        max: 1.0,
        default: 0.5,
        display: ParameterDisplay::Linear { unit: "%" },
    },
    ParameterDefinition {
        name: "damp",
        label: "Damp",
        min: 0.0,
        max: 1.0,
        default: 0.5,
        display: ParameterDisplay::Linear { unit: "%" },
    },
    ParameterDefinition {
        name: "mix",
        label: "Mix",
        min: 0.0,
        max: 1.0,
        default: 0.3,
        display: ParameterDisplay::Linear { unit: "%" },
    },
];

const PARAM_SIZE: usize = 0;
const PARAM_DAMP: usize = 1;
const PARAM_MIX: usize = 2;

struct Comb {
    line: Vec<f32>,
    pos: usize,
    damp_state: f32,
}

impl Comb {
    fn sized(seconds: f32, sample_rate: f32) -> Self {
        Self {
            line: vec![0.0; ((seconds * sample_rate) as usize).max(1)],
            pos: 0,
            damp_state: 0.0,
        }
    }

    #[inline]
    fn tick(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let out = self.line[self.pos];
        self.damp_state = out * (1.0 - damp) + self.damp_state * damp;
        self.line[self.pos] = input + self.damp_state * feedback;
        self.pos = (self.pos + 1) % self.line.len();
        out
    }

    fn reset(&mut self) {
        self.line.fill(0.0);
        self.pos = 0;
        self.damp_state = 0.0;
    }
}

pub struct Reverb {
    combs: Vec<Comb>,
}

impl Reverb {
    pub fn new() -> Self {
        Self { combs: Vec::new() }
    }

    pub fn spec() -> UnitSpec {
        UnitSpec {
            kind: UnitKind::Reverb,
            parameters: PARAMETERS,
            factory: || Box::new(Reverb::new()),
        }
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitProcessor for Reverb {
    fn kind(&self) -> UnitKind {
        UnitKind::Reverb
    }

    fn prepare(&mut self, sample_rate: f32, _max_block_size: usize) {
        self.combs = COMB_TIMES
            .iter()
            .map(|&t| Comb::sized(t, sample_rate))
            .collect();
    }

    fn process(&mut self, buffer: &mut [f32], params: &[f32], _context: &ProcessContext) {
        if self.combs.is_empty() {
            return;
        }

        // Size maps to comb feedback 0.6-0.97.
        let feedback = 0.6 + params[PARAM_SIZE] * 0.37;
        let damp = params[PARAM_DAMP] * 0.8;
        let mix = params[PARAM_MIX];
        let scale = 1.0 / self.combs.len() as f32;

        for sample in buffer.iter_mut() {
            let dry = *sample;
            let mut wet = 0.0;
            for comb in self.combs.iter_mut() {
                wet += comb.tick(dry, feedback, damp);
            }
            *sample = dry * (1.0 - mix) + wet * scale * mix;
        }
    }

    fn reset(&mut self) {
        for comb in self.combs.iter_mut() {
            comb.reset();
        }
    }
}
