//! Saturating distortion with tone shaping.
//!
//! tanh drive into a one-pole tone filter, with a post level control.

use crate::dsp::{
    context::ProcessContext,
    parameter::{ParameterDefinition, ParameterDisplay},
    registry::UnitSpec,
    unit::{UnitKind, UnitProcessor},
};

pub const PARAMETERS: &[ParameterDefinition] = &[
    ParameterDefinition {
        name: "drive",
        label: "Drive",
        min: 0.0,
        max: 1.0,
        default: 0.2,
        display: ParameterDisplay::Linear { unit: "%" },
    },
    ParameterDefinition {
        name: "tone",
        label: "Tone",
        min: 0.0,
        max: 1.0,
        default: 0.5,
        display: ParameterDisplay::Linear { unit: "%" },
    },
    ParameterDefinition {
        name: "level",
        label: "Level",
        min: 0.0,
        max: 1.0,
        default: 1.0,
        display: ParameterDisplay::Linear { unit: "%" },
    },
];

const PARAM_DRIVE: usize = 0;
const PARAM_TONE: usize = 1;
const PARAM_LEVEL: usize = 2;

pub struct Distortion {
    sample_rate: f32,
    /// Tone filter state.
    z1: f32,
}

impl Distortion {
    pub fn new() -> Self {
        Self {
            sample_rate: 44100.0,
            z1: 0.0,
        }
    }

    pub fn spec() -> UnitSpec {
        UnitSpec {
            kind: UnitKind::Distortion,
            parameters: PARAMETERS,
            factory: || Box::new(Distortion::new()),
        }
    }

    /// Drive multiplies the signal 1x-11x before saturation.
    #[inline]
    fn saturate(x: f32, drive: f32) -> f32 {
        (x * (1.0 + drive * 10.0)).tanh()
    }

    /// Tone 0 = dark (200 Hz), tone 1 = bright (20 kHz).
    #[inline]
    fn tone_coefficient(&self, tone: f32) -> f32 {
        let freq = 200.0 * (20000.0_f32 / 200.0).powf(tone);
        let omega = 2.0 * std::f32::consts::PI * freq / self.sample_rate;
        (-omega).exp()
    }
}

impl Default for Distortion {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitProcessor for Distortion {
    fn kind(&self) -> UnitKind {
        UnitKind::Distortion
    }

    fn prepare(&mut self, sample_rate: f32, _max_block_size: usize) {
        self.sample_rate = sample_rate;
        self.z1 = 0.0;
    }

    fn process(&mut self, buffer: &mut [f32], params: &[f32], _context: &ProcessContext) {
        let drive = params[PARAM_DRIVE];
        let a = self.tone_coefficient(params[PARAM_TONE]);
        let level = params[PARAM_LEVEL];

        for sample in buffer.iter_mut() {
            let saturated = Self::saturate(*sample, drive);
            self.z1 = saturated * (1.0 - a) + self.z1 * a;
            *sample = self.z1 * level;
        }
    }

    fn reset(&mut self) {
        self.z1 = 0.0;
    }
}
