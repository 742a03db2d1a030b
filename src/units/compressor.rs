//! Feed-forward dynamics compressor.
//!
//! Envelope follower with separate attack/release, hard-knee gain computer.

use crate::dsp::{
    context::ProcessContext,
    parameter::{ParameterDefinition, ParameterDisplay},
    registry::UnitSpec,
    unit::{UnitKind, UnitProcessor},
};

pub const PARAMETERS: &[ParameterDefinition] = &[
    ParameterDefinition {
        name: "threshold",
        label: "Threshold",
        min: -60.0,
        max: 0.0,
        default: -18.0,
        display: ParameterDisplay::Linear { unit: "dB" },
    },
    ParameterDefinition {
        name: "ratio",
        label: "Ratio",
        min: 1.0,
        max: 20.0,
        default: 4.0,
        display: ParameterDisplay::Linear { unit: ":1" },
    },
    ParameterDefinition {
        name: "attack",
        label: "Attack",
        min: 1.0,
        max: 100.0,
        default: 10.0,
        display: ParameterDisplay::Linear { unit: "ms" },
    },
    ParameterDefinition {
        name: "release",
        label: "Release",
        min: 10.0,
        max: 1000.0,
        default: 120.0,
        display: ParameterDisplay::Linear { unit: "ms" },
    },
];

const PARAM_THRESHOLD: usize = 0;
const PARAM_RATIO: usize = 1;
const PARAM_ATTACK: usize = 2;
const PARAM_RELEASE: usize = 3;

pub struct Compressor {
    sample_rate: f32,
    envelope: f32,
}

impl Compressor {
    pub fn new() -> Self {
        Self {
            sample_rate: 44100.0,
            envelope: 0.0,
        }
    }

    pub fn spec() -> UnitSpec {
        UnitSpec {
            kind: UnitKind::Compressor,
            parameters: PARAMETERS,
            factory: || Box::new(Compressor::new()),
        }
    }

    #[inline]
    fn time_coefficient(&self, milliseconds: f32) -> f32 {
        (-1.0 / (milliseconds * 0.001 * self.sample_rate)).exp()
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitProcessor for Compressor {
    fn kind(&self) -> UnitKind {
        UnitKind::Compressor
    }

    fn prepare(&mut self, sample_rate: f32, _max_block_size: usize) {
        self.sample_rate = sample_rate;
        self.envelope = 0.0;
    }

    fn process(&mut self, buffer: &mut [f32], params: &[f32], _context: &ProcessContext) {
        let threshold = 10.0_f32.powf(params[PARAM_THRESHOLD] / 20.0);
        let ratio = params[PARAM_RATIO];
        let attack = self.time_coefficient(params[PARAM_ATTACK]);
        let release = self.time_coefficient(params[PARAM_RELEASE]);

        for sample in buffer.iter_mut() {
            let rectified = sample.abs();
            let coeff = if rectified > self.envelope {
                attack
            } else {
                release
            };
            self.envelope = rectified + coeff * (self.envelope - rectified);

            let gain = if self.envelope > threshold {
                // Reduce the overshoot above threshold by the ratio.
                let over = self.envelope / threshold;
                over.powf(1.0 / ratio - 1.0)
            } else {
                1.0
            };
            *sample *= gain;
        }
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn test_quiet_signal_untouched() {
        let mut unit = Compressor::new();
        unit.prepare(44100.0, 256);
        let ctx = ProcessContext::new(44100.0, 256);

        // -40 dB signal, -18 dB threshold
        let mut buffer = [0.01; 256];
        unit.process(&mut buffer, &[-18.0, 4.0, 10.0, 120.0], &ctx);
        assert!((peak(&buffer) - 0.01).abs() < 0.001);
    }

    #[test]
    fn test_loud_signal_reduced() {
        let mut unit = Compressor::new();
        unit.prepare(44100.0, 4096);
        let ctx = ProcessContext::new(44100.0, 4096);

        let mut buffer = [0.9; 4096];
        unit.process(&mut buffer, &[-18.0, 8.0, 1.0, 120.0], &ctx);

        // Once the envelope settles, output is well below input
        assert!(buffer[4000].abs() < 0.5, "settled {}", buffer[4000]);
    }

    #[test]
    fn test_unity_ratio_is_transparent() {
        let mut unit = Compressor::new();
        unit.prepare(44100.0, 1024);
        let ctx = ProcessContext::new(44100.0, 1024);

        let mut buffer = [0.9; 1024];
        unit.process(&mut buffer, &[-18.0, 1.0, 1.0, 120.0], &ctx);
        assert!((buffer[1000] - 0.9).abs() < 0.01);
    }

    #[test]
    fn test_reset_clears_envelope() {
        let mut unit = Compressor::new();
        unit.prepare(44100.0, 256);
        let ctx = ProcessContext::new(44100.0, 256);

        let mut buffer = [0.9; 256];
        unit.process(&mut buffer, &[-18.0, 4.0, 1.0, 120.0], &ctx);
        assert!(unit.envelope > 0.0);

        unit.reset();
        assert_eq!(unit.envelope, 0.0);
    }
}
