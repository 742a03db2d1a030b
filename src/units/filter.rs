//! One-pole lowpass filter.

use crate::dsp::{
    context::ProcessContext,
    parameter::{ParameterDefinition, ParameterDisplay},
    registry::UnitSpec,
    unit::{UnitKind, UnitProcessor},
};

pub const PARAMETERS: &[ParameterDefinition] = &[ParameterDefinition {
    name: "cutoff",
    label: "Cutoff",
    min: 20.0,
    max: 20000.0,
    default: 20000.0,
    display: ParameterDisplay::Logarithmic { unit: "Hz" },
}];

const PARAM_CUTOFF: usize = 0;

/// One-pole lowpass: y[n] = (1-a)*x[n] + a*y[n-1].
pub struct Filter {
    sample_rate: f32,
    z1: f32,
}

impl Filter {
    pub fn new() -> Self {
        Self {
            sample_rate: 44100.0,
            z1: 0.0,
        }
    }

    pub fn spec() -> UnitSpec {
        UnitSpec {
            kind: UnitKind::Filter,
            parameters: PARAMETERS,
            factory: || Box::new(Filter::new()),
        }
    }

    #[inline]
    fn coefficient(&self, cutoff: f32) -> f32 {
        let omega = 2.0 * std::f32::consts::PI * cutoff / self.sample_rate;
        (-omega).exp()
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitProcessor for Filter {
    fn kind(&self) -> UnitKind {
        UnitKind::Filter
    }

    fn prepare(&mut self, sample_rate: f32, _max_block_size: usize) {
        self.sample_rate = sample_rate;
        self.z1 = 0.0;
    }

    fn process(&mut self, buffer: &mut [f32], params: &[f32], _context: &ProcessContext) {
        let a = self.coefficient(params[PARAM_CUTOFF]);
        for sample in buffer.iter_mut() {
            self.z1 = *sample * (1.0 - a) + self.z1 * a;
            *sample = self.z1;
        }
    }

    fn reset(&mut self) {
        self.z1 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_open_filter_passes_signal() {
        let mut unit = Filter::new();
        unit.prepare(44100.0, 512);
        let ctx = ProcessContext::new(44100.0, 512);

        let mut buffer: Vec<f32> = (0..512)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        let input_rms = rms(&buffer);
        unit.process(&mut buffer, &[20000.0], &ctx);

        assert!(rms(&buffer) > input_rms * 0.8);
    }

    #[test]
    fn test_closed_filter_attenuates_high_frequency() {
        let mut unit = Filter::new();
        unit.prepare(44100.0, 512);
        let ctx = ProcessContext::new(44100.0, 512);

        // 8 kHz tone through a 100 Hz lowpass
        let mut buffer: Vec<f32> = (0..512)
            .map(|i| (2.0 * std::f32::consts::PI * 8000.0 * i as f32 / 44100.0).sin())
            .collect();
        let input_rms = rms(&buffer);
        unit.process(&mut buffer, &[100.0], &ctx);

        assert!(rms(&buffer) < input_rms * 0.2);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut unit = Filter::new();
        unit.prepare(44100.0, 16);
        let ctx = ProcessContext::new(44100.0, 16);

        let mut buffer = [1.0; 16];
        unit.process(&mut buffer, &[500.0], &ctx);
        unit.reset();

        let mut silence = [0.0; 16];
        unit.process(&mut silence, &[500.0], &ctx);
        assert!(silence.iter().all(|&s| s == 0.0));
    }
}
