//! The core UnitProcessor trait and unit-type enumeration.
//!
//! A processing unit is one stage of a signal chain: it receives a block of
//! mono samples, transforms it in place according to its parameter vector,
//! and hands the block to the next stage. DSP algorithms are deliberately
//! simple; the engine treats every unit as an opaque processor.

use serde::{Deserialize, Serialize};

use super::context::ProcessContext;

/// The closed set of processing-unit types known to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Signal source at the head of the chain.
    Input,
    /// Clean gain stage.
    Gain,
    /// One-pole lowpass filter.
    Filter,
    /// Saturating distortion.
    Distortion,
    /// Feed-forward dynamics compressor.
    Compressor,
    /// Feedback delay line.
    Delay,
    /// Comb-based reverb.
    Reverb,
    /// Master output stage at the tail of the chain.
    Output,
}

impl UnitKind {
    /// All known unit kinds, in registry order.
    pub const ALL: [UnitKind; 8] = [
        UnitKind::Input,
        UnitKind::Gain,
        UnitKind::Filter,
        UnitKind::Distortion,
        UnitKind::Compressor,
        UnitKind::Delay,
        UnitKind::Reverb,
        UnitKind::Output,
    ];

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            UnitKind::Input => "Input",
            UnitKind::Gain => "Gain",
            UnitKind::Filter => "Filter",
            UnitKind::Distortion => "Distortion",
            UnitKind::Compressor => "Compressor",
            UnitKind::Delay => "Delay",
            UnitKind::Reverb => "Reverb",
            UnitKind::Output => "Output",
        }
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The interface every live processing unit implements.
///
/// # Thread Safety
///
/// `UnitProcessor` requires `Send + 'static` because live units are built on
/// the control thread and moved into the audio callback.
///
/// # Real-time Constraints
///
/// `process` runs on the audio thread and must not allocate, lock, perform
/// I/O, or block. Parameters are read once per block, not per sample.
pub trait UnitProcessor: Send + 'static {
    /// The unit type this processor realizes.
    fn kind(&self) -> UnitKind;

    /// Prepares the unit for processing.
    ///
    /// Called on the control thread before the unit enters the signal path,
    /// and again if the sample rate or maximum block size changes. Any
    /// buffers (delay lines, etc.) are allocated here, never in `process`.
    fn prepare(&mut self, sample_rate: f32, max_block_size: usize);

    /// Processes one block of samples in place.
    ///
    /// `params` holds the current parameter values in the order declared by
    /// the unit's registry spec.
    fn process(&mut self, buffer: &mut [f32], params: &[f32], context: &ProcessContext);

    /// Clears internal state (filter memory, delay lines, envelopes).
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_distinct() {
        for i in 0..UnitKind::ALL.len() {
            for j in (i + 1)..UnitKind::ALL.len() {
                assert_ne!(UnitKind::ALL[i].name(), UnitKind::ALL[j].name());
            }
        }
    }

    #[test]
    fn test_kind_serde_round_trip() {
        for kind in UnitKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            let back: UnitKind = serde_json::from_str(&json).unwrap();
            assert_eq!(kind, back);
        }
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&UnitKind::Distortion).unwrap();
        assert_eq!(json, "\"distortion\"");
    }

    #[test]
    fn test_unknown_kind_fails_to_decode() {
        let result: Result<UnitKind, _> = serde_json::from_str("\"flanger\"");
        assert!(result.is_err());
    }
}
