//! Built-in processing units.
//!
//! One file per unit, each exporting its parameter table and a `spec()`
//! used to populate the registry.

pub mod compressor;
pub mod delay;
pub mod distortion;
pub mod filter;
pub mod gain;
pub mod input;
pub mod output;
pub mod reverb;

pub use compressor::Compressor;
pub use delay::Delay;
pub use distortion::Distortion;
pub use filter::Filter;
pub use gain::Gain;
pub use input::InputSource;
pub use output::OutputStage;
pub use reverb::Reverb;

use crate::dsp::UnitRegistry;

/// Creates a registry populated with all built-in units.
pub fn builtin_registry() -> UnitRegistry {
    let mut registry = UnitRegistry::new();
    registry.register(InputSource::spec());
    registry.register(Gain::spec());
    registry.register(Filter::spec());
    registry.register(Distortion::spec());
    registry.register(Compressor::spec());
    registry.register(Delay::spec());
    registry.register(Reverb::spec());
    registry.register(OutputStage::spec());
    registry
}
