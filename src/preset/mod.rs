//! Preset persistence.

#[allow(clippy::module_inception)]
pub mod preset;

pub use preset::{
    load_from_file, save_to_file, ConnectionConfig, ParameterConfig, Preset, PresetError,
    UnitConfig, PRESET_VERSION,
};
