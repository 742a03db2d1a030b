//! Signalrack
//!
//! A real-time reconfigurable audio signal-chain engine. Units are arranged
//! as a linear chain or a free-routing graph, compiled into a lock-free
//! pipeline, and run inside the audio callback while the control side keeps
//! editing, metering, and recording.

pub mod dsp;
pub mod engine;
pub mod model;
pub mod preset;
pub mod units;

pub use dsp::{UnitKind, UnitRegistry};
pub use engine::{Engine, EngineError, EngineState, MeterSnapshot};
pub use model::{BuildPlan, ChainModel, GraphModel, ModelError, UnitId};
pub use preset::{Preset, PresetError};
pub use units::builtin_registry;
