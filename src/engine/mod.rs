//! The processing engine.
//!
//! Split along the real-time boundary: [`pipeline`] is everything that runs
//! inside the audio callback, [`engine`] is the control-side lifecycle, and
//! [`bridge`], [`meter`], and [`recorder`] are the lock-free seams between
//! the two.

pub mod bridge;
#[allow(clippy::module_inception)]
pub mod engine;
pub mod meter;
pub mod pipeline;
pub mod recorder;

pub use bridge::{BridgeReceiver, BridgeSender, ParamUpdate, DEFAULT_BRIDGE_CAPACITY};
pub use engine::{
    AudioBackend, CpalBackend, DeviceInfo, Engine, EngineError, EngineState, BLOCK_SIZE,
};
pub use meter::{Meter, MeterSnapshot, MeterState, CLIP_THRESHOLD, PEAK_DECAY, SNAPSHOT_INTERVAL};
pub use pipeline::{Pipeline, RecorderTap};
pub use recorder::{
    Recorder, RecorderError, RecordingSession, RecordingStatus, RECORDER_QUEUE_CAPACITY,
};
