//! Engine lifecycle and device plumbing.
//!
//! Owns the output backend and the control-side halves of the bridge,
//! meter, and recorder. The pipeline itself is handed to the backend at
//! start (the cpal backend moves it into the audio callback); after that
//! the engine talks to it only through lock-free primitives.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleRate, Stream, StreamConfig};
use log::{debug, info, warn};
use rtrb::RingBuffer;
use thiserror::Error;

use crate::dsp::{ParameterDefinition, UnitKind, UnitRegistry};
use crate::model::{BuildPlan, UnitId};

use super::bridge::{self, BridgeSender, ParamUpdate, DEFAULT_BRIDGE_CAPACITY};
use super::meter::{Meter, MeterState};
use super::pipeline::{Pipeline, RecorderTap};
use super::recorder::{Recorder, RecorderError, RecordingSession, RECORDER_QUEUE_CAPACITY};

/// Internal processing block size. Device buffers are chunked to this.
pub const BLOCK_SIZE: usize = 256;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("failed to create audio stream: {0}")]
    StreamCreationFailed(String),
    #[error("failed to control audio playback: {0}")]
    StreamPlaybackFailed(String),
    #[error("could not instantiate unit {unit} ({kind})")]
    UnitInstantiationFailed { unit: UnitId, kind: UnitKind },
    #[error("unknown unit id {0}")]
    UnknownUnit(UnitId),
    #[error("engine is not running")]
    NotRunning,
    #[error("recorder error: {0}")]
    Recorder(String),
}

impl From<RecorderError> for EngineError {
    fn from(e: RecorderError) -> Self {
        EngineError::Recorder(e.to_string())
    }
}

/// Engine lifecycle states. Transitions are driven entirely by the control
/// thread; the audio callback never changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Rebuilding,
    Stopping,
}

/// Information about an audio output device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub index: usize,
}

/// Where the pipeline's audio goes.
///
/// The production backend wraps a cpal stream and moves the pipeline into
/// the device callback. Keeping the seam here means the whole lifecycle
/// (start rollback, rebuild, idempotent stop) is exercisable without audio
/// hardware, the same way [`Pipeline`] is drivable without a stream.
pub trait AudioBackend {
    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Takes ownership of the pipeline and begins pulling audio through it.
    fn play(&mut self, pipeline: Pipeline) -> Result<(), EngineError>;

    /// Stops pulling audio and releases the pipeline.
    fn pause(&mut self);

    /// Information about all available output devices.
    fn devices(&self) -> Vec<DeviceInfo>;

    fn device_name(&self) -> String;

    /// Switches to another output device. Only valid while paused.
    fn select_device(&mut self, index: usize) -> Result<(), EngineError>;
}

/// The default backend: cpal output stream on the system's audio host.
pub struct CpalBackend {
    host: Host,
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
}

impl CpalBackend {
    /// Acquires the default output device.
    pub fn new() -> Result<Self, EngineError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| EngineError::DeviceUnavailable("no output device found".into()))?;
        let config = default_config(&device)?;
        Ok(Self {
            host,
            device,
            config,
            stream: None,
        })
    }
}

impl AudioBackend for CpalBackend {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn channels(&self) -> u16 {
        self.config.channels
    }

    fn play(&mut self, pipeline: Pipeline) -> Result<(), EngineError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let channels = self.config.channels as usize;

        // The Mutex is uncontested; only the callback ever locks it
        let pipeline = Arc::new(Mutex::new(pipeline));
        let callback_pipeline = Arc::clone(&pipeline);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if let Ok(mut p) = callback_pipeline.try_lock() {
                        p.render(data, channels);
                    } else {
                        for sample in data.iter_mut() {
                            *sample = 0.0;
                        }
                    }
                },
                move |err| {
                    warn!("audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| EngineError::StreamCreationFailed(e.to_string()))?;

        stream
            .play()
            .map_err(|e| EngineError::StreamPlaybackFailed(e.to_string()))?;

        self.stream = Some(stream);
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("pausing stream during teardown failed: {}", e);
            }
        }
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        let default_name = self
            .host
            .default_output_device()
            .and_then(|d| d.name().ok());

        self.host
            .output_devices()
            .map(|devices| {
                devices
                    .enumerate()
                    .filter_map(|(index, device)| {
                        device.name().ok().map(|name| DeviceInfo {
                            is_default: Some(&name) == default_name.as_ref(),
                            name,
                            index,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".to_string())
    }

    fn select_device(&mut self, index: usize) -> Result<(), EngineError> {
        let device = self
            .host
            .output_devices()
            .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?
            .nth(index)
            .ok_or_else(|| {
                EngineError::DeviceUnavailable(format!("no output device at index {}", index))
            })?;
        let config = default_config(&device)?;

        info!("output device: {}", device.name().unwrap_or_default());
        self.device = device;
        self.config = config;
        Ok(())
    }
}

struct StageRoute {
    stage: usize,
    parameters: &'static [ParameterDefinition],
}

pub struct Engine {
    registry: UnitRegistry,
    backend: Box<dyn AudioBackend>,
    state: EngineState,
    /// Plan of the currently (or last) built pipeline, kept for device
    /// switches.
    last_plan: Option<BuildPlan>,
    bridge_tx: Option<BridgeSender>,
    routes: HashMap<UnitId, StageRoute>,
    enabled: Arc<Vec<AtomicBool>>,
    meter: Arc<MeterState>,
    tap: RecorderTap,
    recorder: Recorder,
    source_preset: Option<String>,
    last_session: Option<RecordingSession>,
}

impl Engine {
    /// Creates an engine on the default output device.
    pub fn new(registry: UnitRegistry) -> Result<Self, EngineError> {
        Ok(Self::with_backend(registry, Box::new(CpalBackend::new()?)))
    }

    /// Creates an engine on a caller-provided output backend.
    pub fn with_backend(registry: UnitRegistry, backend: Box<dyn AudioBackend>) -> Self {
        let tap = RecorderTap::new();
        let recorder = Recorder::new(&tap);

        Self {
            registry,
            backend,
            state: EngineState::Stopped,
            last_plan: None,
            bridge_tx: None,
            routes: HashMap::new(),
            enabled: Arc::new(Vec::new()),
            meter: MeterState::new(),
            tap,
            recorder,
            source_preset: None,
            last_session: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    pub fn sample_rate(&self) -> u32 {
        self.backend.sample_rate()
    }

    pub fn channels(&self) -> u16 {
        self.backend.channels()
    }

    /// Information about all available output devices.
    pub fn enumerate_devices(&self) -> Vec<DeviceInfo> {
        self.backend.devices()
    }

    pub fn current_device_name(&self) -> String {
        self.backend.device_name()
    }

    /// Switches to a different output device. Stops the stream if running
    /// and rebuilds the pipeline on the new device.
    pub fn select_device(&mut self, index: usize) -> Result<(), EngineError> {
        let was_running = self.is_running();
        if was_running {
            self.stop()?;
        }

        self.backend.select_device(index)?;

        if was_running {
            if let Some(plan) = self.last_plan.clone() {
                self.start(&plan)?;
            }
        }
        Ok(())
    }

    /// Builds a pipeline from the plan and starts playback. Idempotent
    /// when already running. Any failure rolls back to Stopped.
    pub fn start(&mut self, plan: &BuildPlan) -> Result<(), EngineError> {
        if self.state == EngineState::Running {
            return Ok(());
        }
        self.state = EngineState::Starting;
        debug!("engine starting with {} stages", plan.len());

        match self.build_and_play(plan) {
            Ok(()) => {
                self.state = EngineState::Running;
                self.last_plan = Some(plan.clone());
                info!(
                    "engine running: {} stages at {} Hz",
                    plan.len(),
                    self.sample_rate()
                );
                Ok(())
            }
            Err(e) => {
                warn!("engine start failed: {}", e);
                self.teardown();
                self.state = EngineState::Stopped;
                Err(e)
            }
        }
    }

    /// Stops playback. Idempotent. An in-flight recording is finalized
    /// with whatever audio made it to disk.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        if self.state == EngineState::Stopped {
            return Ok(());
        }
        self.state = EngineState::Stopping;

        if self.recorder.is_recording() {
            match self.recorder.stop() {
                Ok(session) => self.last_session = Some(session),
                Err(e) => warn!("finalizing recording on stop failed: {}", e),
            }
        }

        self.teardown();
        self.state = EngineState::Stopped;
        info!("engine stopped");
        Ok(())
    }

    /// Tears down the running pipeline and builds a new one from the plan.
    /// Structural edits (add, remove, reorder, reconnect) go through here;
    /// the output is silent for the duration of the swap.
    pub fn rebuild(&mut self, plan: &BuildPlan) -> Result<(), EngineError> {
        if self.state != EngineState::Running {
            return self.start(plan);
        }
        self.state = EngineState::Rebuilding;
        debug!("engine rebuilding to {} stages", plan.len());

        if self.recorder.is_recording() {
            match self.recorder.stop() {
                Ok(session) => self.last_session = Some(session),
                Err(e) => warn!("finalizing recording on rebuild failed: {}", e),
            }
        }
        self.teardown();

        match self.build_and_play(plan) {
            Ok(()) => {
                self.state = EngineState::Running;
                self.last_plan = Some(plan.clone());
                Ok(())
            }
            Err(e) => {
                warn!("engine rebuild failed: {}", e);
                self.teardown();
                self.state = EngineState::Stopped;
                Err(e)
            }
        }
    }

    /// Flips a unit's enabled flag in the running pipeline. O(1), no
    /// rebuild, takes effect at the next block boundary. A no-op when the
    /// engine is stopped; the flag comes back with the next plan.
    pub fn toggle(&mut self, id: UnitId, enabled: bool) -> Result<(), EngineError> {
        if self.state != EngineState::Running {
            return Ok(());
        }
        let route = self.routes.get(&id).ok_or(EngineError::UnknownUnit(id))?;
        self.enabled[route.stage].store(enabled, Ordering::Relaxed);
        Ok(())
    }

    /// Pushes a parameter change to the running pipeline. Returns whether
    /// the update was accepted; a stopped engine, a stale id, or a full
    /// bridge all read as `false`. Values are clamped to the declared range.
    pub fn push_parameter(&mut self, id: UnitId, name: &str, value: f32) -> bool {
        if self.state != EngineState::Running {
            return false;
        }
        let Some(route) = self.routes.get(&id) else {
            return false;
        };
        let Some((param, def)) = route
            .parameters
            .iter()
            .enumerate()
            .find(|(_, d)| d.name == name)
        else {
            return false;
        };
        let Some(tx) = self.bridge_tx.as_mut() else {
            return false;
        };
        tx.send(ParamUpdate {
            stage: route.stage,
            param,
            value: def.clamp(value),
        })
    }

    /// A control-side meter bound to this engine's cells.
    pub fn meter(&self) -> Meter {
        Meter::new(Arc::clone(&self.meter))
    }

    /// Remembers the preset name attached to subsequent recordings.
    pub fn set_source_preset(&mut self, name: Option<String>) {
        self.source_preset = name;
    }

    /// Starts capturing the engine output to a WAV file.
    pub fn start_recording(
        &mut self,
        path: impl AsRef<Path>,
        title: &str,
    ) -> Result<(), EngineError> {
        if self.state != EngineState::Running {
            return Err(EngineError::NotRunning);
        }
        self.recorder
            .start(path, title, self.source_preset.clone())?;
        Ok(())
    }

    /// Stops the capture and returns the finalized session.
    pub fn stop_recording(&mut self) -> Result<RecordingSession, EngineError> {
        let session = self.recorder.stop()?;
        self.last_session = Some(session.clone());
        Ok(session)
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// The most recently finalized recording session, if any.
    pub fn last_recording(&self) -> Option<&RecordingSession> {
        self.last_session.as_ref()
    }

    fn build_and_play(&mut self, plan: &BuildPlan) -> Result<(), EngineError> {
        let sample_rate = self.backend.sample_rate();

        let (bridge_tx, bridge_rx) = bridge::channel(DEFAULT_BRIDGE_CAPACITY);
        let enabled: Arc<Vec<AtomicBool>> = Arc::new(
            plan.units
                .iter()
                .map(|u| AtomicBool::new(u.enabled))
                .collect(),
        );

        let (tap_producer, tap_consumer) = RingBuffer::new(RECORDER_QUEUE_CAPACITY);
        self.recorder.attach(tap_consumer, sample_rate);

        let mut routes = HashMap::new();
        for (stage, unit) in plan.units.iter().enumerate() {
            let spec = self
                .registry
                .spec(unit.kind)
                .map_err(|_| EngineError::UnitInstantiationFailed {
                    unit: unit.id,
                    kind: unit.kind,
                })?;
            routes.insert(
                unit.id,
                StageRoute {
                    stage,
                    parameters: spec.parameters,
                },
            );
        }

        let pipeline = Pipeline::new(
            plan,
            &self.registry,
            sample_rate as f32,
            BLOCK_SIZE,
            bridge_rx,
            Arc::clone(&enabled),
            Arc::clone(&self.meter),
            tap_producer,
            &self.tap,
        )
        .map_err(|e| {
            let kind = match e {
                crate::dsp::RegistryError::UnknownKind(kind) => kind,
            };
            let unit = plan
                .units
                .iter()
                .find(|u| u.kind == kind)
                .map(|u| u.id)
                .unwrap_or_default();
            EngineError::UnitInstantiationFailed { unit, kind }
        })?;

        self.backend.play(pipeline)?;

        self.bridge_tx = Some(bridge_tx);
        self.routes = routes;
        self.enabled = enabled;
        Ok(())
    }

    /// Releases the pipeline and every per-pipeline handle. The callback
    /// stops within one device buffer of the stream being dropped.
    fn teardown(&mut self) {
        self.backend.pause();
        self.bridge_tx = None;
        self.routes.clear();
        self.enabled = Arc::new(Vec::new());
    }
}

fn default_config(device: &Device) -> Result<StreamConfig, EngineError> {
    let supported = device
        .default_output_config()
        .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;
    Ok(StreamConfig {
        channels: supported.channels(),
        sample_rate: SampleRate(supported.sample_rate().0),
        buffer_size: cpal::BufferSize::Default,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChainModel;
    use crate::units::{builtin_registry, Gain, InputSource, OutputStage};

    /// Hardware-free backend: accepts the pipeline and keeps it on the
    /// control thread so lifecycle transitions are observable.
    struct NullBackend {
        playing: Option<Pipeline>,
        fail_play: bool,
    }

    impl NullBackend {
        fn new() -> Self {
            Self {
                playing: None,
                fail_play: false,
            }
        }
    }

    impl AudioBackend for NullBackend {
        fn sample_rate(&self) -> u32 {
            44_100
        }

        fn channels(&self) -> u16 {
            2
        }

        fn play(&mut self, pipeline: Pipeline) -> Result<(), EngineError> {
            if self.fail_play {
                return Err(EngineError::StreamCreationFailed("refused".into()));
            }
            self.playing = Some(pipeline);
            Ok(())
        }

        fn pause(&mut self) {
            self.playing = None;
        }

        fn devices(&self) -> Vec<DeviceInfo> {
            Vec::new()
        }

        fn device_name(&self) -> String {
            "Null Output".to_string()
        }

        fn select_device(&mut self, index: usize) -> Result<(), EngineError> {
            Err(EngineError::DeviceUnavailable(format!(
                "no output device at index {}",
                index
            )))
        }
    }

    fn headless_engine(registry: UnitRegistry) -> Engine {
        Engine::with_backend(registry, Box::new(NullBackend::new()))
    }

    fn basic_chain(registry: &UnitRegistry) -> ChainModel {
        let mut chain = ChainModel::new();
        chain.add_unit(UnitKind::Input, registry).unwrap();
        chain.add_unit(UnitKind::Gain, registry).unwrap();
        chain.add_unit(UnitKind::Output, registry).unwrap();
        chain
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::DeviceUnavailable("no output device found".into());
        assert!(err.to_string().contains("unavailable"));

        let err = EngineError::UnitInstantiationFailed {
            unit: 3,
            kind: UnitKind::Reverb,
        };
        assert!(err.to_string().contains("3"));
        assert!(err.to_string().contains("Reverb"));
    }

    #[test]
    fn test_device_info() {
        let info = DeviceInfo {
            name: "Test Device".to_string(),
            is_default: true,
            index: 0,
        };
        assert_eq!(info.name, "Test Device");
        assert!(info.is_default);
        assert_eq!(info.index, 0);
    }

    #[test]
    fn test_start_is_idempotent() {
        let registry = builtin_registry();
        let plan = basic_chain(&registry).build_plan();
        let mut engine = headless_engine(registry);

        engine.start(&plan).unwrap();
        assert_eq!(engine.state(), EngineState::Running);
        engine.start(&plan).unwrap();
        assert_eq!(engine.state(), EngineState::Running);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let registry = builtin_registry();
        let plan = basic_chain(&registry).build_plan();
        let mut engine = headless_engine(registry);

        // Never started: stop is a no-op, twice
        engine.stop().unwrap();
        assert_eq!(engine.state(), EngineState::Stopped);
        engine.stop().unwrap();
        assert_eq!(engine.state(), EngineState::Stopped);

        engine.start(&plan).unwrap();
        engine.stop().unwrap();
        assert_eq!(engine.state(), EngineState::Stopped);
        engine.stop().unwrap();
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn test_start_failure_rolls_back_to_stopped() {
        // A plan built against the full registry, started on an engine
        // whose registry knows no units at all
        let full = builtin_registry();
        let plan = basic_chain(&full).build_plan();
        let mut engine = headless_engine(UnitRegistry::new());

        let err = engine.start(&plan).unwrap_err();
        assert!(matches!(err, EngineError::UnitInstantiationFailed { .. }));
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_backend_failure_rolls_back_to_stopped() {
        let registry = builtin_registry();
        let plan = basic_chain(&registry).build_plan();
        let mut backend = NullBackend::new();
        backend.fail_play = true;
        let mut engine = Engine::with_backend(registry, Box::new(backend));

        let err = engine.start(&plan).unwrap_err();
        assert!(matches!(err, EngineError::StreamCreationFailed(_)));
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn test_rebuild_swaps_topology_while_running() {
        let registry = builtin_registry();
        let mut chain = basic_chain(&registry);
        let plan = chain.build_plan();
        let mut engine = headless_engine(builtin_registry());

        engine.start(&plan).unwrap();
        chain.add_unit(UnitKind::Reverb, &registry).unwrap();
        engine.rebuild(&chain.build_plan()).unwrap();

        assert_eq!(engine.state(), EngineState::Running);
    }

    #[test]
    fn test_rebuild_from_stopped_starts() {
        let registry = builtin_registry();
        let plan = basic_chain(&registry).build_plan();
        let mut engine = headless_engine(registry);

        engine.rebuild(&plan).unwrap();
        assert!(engine.is_running());
    }

    #[test]
    fn test_rebuild_failure_converges_to_stopped() {
        // Registry that can build the first plan but not the second
        let mut partial = UnitRegistry::new();
        partial.register(InputSource::spec());
        partial.register(Gain::spec());
        partial.register(OutputStage::spec());

        let full = builtin_registry();
        let mut chain = basic_chain(&full);
        let plan = chain.build_plan();
        let mut engine = headless_engine(partial);

        engine.start(&plan).unwrap();
        chain.add_unit(UnitKind::Reverb, &full).unwrap();
        let err = engine.rebuild(&chain.build_plan()).unwrap_err();

        assert!(matches!(
            err,
            EngineError::UnitInstantiationFailed { kind: UnitKind::Reverb, .. }
        ));
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn test_toggle_respects_state() {
        let registry = builtin_registry();
        let chain = basic_chain(&registry);
        let gain = chain.units()[1].id;
        let plan = chain.build_plan();
        let mut engine = headless_engine(registry);

        // Stopped: silent no-op even for unknown ids
        engine.toggle(gain, false).unwrap();
        engine.toggle(999, false).unwrap();

        engine.start(&plan).unwrap();
        engine.toggle(gain, false).unwrap();
        let err = engine.toggle(999, false).unwrap_err();
        assert!(matches!(err, EngineError::UnknownUnit(999)));
    }

    #[test]
    fn test_push_parameter_respects_state() {
        let registry = builtin_registry();
        let chain = basic_chain(&registry);
        let gain = chain.units()[1].id;
        let plan = chain.build_plan();
        let mut engine = headless_engine(registry);

        assert!(!engine.push_parameter(gain, "gain", -6.0));

        engine.start(&plan).unwrap();
        assert!(engine.push_parameter(gain, "gain", -6.0));
        assert!(!engine.push_parameter(999, "gain", -6.0));
        assert!(!engine.push_parameter(gain, "resonance", 0.5));

        engine.stop().unwrap();
        assert!(!engine.push_parameter(gain, "gain", -6.0));
    }

    #[test]
    fn test_recording_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let registry = builtin_registry();
        let plan = basic_chain(&registry).build_plan();
        let mut engine = headless_engine(registry);

        let err = engine.start_recording(dir.path().join("a.wav"), "early");
        assert!(matches!(err, Err(EngineError::NotRunning)));

        engine.start(&plan).unwrap();
        engine.start_recording(dir.path().join("a.wav"), "take").unwrap();
        assert!(engine.is_recording());
        assert!(engine
            .start_recording(dir.path().join("b.wav"), "second")
            .is_err());

        let session = engine.stop_recording().unwrap();
        assert_eq!(session.title, "take");
        assert!(!engine.is_recording());
        assert!(engine.last_recording().is_some());
    }

    #[test]
    fn test_stop_finalizes_active_recording() {
        let dir = tempfile::tempdir().unwrap();
        let registry = builtin_registry();
        let plan = basic_chain(&registry).build_plan();
        let mut engine = headless_engine(registry);

        engine.start(&plan).unwrap();
        engine.start_recording(dir.path().join("take.wav"), "cut short").unwrap();
        engine.stop().unwrap();

        assert!(!engine.is_recording());
        let session = engine.last_recording().unwrap();
        assert_eq!(session.title, "cut short");
        assert_eq!(
            session.status,
            crate::engine::recorder::RecordingStatus::Completed
        );
    }
}
