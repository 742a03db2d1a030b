//! The live processing pipeline.
//!
//! Built once from a frozen [`BuildPlan`] and then moved into the audio
//! callback. Everything here runs on the real-time thread: no allocation,
//! no locks, no IO. Communication with the control domain happens only
//! through the parameter bridge, the meter cells, the enabled flags, and
//! the recorder ring.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rtrb::Producer;

use crate::dsp::{ProcessContext, RegistryError, UnitKind, UnitProcessor, UnitRegistry};
use crate::model::{BuildPlan, UnitId};

use super::bridge::BridgeReceiver;
use super::meter::{self, MeterState};

/// Smoothing factor for the callback load estimate.
const LOAD_EMA: f32 = 0.9;

struct Stage {
    id: UnitId,
    kind: UnitKind,
    processor: Box<dyn UnitProcessor>,
    params: Vec<f32>,
    buffer: Vec<f32>,
}

/// Shared hooks the control side keeps after the pipeline moves into the
/// callback.
pub struct RecorderTap {
    pub armed: Arc<AtomicBool>,
    pub dropped: Arc<AtomicU64>,
}

impl RecorderTap {
    pub fn new() -> Self {
        Self {
            armed: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for RecorderTap {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Pipeline {
    stages: Vec<Stage>,
    /// Source stage indices per stage. Plan edges are forward, so a stage's
    /// sources are always already processed when its turn comes.
    sources: Vec<Vec<usize>>,
    /// Per-stage enabled flags, shared with the engine for O(1) toggling.
    /// A disabled stage passes its summed input through untouched.
    enabled: Arc<Vec<AtomicBool>>,
    bridge_rx: BridgeReceiver,
    meter: Arc<MeterState>,
    tap: Producer<f32>,
    tap_armed: Arc<AtomicBool>,
    tap_dropped: Arc<AtomicU64>,
    scratch: Vec<f32>,
    context: ProcessContext,
    load: f32,
}

impl Pipeline {
    /// Builds every stage in the plan, disabled ones included. Instantiation
    /// is all-or-nothing; a registry miss tears down whatever was built.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        plan: &BuildPlan,
        registry: &UnitRegistry,
        sample_rate: f32,
        block_size: usize,
        bridge_rx: BridgeReceiver,
        enabled: Arc<Vec<AtomicBool>>,
        meter: Arc<MeterState>,
        tap: Producer<f32>,
        recorder: &RecorderTap,
    ) -> Result<Self, RegistryError> {
        debug_assert_eq!(enabled.len(), plan.len());

        let mut stages = Vec::with_capacity(plan.len());
        for unit in &plan.units {
            let mut processor = registry.instantiate(unit.kind)?;
            processor.prepare(sample_rate, block_size);
            stages.push(Stage {
                id: unit.id,
                kind: unit.kind,
                processor,
                params: unit.values.clone(),
                buffer: vec![0.0; block_size],
            });
        }

        let mut sources = vec![Vec::new(); plan.len()];
        for &(from, to) in &plan.edges {
            sources[to].push(from);
        }

        Ok(Self {
            stages,
            sources,
            enabled,
            bridge_rx,
            meter,
            tap,
            tap_armed: Arc::clone(&recorder.armed),
            tap_dropped: Arc::clone(&recorder.dropped),
            scratch: vec![0.0; block_size],
            context: ProcessContext::new(sample_rate, block_size),
            load: 0.0,
        })
    }

    pub fn stage_ids(&self) -> Vec<UnitId> {
        self.stages.iter().map(|s| s.id).collect()
    }

    fn apply_pending_updates(&mut self) {
        while let Some(update) = self.bridge_rx.recv() {
            if let Some(stage) = self.stages.get_mut(update.stage) {
                if let Some(slot) = stage.params.get_mut(update.param) {
                    *slot = update.value;
                }
            }
        }
    }

    /// Index of the stage whose buffer feeds the output, preferring an
    /// explicit Output unit over plain traversal order.
    fn output_stage(&self) -> Option<usize> {
        self.stages
            .iter()
            .rposition(|s| s.kind == UnitKind::Output)
            .or_else(|| self.stages.len().checked_sub(1))
    }

    /// Processes one mono block into `out`. `out.len()` must not exceed the
    /// prepared block size.
    pub fn process_block(&mut self, out: &mut [f32]) {
        let started = Instant::now();
        self.apply_pending_updates();

        let frames = out.len();
        for i in 0..self.stages.len() {
            let (done, rest) = self.stages.split_at_mut(i);
            let stage = &mut rest[0];
            let buffer = &mut stage.buffer[..frames];

            buffer.fill(0.0);
            for &src in &self.sources[i] {
                let upstream = &done[src].buffer[..frames];
                for (acc, &s) in buffer.iter_mut().zip(upstream) {
                    *acc += s;
                }
            }

            if self.enabled[i].load(Ordering::Relaxed) {
                stage.processor.process(buffer, &stage.params, &self.context);
            }
        }

        match self.output_stage() {
            Some(last) => out.copy_from_slice(&self.stages[last].buffer[..frames]),
            None => out.fill(0.0),
        }

        if let Some(first) = self.stages.first() {
            let (rms, peak, _) = meter::analyze(&first.buffer[..frames]);
            self.meter.publish_input(rms, peak);
        }
        let (rms, peak, clipped) = meter::analyze(out);
        self.meter.publish_output(rms, peak, clipped);

        if self.tap_armed.load(Ordering::Acquire) {
            for &s in out.iter() {
                if self.tap.push(s).is_err() {
                    self.tap_dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let budget = frames as f32 / self.context.sample_rate;
        if budget > 0.0 {
            let used = started.elapsed().as_secs_f32() / budget;
            self.load = self.load * LOAD_EMA + used * (1.0 - LOAD_EMA);
            self.meter.publish_load(self.load.clamp(0.0, 1.0));
        }
    }

    /// Fills an interleaved device buffer, chunked to the prepared block
    /// size. The mono pipeline output is copied to every channel.
    pub fn render(&mut self, data: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let block = self.context.block_size;
        // Move the scratch out so process_block can borrow self mutably
        let mut mono = std::mem::take(&mut self.scratch);
        for chunk in data.chunks_mut(block * channels) {
            let frames = chunk.len() / channels;
            self.process_block(&mut mono[..frames]);
            for (frame, &s) in chunk.chunks_mut(channels).zip(mono.iter()) {
                frame.fill(s);
            }
        }
        self.scratch = mono;
    }
}
