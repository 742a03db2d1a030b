//! Signal metering.
//!
//! The audio callback publishes per-block measurements into a handful of
//! atomic cells; the control side folds them into display-ready snapshots
//! with slow-decaying peak holds. Reads and writes never lock, and stale
//! values are acceptable.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How often the control surface should sample a fresh snapshot.
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_millis(50);

/// Absolute sample magnitude above which a block counts as clipping.
pub const CLIP_THRESHOLD: f32 = 0.99;

/// Multiplier applied to held peaks at each snapshot.
pub const PEAK_DECAY: f32 = 0.95;

/// K-weighting style offset applied to the RMS loudness estimate.
pub const LOUDNESS_OFFSET_DB: f32 = -0.691;

/// Floor below which levels read as silence.
const DB_FLOOR: f32 = -70.0;

fn store_f32(cell: &AtomicU32, value: f32) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

fn load_f32(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

/// Measures one block of samples. Returns (rms, peak, clipped).
pub fn analyze(buffer: &[f32]) -> (f32, f32, bool) {
    if buffer.is_empty() {
        return (0.0, 0.0, false);
    }
    let mut sum_sq = 0.0f32;
    let mut peak = 0.0f32;
    for &s in buffer {
        sum_sq += s * s;
        peak = peak.max(s.abs());
    }
    let rms = (sum_sq / buffer.len() as f32).sqrt();
    (rms, peak, peak > CLIP_THRESHOLD)
}

/// Shared cells written by the audio callback. The f32 values are stored
/// as their bit patterns in `AtomicU32`s.
#[derive(Default)]
pub struct MeterState {
    in_rms: AtomicU32,
    in_peak: AtomicU32,
    out_rms: AtomicU32,
    out_peak: AtomicU32,
    load: AtomicU32,
    clipping: AtomicBool,
}

impl MeterState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Publishes input-side measurements for the latest block.
    pub fn publish_input(&self, rms: f32, peak: f32) {
        store_f32(&self.in_rms, rms);
        store_f32(&self.in_peak, peak);
    }

    /// Publishes output-side measurements for the latest block.
    pub fn publish_output(&self, rms: f32, peak: f32, clipped: bool) {
        store_f32(&self.out_rms, rms);
        store_f32(&self.out_peak, peak);
        self.clipping.store(clipped, Ordering::Relaxed);
    }

    /// Publishes the callback duty cycle estimate (0.0 to 1.0).
    pub fn publish_load(&self, load: f32) {
        store_f32(&self.load, load);
    }
}

/// One display-ready reading of the engine's levels.
///
/// Levels and peaks are linear amplitudes (silence reads exactly 0.0);
/// the loudness and gain-reduction estimates are in dB.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeterSnapshot {
    /// Input RMS, linear full scale.
    pub input_level: f32,
    /// Output RMS, linear full scale.
    pub output_level: f32,
    /// Held input peak with decay ballistics, linear.
    pub peak_in: f32,
    /// Held output peak with decay ballistics, linear.
    pub peak_out: f32,
    /// Input level over output level in dB, a crude gain reduction figure.
    pub gain_reduction_estimate: f32,
    /// RMS-based loudness estimate in LUFS-like units.
    pub loudness_estimate: f32,
    /// Fraction of the callback budget the last blocks used.
    pub engine_load: f32,
    /// Whether the latest output block exceeded the clip threshold.
    pub is_clipping: bool,
}

impl Default for MeterSnapshot {
    fn default() -> Self {
        Self {
            input_level: 0.0,
            output_level: 0.0,
            peak_in: 0.0,
            peak_out: 0.0,
            gain_reduction_estimate: 0.0,
            loudness_estimate: DB_FLOOR,
            engine_load: 0.0,
            is_clipping: false,
        }
    }
}

fn to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        DB_FLOOR
    } else {
        (20.0 * linear.log10()).max(DB_FLOOR)
    }
}

/// Control-side meter. Owns the peak-hold ballistics; call [`Meter::snapshot`]
/// at roughly [`SNAPSHOT_INTERVAL`].
pub struct Meter {
    state: Arc<MeterState>,
    held_in: f32,
    held_out: f32,
}

impl Meter {
    pub fn new(state: Arc<MeterState>) -> Self {
        Self {
            state,
            held_in: 0.0,
            held_out: 0.0,
        }
    }

    /// Folds the latest published measurements into a snapshot. Held peaks
    /// decay multiplicatively between hits and jump instantly on a louder
    /// block.
    pub fn snapshot(&mut self) -> MeterSnapshot {
        let in_rms = load_f32(&self.state.in_rms);
        let in_peak = load_f32(&self.state.in_peak);
        let out_rms = load_f32(&self.state.out_rms);
        let out_peak = load_f32(&self.state.out_peak);

        self.held_in = (self.held_in * PEAK_DECAY).max(in_peak);
        self.held_out = (self.held_out * PEAK_DECAY).max(out_peak);

        let loudness_estimate = if out_rms > 0.0 {
            (20.0 * out_rms.log10() + LOUDNESS_OFFSET_DB).max(DB_FLOOR)
        } else {
            DB_FLOOR
        };

        MeterSnapshot {
            input_level: in_rms,
            output_level: out_rms,
            peak_in: self.held_in,
            peak_out: self.held_out,
            gain_reduction_estimate: (to_db(in_rms) - to_db(out_rms)).max(0.0),
            loudness_estimate,
            engine_load: load_f32(&self.state.load),
            is_clipping: self.state.clipping.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_analyze_sine_block() {
        let block: Vec<f32> = (0..1000)
            .map(|i| (i as f32 * std::f32::consts::TAU / 100.0).sin() * 0.5)
            .collect();
        let (rms, peak, clipped) = analyze(&block);

        assert_relative_eq!(rms, 0.5 / 2.0f32.sqrt(), epsilon = 1e-3);
        assert_relative_eq!(peak, 0.5, epsilon = 1e-3);
        assert!(!clipped);
    }

    #[test]
    fn test_analyze_detects_clipping() {
        let block = vec![0.0, -1.0, 0.3];
        let (_, peak, clipped) = analyze(&block);
        assert_eq!(peak, 1.0);
        assert!(clipped);
    }

    #[test]
    fn test_silence_reads_zero_without_clipping() {
        let state = MeterState::new();
        let mut meter = Meter::new(Arc::clone(&state));

        let snap = meter.snapshot();
        assert_eq!(snap.input_level, 0.0);
        assert_eq!(snap.output_level, 0.0);
        assert!(!snap.is_clipping);
        assert_eq!(snap.gain_reduction_estimate, 0.0);
    }

    #[test]
    fn test_peak_hold_decays_monotonically() {
        let state = MeterState::new();
        let mut meter = Meter::new(Arc::clone(&state));

        state.publish_output(0.5, 0.8, false);
        let first = meter.snapshot();
        assert_relative_eq!(first.peak_out, 0.8, epsilon = 1e-6);

        // Signal drops to silence; the held peak must only ever decrease
        state.publish_output(0.0, 0.0, false);
        let mut previous = first.peak_out;
        for _ in 0..10 {
            let snap = meter.snapshot();
            assert!(snap.peak_out < previous);
            assert_relative_eq!(snap.peak_out, previous * PEAK_DECAY, epsilon = 1e-6);
            previous = snap.peak_out;
        }
    }

    #[test]
    fn test_peak_hold_jumps_on_louder_block() {
        let state = MeterState::new();
        let mut meter = Meter::new(Arc::clone(&state));

        state.publish_output(0.1, 0.2, false);
        meter.snapshot();
        state.publish_output(0.5, 0.9, false);
        let snap = meter.snapshot();

        assert_relative_eq!(snap.peak_out, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_loudness_carries_offset() {
        let state = MeterState::new();
        let mut meter = Meter::new(Arc::clone(&state));

        state.publish_output(1.0, 1.0, false);
        let snap = meter.snapshot();
        assert_relative_eq!(snap.loudness_estimate, LOUDNESS_OFFSET_DB, epsilon = 1e-5);
    }
}
