//! Output recording.
//!
//! The audio callback pushes tapped output samples into a lock-free ring;
//! a dedicated writer thread drains the ring into a 32-bit float mono WAV
//! file. The callback never touches the file. If the ring overflows the
//! samples are dropped, the session keeps running, and the finished
//! session is marked degraded.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use hound::{SampleFormat, WavSpec, WavWriter};
use log::{info, warn};
use rtrb::Consumer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pipeline::RecorderTap;

/// Ring capacity in samples. About 1.5 seconds at 44.1 kHz, plenty of slack
/// for a stalled disk.
pub const RECORDER_QUEUE_CAPACITY: usize = 1 << 16;

/// How long the writer thread dozes when the ring is empty.
const WRITER_IDLE_SLEEP: Duration = Duration::from_millis(2);

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("no recording is in progress")]
    NotRecording,
    #[error("a recording is already in progress")]
    AlreadyRecording,
    #[error("recorder has no capture ring attached")]
    Detached,
    #[error("WAV write failed: {0}")]
    Wav(#[from] hound::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    Recording,
    Completed,
    Failed,
}

/// Metadata for one capture, from arm to finalize.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordingSession {
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub status: RecordingStatus,
    /// Name of the preset that was loaded when recording started, if any.
    pub source_preset_name: Option<String>,
    /// True when the ring overflowed at least once during the session.
    pub degraded: bool,
}

struct ActiveRecording {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<(Result<u64, RecorderError>, Consumer<f32>)>,
    session: RecordingSession,
}

/// Control-side recorder. Owns the ring consumer between sessions and the
/// writer thread during one.
pub struct Recorder {
    sample_rate: u32,
    armed: Arc<AtomicBool>,
    dropped: Arc<std::sync::atomic::AtomicU64>,
    idle_consumer: Option<Consumer<f32>>,
    active: Option<ActiveRecording>,
}

impl Recorder {
    pub fn new(tap: &RecorderTap) -> Self {
        Self {
            sample_rate: 44_100,
            armed: Arc::clone(&tap.armed),
            dropped: Arc::clone(&tap.dropped),
            idle_consumer: None,
            active: None,
        }
    }

    /// Attaches the consumer half of a fresh capture ring. Called whenever
    /// the pipeline (and with it the producer half) is rebuilt.
    pub fn attach(&mut self, consumer: Consumer<f32>, sample_rate: u32) {
        self.idle_consumer = Some(consumer);
        self.sample_rate = sample_rate;
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Arms the tap and spawns the writer thread. The output file is created
    /// here so IO failures surface before any audio is lost.
    pub fn start(
        &mut self,
        path: impl AsRef<Path>,
        title: &str,
        source_preset_name: Option<String>,
    ) -> Result<(), RecorderError> {
        if self.active.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }
        let consumer = self.idle_consumer.take().ok_or(RecorderError::Detached)?;

        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = match WavWriter::create(path.as_ref(), spec) {
            Ok(w) => w,
            Err(e) => {
                self.idle_consumer = Some(consumer);
                return Err(e.into());
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("recorder-writer".into())
            .spawn(move || run_writer(writer, consumer, thread_stop))
            .map_err(RecorderError::Io)?;

        self.dropped.store(0, Ordering::Relaxed);
        self.armed.store(true, Ordering::Release);
        info!("recording started: {}", title);

        self.active = Some(ActiveRecording {
            stop,
            handle,
            session: RecordingSession {
                title: title.to_string(),
                created_at: Utc::now(),
                duration_seconds: 0.0,
                status: RecordingStatus::Recording,
                source_preset_name,
                degraded: false,
            },
        });
        Ok(())
    }

    /// Disarms the tap, joins the writer, and finalizes the session exactly
    /// once.
    pub fn stop(&mut self) -> Result<RecordingSession, RecorderError> {
        let active = self.active.take().ok_or(RecorderError::NotRecording)?;

        self.armed.store(false, Ordering::Release);
        active.stop.store(true, Ordering::Release);

        let mut session = active.session;
        match active.handle.join() {
            Ok((Ok(samples), consumer)) => {
                self.idle_consumer = Some(consumer);
                session.duration_seconds = samples as f64 / self.sample_rate as f64;
                session.status = RecordingStatus::Completed;
            }
            Ok((Err(e), consumer)) => {
                self.idle_consumer = Some(consumer);
                warn!("recording failed: {}", e);
                session.status = RecordingStatus::Failed;
            }
            Err(_) => {
                warn!("recorder writer thread panicked");
                session.status = RecordingStatus::Failed;
            }
        }
        session.degraded = self.dropped.load(Ordering::Relaxed) > 0;
        if session.degraded {
            warn!("recording '{}' dropped samples", session.title);
        }
        info!(
            "recording stopped: {} ({:.2}s)",
            session.title, session.duration_seconds
        );
        Ok(session)
    }
}

fn run_writer(
    mut writer: WavWriter<std::io::BufWriter<std::fs::File>>,
    mut consumer: Consumer<f32>,
    stop: Arc<AtomicBool>,
) -> (Result<u64, RecorderError>, Consumer<f32>) {
    let mut written: u64 = 0;
    let result = loop {
        match consumer.pop() {
            Ok(sample) => {
                if let Err(e) = writer.write_sample(sample) {
                    break Err(RecorderError::Wav(e));
                }
                written += 1;
            }
            Err(_) => {
                if stop.load(Ordering::Acquire) {
                    // Drain anything that raced in before the flag
                    let mut drain_err = None;
                    while let Ok(sample) = consumer.pop() {
                        if let Err(e) = writer.write_sample(sample) {
                            drain_err = Some(e);
                            break;
                        }
                        written += 1;
                    }
                    break match drain_err {
                        Some(e) => Err(RecorderError::Wav(e)),
                        None => match writer.finalize() {
                            Ok(()) => Ok(written),
                            Err(e) => Err(RecorderError::Wav(e)),
                        },
                    };
                }
                thread::sleep(WRITER_IDLE_SLEEP);
            }
        }
    };
    (result, consumer)
}
