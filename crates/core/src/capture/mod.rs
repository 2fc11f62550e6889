//! Capture collaborators: anything that can feed the shared analyser.
//!
//! A capture runs on its own thread (or on the audio backend's callback
//! thread) and writes samples into the [`SharedAnalyser`]. The returned
//! [`CaptureHandle`] owns the liveness flag that every render loop bound to
//! this capture checks before drawing.

#[cfg(feature = "device")]
mod device;

use std::{
    any::Any,
    f32::consts::PI,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use tracing::{info, warn};

use crate::{
    analysis::SharedAnalyser,
    events::{EventSender, EventSink, MICROPHONE},
    CaptureError, SyntheticConfig,
};

#[cfg(feature = "device")]
pub use device::DeviceCapture;

/// Recorded by a capture whose source ended without being stopped.
pub const CAPTURE_INTERRUPTED: &str = "Recording interrupted";

/// Shared "source attached" flag.
#[derive(Debug, Clone)]
pub struct Liveness {
    alive: Arc<AtomicBool>,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Clears the flag. Every clone observes the release.
    pub fn release(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

/// Running capture. Dropping or releasing it stops the capture.
pub struct CaptureHandle {
    description: String,
    sample_rate: u32,
    liveness: Liveness,
    worker: Option<JoinHandle<()>>,
    guard: Option<Box<dyn Any>>,
}

impl CaptureHandle {
    pub fn new(description: impl Into<String>, sample_rate: u32, liveness: Liveness) -> Self {
        Self {
            description: description.into(),
            sample_rate,
            liveness,
            worker: None,
            guard: None,
        }
    }

    /// Thread that produces samples; joined on release.
    pub fn with_worker(mut self, worker: JoinHandle<()>) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Backend resource (such as a device stream) kept alive until release.
    pub fn with_guard(mut self, guard: Box<dyn Any>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Rate at which this capture delivers samples.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    /// Stops the capture and waits for its worker to exit.
    pub fn release(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.liveness.release();
        self.guard.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(capture = %self.description, "capture worker panicked");
            }
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("description", &self.description)
            .field("sample_rate", &self.sample_rate)
            .field("alive", &self.liveness.is_alive())
            .finish()
    }
}

/// Something that can start and stop feeding the analyser.
///
/// A capture whose source ends on its own clears its liveness flag and
/// reports [`CAPTURE_INTERRUPTED`] through `events`.
pub trait Capture {
    fn name(&self) -> &str;

    fn start(
        &mut self,
        analyser: SharedAnalyser,
        events: EventSender,
    ) -> Result<CaptureHandle, CaptureError>;

    fn stop(&mut self, handle: CaptureHandle) {
        info!(capture = %handle.description(), "stopping capture");
        handle.release();
    }
}

/// Deterministic test tone with periodic loud bursts.
#[derive(Debug, Clone)]
pub struct SyntheticSignal {
    config: SyntheticConfig,
    sample_rate: u32,
    position: u64,
    phase: f32,
}

impl SyntheticSignal {
    pub fn new(config: SyntheticConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
            position: 0,
            phase: 0.0,
        }
    }

    /// Whether the sample at `position` falls inside a burst. Bursts occupy
    /// the last `burst_length_ms` of every `burst_period_ms`.
    fn in_burst(&self, position: u64) -> bool {
        let period = self.config.burst_period_ms;
        if period == 0 {
            return false;
        }
        let elapsed_ms = position * 1000 / self.sample_rate.max(1) as u64;
        elapsed_ms % period >= period.saturating_sub(self.config.burst_length_ms)
    }

    pub fn fill(&mut self, out: &mut [f32]) {
        let step = 2.0 * PI * self.config.frequency_hz / self.sample_rate.max(1) as f32;
        for slot in out.iter_mut() {
            let amplitude = if self.in_burst(self.position) {
                self.config.burst_amplitude
            } else {
                self.config.amplitude
            };
            *slot = (amplitude * self.phase.sin()).clamp(-1.0, 1.0);
            self.phase = (self.phase + step) % (2.0 * PI);
            self.position += 1;
        }
    }
}

/// Capture that feeds a [`SyntheticSignal`] at real-time pace.
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    config: SyntheticConfig,
}

impl SyntheticCapture {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }
}

impl Capture for SyntheticCapture {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn start(
        &mut self,
        analyser: SharedAnalyser,
        mut events: EventSender,
    ) -> Result<CaptureHandle, CaptureError> {
        let sample_rate = analyser
            .lock()
            .map_err(|err| CaptureError::InitFailed(err.to_string()))?
            .config()
            .sample_rate;
        let block_size = self.config.block_size.max(1);
        let pace = Duration::from_secs_f64(block_size as f64 / sample_rate as f64);

        let liveness = Liveness::new();
        let alive = liveness.clone();
        let mut signal = SyntheticSignal::new(self.config.clone(), sample_rate);

        let worker = std::thread::Builder::new()
            .name("synthetic-capture".into())
            .spawn(move || {
                let mut block = vec![0.0_f32; block_size];
                while alive.is_alive() {
                    signal.fill(&mut block);
                    if let Err(err) = analyser.push_samples(&block) {
                        warn!(error = %err, "synthetic capture stopping");
                        alive.release();
                        events.record(CAPTURE_INTERRUPTED, MICROPHONE);
                        break;
                    }
                    std::thread::sleep(pace);
                }
            })
            .map_err(|err| CaptureError::InitFailed(format!("failed to spawn generator: {err}")))?;

        info!(
            frequency_hz = self.config.frequency_hz,
            sample_rate, "synthetic capture started"
        );
        Ok(CaptureHandle::new("synthetic tone", sample_rate, liveness).with_worker(worker))
    }
}
