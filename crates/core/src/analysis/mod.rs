use std::{
    f32::consts::PI,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use tracing::warn;

use crate::{AnalyserConfig, MonitorError, Result};

/// Smallest linear magnitude converted to decibels. Keeps silent bins finite
/// (-240 dB) so spectral differences never turn into NaN.
const MIN_MAGNITUDE: f32 = 1e-12;

/// Capability polled by every view once per frame.
///
/// Buffers passed in are overwritten in place; at most
/// [`SampleSource::frequency_bin_count`] entries are written.
pub trait SampleSource {
    fn frequency_bin_count(&self) -> usize;

    fn sample_rate(&self) -> u32;

    fn transform_size(&self) -> usize;

    /// Most recent time-domain samples as bytes, 128 being the zero line.
    fn time_domain_bytes(&mut self, out: &mut [u8]);

    /// Smoothed spectrum mapped onto the byte domain.
    fn frequency_bytes(&mut self, out: &mut [u8]);

    /// Smoothed spectrum in decibels.
    fn frequency_floats(&mut self, out: &mut [f32]);
}

/// Fixed-window analysis node.
///
/// Keeps the last `transform_size` mono samples and derives the views'
/// buffers from them. The spectrum is recomputed lazily, only when samples
/// arrived since the previous computation, so several views reading in the
/// same frame observe the same smoothed spectrum.
pub struct Analyser {
    config: AnalyserConfig,
    history: Vec<f32>,
    head: usize,
    generation: u64,
    computed_generation: Option<u64>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    decibels: Vec<f32>,
    fft: FftResources,
}

impl Analyser {
    pub fn new(config: AnalyserConfig) -> Result<Self> {
        config.validate()?;

        let size = config.transform_size;
        let bins = config.frequency_bin_count();
        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        let fft = FftResources {
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        };

        Ok(Self {
            history: vec![0.0; size],
            head: 0,
            generation: 0,
            computed_generation: None,
            window: (0..size).map(|i| blackman_value(i, size)).collect(),
            smoothed: vec![0.0; bins],
            decibels: vec![magnitude_to_db(0.0); bins],
            fft,
            config,
        })
    }

    pub fn config(&self) -> &AnalyserConfig {
        &self.config
    }

    /// Adopts the rate of a newly attached capture. Clears the window since
    /// older samples were taken at the previous rate.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        if sample_rate == 0 {
            return Err(MonitorError::InvalidInput("sample rate must be non-zero"));
        }
        if sample_rate != self.config.sample_rate {
            self.config.sample_rate = sample_rate;
            self.reset();
        }
        Ok(())
    }

    /// Appends mono samples in `[-1.0, 1.0]`; older samples fall out of the
    /// window.
    pub fn push_samples(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        let size = self.history.len();
        let tail = if samples.len() > size {
            &samples[samples.len() - size..]
        } else {
            samples
        };

        for &sample in tail {
            self.history[self.head] = sample;
            self.head = (self.head + 1) % size;
        }
        self.generation = self.generation.wrapping_add(1);
    }

    /// Clears the sample window and the smoothing memory.
    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|s| *s = 0.0);
        self.head = 0;
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
        self.decibels.iter_mut().for_each(|d| *d = magnitude_to_db(0.0));
        self.computed_generation = None;
    }

    /// Iterates the window oldest sample first.
    fn chronological(&self) -> impl Iterator<Item = f32> + '_ {
        self.history[self.head..]
            .iter()
            .chain(self.history[..self.head].iter())
            .copied()
    }

    fn refresh_spectrum(&mut self) -> Result<()> {
        if self.computed_generation == Some(self.generation) {
            return Ok(());
        }

        let size = self.history.len();
        let (newer, older) = self.history.split_at(self.head);
        for ((input, sample), weight) in self
            .fft
            .input
            .iter_mut()
            .zip(older.iter().chain(newer))
            .zip(&self.window)
        {
            *input = sample * weight;
        }

        self.fft.plan.process_with_scratch(
            &mut self.fft.input,
            &mut self.fft.spectrum,
            &mut self.fft.scratch,
        )?;

        let tau = self.config.smoothing_time_constant;
        let scale = 1.0 / size as f32;
        for ((bin, smoothed), decibels) in self
            .fft
            .spectrum
            .iter()
            .zip(self.smoothed.iter_mut())
            .zip(self.decibels.iter_mut())
        {
            let magnitude = bin.norm() * scale;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
            *decibels = magnitude_to_db(*smoothed);
        }

        self.computed_generation = Some(self.generation);
        Ok(())
    }

    fn ensure_spectrum(&mut self) {
        if let Err(err) = self.refresh_spectrum() {
            warn!(error = %err, "spectrum refresh failed; reusing previous frame");
        }
    }
}

impl SampleSource for Analyser {
    fn frequency_bin_count(&self) -> usize {
        self.config.frequency_bin_count()
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn transform_size(&self) -> usize {
        self.config.transform_size
    }

    fn time_domain_bytes(&mut self, out: &mut [u8]) {
        let len = out.len().min(self.history.len());
        let skip = self.history.len() - len;
        for (slot, sample) in out.iter_mut().zip(self.chronological().skip(skip)) {
            *slot = (128.0 * (sample + 1.0)).clamp(0.0, 255.0) as u8;
        }
    }

    fn frequency_bytes(&mut self, out: &mut [u8]) {
        self.ensure_spectrum();
        let min = self.config.min_decibels;
        let range = self.config.max_decibels - min;
        for (slot, db) in out.iter_mut().zip(&self.decibels) {
            *slot = (255.0 * (db - min) / range).clamp(0.0, 255.0) as u8;
        }
    }

    fn frequency_floats(&mut self, out: &mut [f32]) {
        self.ensure_spectrum();
        for (slot, db) in out.iter_mut().zip(&self.decibels) {
            *slot = *db;
        }
    }
}

/// Analyser shared between a capture thread and the render loop.
#[derive(Clone)]
pub struct SharedAnalyser {
    shared: Arc<Mutex<Analyser>>,
}

impl SharedAnalyser {
    pub fn new(analyser: Analyser) -> Self {
        Self {
            shared: Arc::new(Mutex::new(analyser)),
        }
    }

    pub fn push_samples(&self, samples: &[f32]) -> Result<()> {
        self.lock()?.push_samples(samples);
        Ok(())
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Analyser>> {
        self.shared
            .lock()
            .map_err(|_| MonitorError::msg("analyser has been poisoned"))
    }
}

impl fmt::Debug for SharedAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedAnalyser").finish()
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for Analyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyser")
            .field("config", &self.config)
            .field("generation", &self.generation)
            .field("computed_generation", &self.computed_generation)
            .finish()
    }
}

fn magnitude_to_db(magnitude: f32) -> f32 {
    20.0 * magnitude.max(MIN_MAGNITUDE).log10()
}

fn blackman_value(index: usize, len: usize) -> f32 {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    let x = index as f32 / len as f32;
    a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
}
