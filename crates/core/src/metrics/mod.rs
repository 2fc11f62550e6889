//! Pure per-frame metric extraction.
//!
//! Every function here is a deterministic function of its input buffer: the
//! same buffer always yields the same output and nothing is cached between
//! calls.

use serde::{Deserialize, Serialize};

/// Byte value representing the zero crossing of a time-domain signal.
pub const BYTE_MIDPOINT: f32 = 128.0;

/// How the waveform peak is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakMode {
    /// Largest normalised sample value. The zero line maps to 1.0, so
    /// silence reads as 1.0 and a DC offset shifts the result.
    #[default]
    Literal,
    /// Largest distance from the zero line (`|v - 1.0|`). Thresholds tuned
    /// for [`PeakMode::Literal`] must be lowered by 1.0 to keep meaning.
    Deviation,
}

/// Normalises one time-domain byte so that the zero line sits at 1.0.
#[inline]
pub fn normalize_sample(sample: u8) -> f32 {
    sample as f32 / BYTE_MIDPOINT
}

/// Peak amplitude of a time-domain byte buffer. Empty buffers yield 0.0.
pub fn waveform_peak(buffer: &[u8], mode: PeakMode) -> f32 {
    buffer
        .iter()
        .map(|&sample| {
            let v = normalize_sample(sample);
            match mode {
                PeakMode::Literal => v.abs(),
                PeakMode::Deviation => (v - 1.0).abs(),
            }
        })
        .fold(0.0, f32::max)
}

/// Location and frequency of the loudest bin of a magnitude buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectrumPeak {
    pub bin: usize,
    pub magnitude: u8,
    pub frequency_hz: u32,
}

/// Centre frequency of `bin` for the given transform.
pub fn bin_frequency(bin: usize, sample_rate: u32, transform_size: usize) -> f32 {
    if transform_size == 0 {
        return 0.0;
    }
    bin as f32 * (sample_rate as f32 / transform_size as f32)
}

/// Scans a byte magnitude buffer for its loudest bin.
///
/// Ties resolve to the lowest bin. A buffer with no non-zero magnitude
/// reports bin 0 at 0 Hz.
pub fn spectrum_peak(buffer: &[u8], sample_rate: u32, transform_size: usize) -> SpectrumPeak {
    let mut peak = SpectrumPeak::default();
    for (bin, &magnitude) in buffer.iter().enumerate() {
        if magnitude > peak.magnitude {
            peak.bin = bin;
            peak.magnitude = magnitude;
        }
    }
    peak.frequency_hz = bin_frequency(peak.bin, sample_rate, transform_size).round() as u32;
    peak
}

/// First difference of a spectrum together with its largest magnitude.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Derivative {
    pub values: Vec<f32>,
    pub peak: f32,
}

/// Computes `buffer[i + 1] - buffer[i]` for every adjacent pair.
pub fn first_difference(buffer: &[f32]) -> Derivative {
    let mut values = vec![0.0; buffer.len().saturating_sub(1)];
    let peak = first_difference_into(buffer, &mut values);
    Derivative { values, peak }
}

/// Allocation-free variant of [`first_difference`] used by the render loop.
///
/// Writes `min(out.len(), buffer.len() - 1)` values and returns the peak
/// absolute difference over them. Buffers of length one or less yield 0.0.
pub fn first_difference_into(buffer: &[f32], out: &mut [f32]) -> f32 {
    let mut peak = 0.0_f32;
    for (slot, pair) in out.iter_mut().zip(buffer.windows(2)) {
        let delta = pair[1] - pair[0];
        *slot = delta;
        peak = peak.max(delta.abs());
    }
    peak
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_reads_as_unit_baseline() {
        for len in [1, 2, 17, 1024] {
            let buffer = vec![128_u8; len];
            assert_eq!(waveform_peak(&buffer, PeakMode::Literal), 1.0);
        }
    }

    #[test]
    fn single_full_scale_sample_sets_peak() {
        let mut buffer = vec![128_u8; 1024];
        buffer[511] = 255;
        assert_eq!(waveform_peak(&buffer, PeakMode::Literal), 255.0 / 128.0);
    }

    #[test]
    fn deviation_mode_measures_distance_from_zero_line() {
        let mut buffer = vec![128_u8; 64];
        assert_eq!(waveform_peak(&buffer, PeakMode::Deviation), 0.0);
        buffer[3] = 0;
        assert_eq!(waveform_peak(&buffer, PeakMode::Deviation), 1.0);
    }

    #[test]
    fn waveform_peak_is_monotonic_in_extremum() {
        let mut buffer = vec![128_u8; 32];
        let mut last = waveform_peak(&buffer, PeakMode::Literal);
        for value in 129..=255_u8 {
            buffer[7] = value;
            let peak = waveform_peak(&buffer, PeakMode::Literal);
            assert!(peak >= last);
            last = peak;
        }
    }

    #[test]
    fn empty_waveform_yields_zero() {
        assert_eq!(waveform_peak(&[], PeakMode::Literal), 0.0);
    }

    #[test]
    fn spectrum_peak_converts_bin_to_hz() {
        let mut buffer = vec![0_u8; 1024];
        buffer[100] = 200;
        let peak = spectrum_peak(&buffer, 44_100, 2048);
        assert_eq!(peak.bin, 100);
        assert_eq!(peak.magnitude, 200);
        assert_eq!(peak.frequency_hz, 2153);
    }

    #[test]
    fn spectrum_ties_resolve_to_lowest_bin() {
        let mut buffer = vec![10_u8; 64];
        buffer[5] = 90;
        buffer[40] = 90;
        assert_eq!(spectrum_peak(&buffer, 48_000, 128).bin, 5);
    }

    #[test]
    fn silent_spectrum_reports_dc() {
        let peak = spectrum_peak(&[0_u8; 16], 48_000, 32);
        assert_eq!(peak, SpectrumPeak::default());
    }

    #[test]
    fn first_difference_of_single_sample_is_empty() {
        let derivative = first_difference(&[-42.0]);
        assert!(derivative.values.is_empty());
        assert_eq!(derivative.peak, 0.0);
        assert_eq!(first_difference(&[]), Derivative::default());
    }

    #[test]
    fn first_difference_of_constant_buffer_is_flat() {
        let derivative = first_difference(&[-60.0; 9]);
        assert_eq!(derivative.values, vec![0.0; 8]);
        assert_eq!(derivative.peak, 0.0);
    }

    #[test]
    fn first_difference_tracks_largest_step() {
        let derivative = first_difference(&[0.0, 2.0, -3.0, -2.5]);
        assert_eq!(derivative.values, vec![2.0, -5.0, 0.5]);
        assert_eq!(derivative.peak, 5.0);
    }

    #[test]
    fn extractors_are_idempotent() {
        let bytes: Vec<u8> = (0..256).map(|i| ((i * 37) % 256) as u8).collect();
        let floats: Vec<f32> = bytes.iter().map(|&b| b as f32 - 100.0).collect();

        assert_eq!(
            waveform_peak(&bytes, PeakMode::Literal),
            waveform_peak(&bytes, PeakMode::Literal)
        );
        assert_eq!(
            spectrum_peak(&bytes, 44_100, 512),
            spectrum_peak(&bytes, 44_100, 512)
        );
        assert_eq!(first_difference(&floats), first_difference(&floats));
    }
}
