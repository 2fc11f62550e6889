use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ChartKind, EventTrigger, MonitorError, PeakMode, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analyser: AnalyserConfig,
    pub view: ViewConfig,
    pub classifier: ClassifierConfig,
    pub controls: ControlsConfig,
    pub synthetic: SyntheticConfig,
    pub refresh: RefreshConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.analyser.validate()?;
        if self.view.base_width == 0 || self.view.base_height == 0 {
            return Err(MonitorError::InvalidInput(
                "view dimensions must be non-zero",
            ));
        }
        if !self.classifier.irregular_threshold.is_finite() {
            return Err(MonitorError::InvalidInput(
                "irregular threshold must be finite",
            ));
        }
        if self.refresh.rate_hz == 0 {
            return Err(MonitorError::InvalidInput("refresh rate must be non-zero"));
        }
        Ok(())
    }
}

/// Settings for the analysis node that feeds every view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    pub sample_rate: u32,
    /// Transform window length. The views see half of it as bins.
    pub transform_size: usize,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            transform_size: 2048,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AnalyserConfig {
    pub const MIN_TRANSFORM_SIZE: usize = 32;
    pub const MAX_TRANSFORM_SIZE: usize = 32_768;

    pub fn frequency_bin_count(&self) -> usize {
        self.transform_size / 2
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(MonitorError::InvalidInput("sample rate must be non-zero"));
        }
        if !self.transform_size.is_power_of_two()
            || self.transform_size < Self::MIN_TRANSFORM_SIZE
            || self.transform_size > Self::MAX_TRANSFORM_SIZE
        {
            return Err(MonitorError::InvalidInput(
                "transform size must be a power of two between 32 and 32768",
            ));
        }
        if !(0.0..1.0).contains(&self.smoothing_time_constant) {
            return Err(MonitorError::InvalidInput(
                "smoothing time constant must lie in [0, 1)",
            ));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(MonitorError::InvalidInput(
                "min decibels must be below max decibels",
            ));
        }
        Ok(())
    }
}

/// Base surface size shared by the three views before zoom is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub base_width: u32,
    pub base_height: u32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            base_width: 600,
            base_height: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub irregular_threshold: f32,
    pub trigger: EventTrigger,
    pub peak_mode: PeakMode,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            irregular_threshold: 1.6,
            trigger: EventTrigger::Level,
            peak_mode: PeakMode::Literal,
        }
    }
}

/// Initial state of the control surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub chart_kind: ChartKind,
    pub sensitivity: u8,
    pub auto_detect: bool,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            chart_kind: ChartKind::Line,
            sensitivity: 50,
            auto_detect: true,
        }
    }
}

/// Test-tone generator used when no input device is wired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub frequency_hz: f32,
    pub amplitude: f32,
    /// Amplitude used during bursts. Values above 0.6 cross the default
    /// irregular threshold.
    pub burst_amplitude: f32,
    /// Time between burst starts; zero disables bursts.
    pub burst_period_ms: u64,
    pub burst_length_ms: u64,
    /// Samples produced per generator iteration.
    pub block_size: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 440.0,
            amplitude: 0.3,
            burst_amplitude: 0.9,
            burst_period_ms: 2_000,
            burst_length_ms: 250,
            block_size: 256,
        }
    }
}

/// Display refresh emulated by the host's frame pacer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub rate_hz: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { rate_hz: 60 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_pipeline() {
        let config = AppConfig::default();
        assert_eq!(config.analyser.transform_size, 2048);
        assert_eq!(config.analyser.frequency_bin_count(), 1024);
        assert_eq!(config.view.base_width, 600);
        assert_eq!(config.view.base_height, 300);
        assert_eq!(config.classifier.irregular_threshold, 1.6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "analyser": { "sample_rate": 48000 } }"#).unwrap();
        assert_eq!(config.analyser.sample_rate, 48_000);
        assert_eq!(config.analyser.transform_size, 2048);
        assert_eq!(config.controls.sensitivity, 50);
    }

    #[test]
    fn rejects_non_power_of_two_transform() {
        let mut config = AppConfig::default();
        config.analyser.transform_size = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_decibel_range() {
        let mut config = AppConfig::default();
        config.analyser.min_decibels = -20.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn json_round_trip_preserves_enums() {
        let mut config = AppConfig::default();
        config.controls.chart_kind = ChartKind::Bar;
        config.classifier.trigger = EventTrigger::Edge;
        let json = config.to_json().unwrap();
        assert!(json.contains("\"bar\""));
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
