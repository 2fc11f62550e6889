//! Core library for the Acoustic Monitor.
//!
//! A live audio stream is analysed once per display refresh and drawn by
//! three views (waveform, spectrum, spectral derivative). The waveform's
//! peak amplitude feeds a threshold classifier whose state changes end up in
//! an event log. Each module owns one stage of that pipeline; [`Monitor`]
//! wires them together for a host that owns the refresh timer.

pub mod analysis;
pub mod capture;
pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod monitor;
pub mod render;
pub mod scheduler;
pub mod view;

pub use analysis::{Analyser, SampleSource, SharedAnalyser};
#[cfg(feature = "device")]
pub use capture::DeviceCapture;
pub use capture::{Capture, CaptureHandle, Liveness, SyntheticCapture, SyntheticSignal};
pub use classifier::{Classification, EventTrigger, ProcessClassifier, ProcessState};
pub use config::{
    AnalyserConfig, AppConfig, ClassifierConfig, ControlsConfig, RefreshConfig, SyntheticConfig,
    ViewConfig,
};
pub use error::{CaptureError, MonitorError, Result};
pub use events::{Event, EventLog, EventSender, EventSink};
pub use metrics::{Derivative, PeakMode, SpectrumPeak};
pub use monitor::{Controls, FrameReport, Monitor};
pub use render::{Color, DrawCommand, DrawList, Point, Surface};
pub use scheduler::{FrameScheduler, FrameTask, RefreshPacer};
pub use view::{ChartKind, DrawStrategy, Layout, Metric, ScopedView, ViewKind, ZoomLevel};
