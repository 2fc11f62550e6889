//! The three scoped views and the state they share.
//!
//! A [`ScopedView`] owns everything a view needs across frames (zoom,
//! surface, latest metric) and delegates the per-frame drawing to a
//! [`DrawStrategy`]. Waveform, spectrum and derivative are the three
//! strategies.

mod derivative;
mod spectrum;
mod waveform;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    analysis::SampleSource,
    metrics::PeakMode,
    render::{DrawList, Surface},
};

pub use derivative::DerivativeStrategy;
pub use spectrum::SpectrumStrategy;
pub use waveform::WaveformStrategy;

/// Display height of an expanded view, in layout pixels.
pub const EXPANDED_DISPLAY_HEIGHT: u32 = 600;
/// Display height of a collapsed view, in layout pixels.
pub const COLLAPSED_DISPLAY_HEIGHT: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Waveform,
    Spectrum,
    Derivative,
}

impl ViewKind {
    pub const ALL: [ViewKind; 3] = [ViewKind::Waveform, ViewKind::Spectrum, ViewKind::Derivative];

    pub fn id(self) -> &'static str {
        match self {
            ViewKind::Waveform => "waveform",
            ViewKind::Spectrum => "spectrum",
            ViewKind::Derivative => "derivative",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ViewKind::Waveform => "Real-time audio signal",
            ViewKind::Spectrum => "Frequency spectrum",
            ViewKind::Derivative => "Fourier derivative",
        }
    }

    /// Metric shown before the first frame is drawn.
    pub fn idle_metric(self) -> Metric {
        match self {
            ViewKind::Waveform => Metric::Amplitude(0.0),
            ViewKind::Spectrum => Metric::PeakFrequency {
                hz: 0,
                magnitude: 0,
            },
            ViewKind::Derivative => Metric::PeakDerivative(0.0),
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// How the spectrum view draws its bins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Line,
    Bar,
}

/// Per-frame scalar reported by a view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Metric {
    /// Waveform peak in normalised units (zero line at 1.0).
    Amplitude(f32),
    PeakFrequency { hz: u32, magnitude: u8 },
    /// Largest spectral step, in dB per bin.
    PeakDerivative(f32),
}

impl Metric {
    pub fn amplitude(&self) -> Option<f32> {
        match self {
            Metric::Amplitude(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Amplitude(value) => write!(f, "Max value: {value:.2}"),
            Metric::PeakFrequency { hz, .. } => write!(f, "Peak frequency: {hz}Hz"),
            Metric::PeakDerivative(value) => write!(f, "Max derivative: {value:.2}"),
        }
    }
}

/// Magnification of a view, 1.0 to 3.0 in steps of 0.5.
///
/// Stored as a step count so the factor is always one of the five allowed
/// values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZoomLevel {
    step: u8,
}

impl ZoomLevel {
    pub const MIN: ZoomLevel = ZoomLevel { step: 0 };
    pub const MAX: ZoomLevel = ZoomLevel { step: 4 };
    pub const STEP: f32 = 0.5;

    pub fn factor(self) -> f32 {
        1.0 + Self::STEP * self.step as f32
    }

    pub fn zoom_in(self) -> Self {
        Self {
            step: (self.step + 1).min(Self::MAX.step),
        }
    }

    pub fn zoom_out(self) -> Self {
        Self {
            step: self.step.saturating_sub(1),
        }
    }

    pub fn can_zoom_in(self) -> bool {
        self < Self::MAX
    }

    pub fn can_zoom_out(self) -> bool {
        self > Self::MIN
    }
}

impl fmt::Display for ZoomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.factor())
    }
}

/// Process-wide expand/collapse state. At most one view is expanded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Layout {
    expanded: Option<ViewKind>,
}

impl Layout {
    /// Expands `kind`, or collapses it when it is already the expanded view.
    pub fn toggle(&mut self, kind: ViewKind) -> Option<ViewKind> {
        self.expanded = if self.expanded == Some(kind) {
            None
        } else {
            Some(kind)
        };
        self.expanded
    }

    pub fn expanded(&self) -> Option<ViewKind> {
        self.expanded
    }

    pub fn is_expanded(&self, kind: ViewKind) -> bool {
        self.expanded == Some(kind)
    }

    pub fn display_height(&self, kind: ViewKind) -> u32 {
        if self.is_expanded(kind) {
            EXPANDED_DISPLAY_HEIGHT
        } else {
            COLLAPSED_DISPLAY_HEIGHT
        }
    }
}

/// Everything a strategy needs to know about the frame it draws.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub zoom: f32,
    pub width: f32,
    pub height: f32,
    pub chart_kind: ChartKind,
    pub peak_mode: PeakMode,
}

/// Per-view drawing behaviour.
pub trait DrawStrategy: Send {
    fn kind(&self) -> ViewKind;

    /// Reads this frame's buffer from `source`, draws it and returns the
    /// frame's metric.
    fn draw(
        &mut self,
        source: &mut dyn SampleSource,
        surface: &mut dyn Surface,
        frame: &FrameContext,
    ) -> Metric;
}

/// A view with its own zoom, surface and draw strategy.
pub struct ScopedView {
    strategy: Box<dyn DrawStrategy>,
    zoom: ZoomLevel,
    base_width: u32,
    base_height: u32,
    surface: DrawList,
    dirty: bool,
    metric: Option<Metric>,
}

impl ScopedView {
    pub fn new(strategy: Box<dyn DrawStrategy>, base_width: u32, base_height: u32) -> Self {
        Self {
            strategy,
            zoom: ZoomLevel::default(),
            base_width,
            base_height,
            surface: DrawList::new(),
            dirty: true,
            metric: None,
        }
    }

    pub fn waveform(base_width: u32, base_height: u32) -> Self {
        Self::new(Box::new(WaveformStrategy::new()), base_width, base_height)
    }

    pub fn spectrum(base_width: u32, base_height: u32) -> Self {
        Self::new(Box::new(SpectrumStrategy::new()), base_width, base_height)
    }

    pub fn derivative(base_width: u32, base_height: u32) -> Self {
        Self::new(Box::new(DerivativeStrategy::new()), base_width, base_height)
    }

    pub fn kind(&self) -> ViewKind {
        self.strategy.kind()
    }

    pub fn zoom(&self) -> ZoomLevel {
        self.zoom
    }

    pub fn zoom_in(&mut self) -> ZoomLevel {
        self.set_zoom(self.zoom.zoom_in())
    }

    pub fn zoom_out(&mut self) -> ZoomLevel {
        self.set_zoom(self.zoom.zoom_out())
    }

    fn set_zoom(&mut self, zoom: ZoomLevel) -> ZoomLevel {
        if zoom != self.zoom {
            debug!(view = %self.kind(), zoom = zoom.factor(), "zoom changed");
            self.zoom = zoom;
            self.dirty = true;
        }
        self.zoom
    }

    /// Surface dimensions at the current zoom.
    pub fn dimensions(&self) -> (f32, f32) {
        let factor = self.zoom.factor();
        (
            self.base_width as f32 * factor,
            self.base_height as f32 * factor,
        )
    }

    pub fn surface(&self) -> &DrawList {
        &self.surface
    }

    pub fn metric(&self) -> Option<Metric> {
        self.metric
    }

    /// Text shown under the view, e.g. `Zoom: 1.5x | Peak frequency: 440Hz`.
    pub fn caption(&self) -> String {
        let metric = self.metric.unwrap_or_else(|| self.kind().idle_metric());
        format!("Zoom: {}x | {}", self.zoom, metric)
    }

    /// Draws one frame. Without a source nothing is drawn and no metric is
    /// reported.
    pub fn render(
        &mut self,
        source: Option<&mut dyn SampleSource>,
        chart_kind: ChartKind,
        peak_mode: PeakMode,
    ) -> Option<Metric> {
        let source = source?;

        let (width, height) = self.dimensions();
        if self.dirty {
            self.surface.resize(width, height);
            self.dirty = false;
        }
        self.surface.begin_frame();

        let frame = FrameContext {
            zoom: self.zoom.factor(),
            width,
            height,
            chart_kind,
            peak_mode,
        };
        let metric = self.strategy.draw(source, &mut self.surface, &frame);
        self.metric = Some(metric);
        Some(metric)
    }
}

impl fmt::Debug for ScopedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedView")
            .field("kind", &self.kind())
            .field("zoom", &self.zoom.factor())
            .field("metric", &self.metric)
            .finish()
    }
}
