use crate::{
    analysis::SampleSource,
    metrics::spectrum_peak,
    render::{Color, DrawCommand, Point, Surface},
};

use super::{ChartKind, DrawStrategy, FrameContext, Metric, ViewKind};

/// Bar width in slices. Bars overlap, so only the lower bins fit on the
/// surface.
const BAR_WIDTH_FACTOR: f32 = 2.5;
const BAR_GAP: f32 = 1.0;

/// Byte-domain magnitude spectrum, drawn as hue-cycled bars or one line.
#[derive(Debug, Default)]
pub struct SpectrumStrategy {
    buffer: Vec<u8>,
}

impl SpectrumStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DrawStrategy for SpectrumStrategy {
    fn kind(&self) -> ViewKind {
        ViewKind::Spectrum
    }

    fn draw(
        &mut self,
        source: &mut dyn SampleSource,
        surface: &mut dyn Surface,
        frame: &FrameContext,
    ) -> Metric {
        let len = source.frequency_bin_count();
        self.buffer.resize(len, 0);
        source.frequency_bytes(&mut self.buffer);

        let FrameContext {
            zoom,
            width,
            height,
            chart_kind,
            ..
        } = *frame;

        surface.submit(DrawCommand::Clear {
            color: Color::WHITE,
        });

        if len > 0 {
            let bar_width = (width / len as f32) * BAR_WIDTH_FACTOR;
            let mut line = Vec::with_capacity(if chart_kind == ChartKind::Line { len } else { 0 });
            let mut x = 0.0;

            for (i, &magnitude) in self.buffer.iter().enumerate() {
                let bar_height = magnitude as f32 * zoom;
                match chart_kind {
                    ChartKind::Bar => {
                        let hue = i as f32 / len as f32 * 360.0;
                        surface.submit(DrawCommand::Rect {
                            x,
                            y: height - bar_height,
                            width: bar_width,
                            height: bar_height,
                            fill: Color::Hsl(hue, 70.0, 50.0),
                        });
                    }
                    ChartKind::Line => line.push(Point::new(x, height - bar_height)),
                }
                x += bar_width + BAR_GAP;
            }

            if chart_kind == ChartKind::Line {
                surface.submit(DrawCommand::Polyline {
                    points: line,
                    stroke: Color::ACCENT,
                    line_width: 2.0 * zoom,
                });
            }
        }

        let sample_rate = source.sample_rate();
        let peak = spectrum_peak(&self.buffer, sample_rate, source.transform_size());

        let font = 12.0 * zoom;
        let nyquist = (sample_rate as f32 / 2.0).round() as u32;
        surface.text(width - 50.0 * zoom, height - 10.0, &format!("{nyquist}Hz"), font);
        surface.text(10.0, height - 10.0, "0Hz", font);
        surface.text(10.0, 20.0 * zoom, &format!("{}dB", peak.magnitude), font);

        Metric::PeakFrequency {
            hz: peak.frequency_hz,
            magnitude: peak.magnitude,
        }
    }
}
