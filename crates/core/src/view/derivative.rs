use crate::{
    analysis::SampleSource,
    metrics::first_difference_into,
    render::{Color, DrawCommand, Point, Surface},
};

use super::{DrawStrategy, FrameContext, Metric, ViewKind};

/// First difference of the dB spectrum. Always drawn as a line.
#[derive(Debug, Default)]
pub struct DerivativeStrategy {
    spectrum: Vec<f32>,
    derivative: Vec<f32>,
}

impl DerivativeStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DrawStrategy for DerivativeStrategy {
    fn kind(&self) -> ViewKind {
        ViewKind::Derivative
    }

    fn draw(
        &mut self,
        source: &mut dyn SampleSource,
        surface: &mut dyn Surface,
        frame: &FrameContext,
    ) -> Metric {
        let len = source.frequency_bin_count();
        self.spectrum.resize(len, 0.0);
        self.derivative.resize(len.saturating_sub(1), 0.0);
        source.frequency_floats(&mut self.spectrum);
        let peak = first_difference_into(&self.spectrum, &mut self.derivative);

        let FrameContext {
            zoom,
            width,
            height,
            ..
        } = *frame;

        surface.submit(DrawCommand::Clear {
            color: Color::WHITE,
        });

        if !self.derivative.is_empty() {
            let slice_width = width / self.derivative.len() as f32;
            let mut x = 0.0;
            let points = self
                .derivative
                .iter()
                .map(|&delta| {
                    // A zero peak means a flat spectrum: draw the centre line.
                    let v = if peak > 0.0 {
                        (delta / peak) * 0.5 + 0.5
                    } else {
                        0.5
                    };
                    let point = Point::new(x, v * height);
                    x += slice_width;
                    point
                })
                .collect();
            surface.submit(DrawCommand::Polyline {
                points,
                stroke: Color::ACCENT,
                line_width: 2.0 * zoom,
            });
        }

        let font = 12.0 * zoom;
        surface.text(10.0, 20.0 * zoom, &format!("Max: {peak:.2}"), font);
        surface.text(10.0, height / 2.0, "0", font);
        surface.text(10.0, 20.0 * zoom, &format!("+{peak:.2}"), font);
        surface.text(10.0, height - 10.0, &format!("-{peak:.2}"), font);

        Metric::PeakDerivative(peak)
    }
}
