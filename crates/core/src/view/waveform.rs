use crate::{
    analysis::SampleSource,
    metrics::{normalize_sample, waveform_peak},
    render::{Color, DrawCommand, Point, Surface},
};

use super::{DrawStrategy, FrameContext, Metric, ViewKind};

/// Time-domain trace. Its amplitude metric drives the process classifier.
#[derive(Debug, Default)]
pub struct WaveformStrategy {
    buffer: Vec<u8>,
    points: Vec<Point>,
}

impl WaveformStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DrawStrategy for WaveformStrategy {
    fn kind(&self) -> ViewKind {
        ViewKind::Waveform
    }

    fn draw(
        &mut self,
        source: &mut dyn SampleSource,
        surface: &mut dyn Surface,
        frame: &FrameContext,
    ) -> Metric {
        let len = source.frequency_bin_count();
        self.buffer.resize(len, 128);
        source.time_domain_bytes(&mut self.buffer);

        let FrameContext {
            zoom,
            width,
            height,
            ..
        } = *frame;

        surface.submit(DrawCommand::Clear {
            color: Color::WHITE,
        });

        self.points.clear();
        if len > 0 {
            let slice_width = width / len as f32;
            let mut x = 0.0;
            for &sample in &self.buffer {
                let y = normalize_sample(sample) * height / 2.0;
                self.points.push(Point::new(x, y));
                x += slice_width;
            }
            self.points.push(Point::new(width, height / 2.0));
            surface.submit(DrawCommand::Polyline {
                points: self.points.clone(),
                stroke: Color::BLACK,
                line_width: 2.0 * zoom,
            });
        }

        let peak = waveform_peak(&self.buffer, frame.peak_mode);

        let font = 12.0 * zoom;
        surface.text(10.0, 20.0 * zoom, &format!("Max: {peak:.2}"), font);
        surface.text(10.0, height / 2.0, "0", font);
        surface.text(10.0, 20.0 * zoom, "+1", font);
        surface.text(10.0, height - 10.0, "-1", font);

        Metric::Amplitude(peak)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metrics::PeakMode,
        render::DrawList,
        view::{fixtures::FixedSource, ChartKind},
    };

    fn frame(zoom: f32) -> FrameContext {
        FrameContext {
            zoom,
            width: 600.0 * zoom,
            height: 300.0 * zoom,
            chart_kind: ChartKind::Line,
            peak_mode: PeakMode::Literal,
        }
    }

    fn polyline(surface: &DrawList) -> &[Point] {
        surface
            .commands()
            .iter()
            .find_map(|command| match command {
                DrawCommand::Polyline { points, .. } => Some(points.as_slice()),
                _ => None,
            })
            .expect("waveform draws a polyline")
    }

    #[test]
    fn silence_draws_centre_line_and_reports_baseline() {
        let mut strategy = WaveformStrategy::new();
        let mut source = FixedSource::silent(4);
        let mut surface = DrawList::new();
        surface.resize(600.0, 300.0);

        let metric = strategy.draw(&mut source, &mut surface, &frame(1.0));

        assert_eq!(metric, Metric::Amplitude(1.0));
        assert_eq!(
            surface.commands()[0],
            DrawCommand::Clear {
                color: Color::WHITE
            }
        );
        let points = polyline(&surface);
        assert_eq!(points.len(), 5);
        assert_eq!(points[1], Point::new(150.0, 150.0));
        assert!(points.iter().all(|p| p.y == 150.0));
        assert_eq!(*points.last().unwrap(), Point::new(600.0, 150.0));
    }

    #[test]
    fn labels_scale_with_zoom() {
        let mut strategy = WaveformStrategy::new();
        let mut source = FixedSource::silent(8);
        source.time[2] = 255;
        let mut surface = DrawList::new();

        let metric = strategy.draw(&mut source, &mut surface, &frame(2.0));

        assert_eq!(metric.amplitude(), Some(255.0 / 128.0));
        let labels: Vec<_> = surface.labels().collect();
        assert_eq!(labels, vec!["Max: 1.99", "0", "+1", "-1"]);
        match surface.commands().last() {
            Some(DrawCommand::Text { y, size, .. }) => {
                assert_eq!(*y, 590.0);
                assert_eq!(*size, 24.0);
            }
            other => panic!("expected label, got {other:?}"),
        }
    }
}
