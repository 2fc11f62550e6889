//! Composition root for the monitoring pipeline.
//!
//! [`Monitor`] owns the analyser, the three views, the classifier and the
//! event log. The host calls [`Monitor::render_frame`] once per display
//! refresh and forwards user actions (capture toggle, zoom, expand, chart
//! kind, export) to the matching methods.

use tracing::{debug, info, warn};

use crate::{
    analysis::{Analyser, SampleSource, SharedAnalyser},
    capture::{Capture, CaptureHandle},
    events::{EventLog, EventSink, EXPORTER, MICROPHONE},
    AppConfig, CaptureError, ChartKind, FrameScheduler, Layout, Metric, PeakMode, ProcessClassifier,
    ProcessState, Result, ScopedView, ViewKind,
};

pub const CAPTURE_STARTED: &str = "Recording started";
pub const CAPTURE_STOPPED: &str = "Recording stopped";
pub const CAPTURE_FAILED: &str = "Failed to start recording";
pub const RESULTS_EXPORTED: &str = "Results exported";

/// State of the control surface.
///
/// Only `chart_kind` changes what is drawn. `sensitivity` and `auto_detect`
/// are held for future threshold tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub chart_kind: ChartKind,
    sensitivity: u8,
    pub auto_detect: bool,
}

impl Controls {
    pub const MAX_SENSITIVITY: u8 = 100;

    pub fn new(chart_kind: ChartKind, sensitivity: u8, auto_detect: bool) -> Self {
        Self {
            chart_kind,
            sensitivity: sensitivity.min(Self::MAX_SENSITIVITY),
            auto_detect,
        }
    }

    pub fn sensitivity(&self) -> u8 {
        self.sensitivity
    }

    pub fn set_sensitivity(&mut self, value: u8) {
        self.sensitivity = value.min(Self::MAX_SENSITIVITY);
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::new(ChartKind::Line, 50, true)
    }
}

/// What happened during one display refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub metrics: Vec<(ViewKind, Metric)>,
    pub state: ProcessState,
    pub state_changed: bool,
    pub events_raised: usize,
}

impl FrameReport {
    pub fn metric(&self, kind: ViewKind) -> Option<Metric> {
        self.metrics
            .iter()
            .find(|(view, _)| *view == kind)
            .map(|(_, metric)| *metric)
    }
}

#[derive(Debug)]
pub struct Monitor {
    analyser: SharedAnalyser,
    capture: Option<CaptureHandle>,
    views: Vec<ScopedView>,
    scheduler: FrameScheduler,
    layout: Layout,
    controls: Controls,
    peak_mode: PeakMode,
    classifier: ProcessClassifier,
    events: EventLog,
}

impl Monitor {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let analyser = SharedAnalyser::new(Analyser::new(config.analyser.clone())?);
        let (width, height) = (config.view.base_width, config.view.base_height);

        Ok(Self {
            analyser,
            capture: None,
            views: vec![
                ScopedView::waveform(width, height),
                ScopedView::spectrum(width, height),
                ScopedView::derivative(width, height),
            ],
            scheduler: FrameScheduler::new(),
            layout: Layout::default(),
            controls: Controls::new(
                config.controls.chart_kind,
                config.controls.sensitivity,
                config.controls.auto_detect,
            ),
            peak_mode: config.classifier.peak_mode,
            classifier: ProcessClassifier::new(
                config.classifier.irregular_threshold,
                config.classifier.trigger,
            ),
            events: EventLog::new(),
        })
    }

    pub fn analyser(&self) -> &SharedAnalyser {
        &self.analyser
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.as_ref().is_some_and(CaptureHandle::is_alive)
    }

    /// Stops a handle whose source ended on its own. The capture reported
    /// the interruption itself, so no stop event is recorded.
    fn reap_ended_capture(&mut self, capture: &mut dyn Capture) {
        self.events.drain_pending();
        if self.capture.as_ref().is_some_and(|handle| !handle.is_alive()) {
            if let Some(handle) = self.capture.take() {
                info!(capture = capture.name(), "reaping ended capture");
                capture.stop(handle);
            }
        }
    }

    /// Starts `capture` and binds every view loop to it.
    ///
    /// Failures are recorded as an event and leave the monitor running
    /// without a source; the error is returned for the caller's information.
    pub fn start_capture(&mut self, capture: &mut dyn Capture) -> std::result::Result<(), CaptureError> {
        self.reap_ended_capture(capture);
        if self.is_capturing() {
            debug!("capture already running");
            return Ok(());
        }

        let handle = match capture.start(self.analyser.clone(), self.events.sender()) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(capture = capture.name(), error = %err, "failed to start capture");
                self.events.record(CAPTURE_FAILED, MICROPHONE);
                return Err(err);
            }
        };

        match self.analyser.lock() {
            Ok(mut analyser) => {
                if let Err(err) = analyser.set_sample_rate(handle.sample_rate()) {
                    warn!(error = %err, "keeping analyser sample rate");
                }
            }
            Err(err) => warn!(error = %err, "could not align analyser sample rate"),
        }

        let liveness = handle.liveness();
        for kind in ViewKind::ALL {
            self.scheduler.spawn(kind, liveness.clone());
        }
        info!(capture = capture.name(), source = %handle.description(), "capture started");
        self.capture = Some(handle);
        self.events.record(CAPTURE_STARTED, MICROPHONE);
        Ok(())
    }

    /// Stops the running capture. Does nothing when none is running.
    pub fn stop_capture(&mut self, capture: &mut dyn Capture) {
        self.reap_ended_capture(capture);
        if let Some(handle) = self.capture.take() {
            capture.stop(handle);
            self.events.record(CAPTURE_STOPPED, MICROPHONE);
        }
    }

    /// Mirrors the single start/stop button.
    pub fn toggle_capture(&mut self, capture: &mut dyn Capture) -> bool {
        self.reap_ended_capture(capture);
        if self.is_capturing() {
            self.stop_capture(capture);
        } else if let Err(err) = self.start_capture(capture) {
            debug!(error = %err, "toggle left capture stopped");
        }
        self.is_capturing()
    }

    /// Runs one display refresh for every view whose loop is alive.
    pub fn render_frame(&mut self) -> FrameReport {
        self.events.drain_pending();

        let Self {
            analyser,
            views,
            scheduler,
            controls,
            peak_mode,
            ..
        } = self;
        let (chart_kind, peak_mode) = (controls.chart_kind, *peak_mode);

        let mut metrics = Vec::with_capacity(views.len());
        scheduler.tick(|kind| {
            let Some(view) = views.iter_mut().find(|view| view.kind() == kind) else {
                return;
            };
            let mut guard = match analyser.lock() {
                Ok(guard) => guard,
                Err(err) => {
                    warn!(view = %kind, error = %err, "skipping frame");
                    return;
                }
            };
            let source: &mut dyn SampleSource = &mut *guard;
            if let Some(metric) = view.render(Some(source), chart_kind, peak_mode) {
                metrics.push((kind, metric));
            }
        });

        let mut report = FrameReport {
            state: self.classifier.state(),
            ..FrameReport::default()
        };

        let amplitude = metrics.iter().find_map(|(_, metric)| metric.amplitude());
        if let Some(amplitude) = amplitude {
            let outcome = self.classifier.observe(amplitude);
            report.state = outcome.state;
            report.state_changed = outcome.changed;
            if let Some(event) = outcome.event {
                self.events.push(event);
                report.events_raised += 1;
            }
        }

        debug!(?metrics, state = %report.state, "frame rendered");
        report.metrics = metrics;
        report
    }

    /// Records that an export was requested. No file is written.
    pub fn export_results(&mut self) {
        info!("exporting results");
        self.events.record(RESULTS_EXPORTED, EXPORTER);
    }

    pub fn view(&self, kind: ViewKind) -> Option<&ScopedView> {
        self.views.iter().find(|view| view.kind() == kind)
    }

    pub fn views(&self) -> &[ScopedView] {
        &self.views
    }

    fn view_mut(&mut self, kind: ViewKind) -> Option<&mut ScopedView> {
        self.views.iter_mut().find(|view| view.kind() == kind)
    }

    pub fn zoom_in(&mut self, kind: ViewKind) -> Option<f32> {
        self.view_mut(kind).map(|view| view.zoom_in().factor())
    }

    pub fn zoom_out(&mut self, kind: ViewKind) -> Option<f32> {
        self.view_mut(kind).map(|view| view.zoom_out().factor())
    }

    pub fn toggle_expand(&mut self, kind: ViewKind) -> Option<ViewKind> {
        let expanded = self.layout.toggle(kind);
        debug!(?expanded, "layout changed");
        expanded
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn set_chart_kind(&mut self, chart_kind: ChartKind) {
        self.controls.chart_kind = chart_kind;
    }

    pub fn set_sensitivity(&mut self, value: u8) {
        self.controls.set_sensitivity(value);
    }

    pub fn set_auto_detect(&mut self, enabled: bool) {
        self.controls.auto_detect = enabled;
    }

    pub fn state(&self) -> ProcessState {
        self.classifier.state()
    }

    /// Overrides the process state, e.g. to raise a reserved severity tier.
    pub fn assign_state(&mut self, state: ProcessState) {
        self.classifier.assign(state);
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capture::{Liveness, CAPTURE_INTERRUPTED},
        events::EventSender,
    };

    /// Capture driven by the test: samples are pushed by hand.
    struct ManualCapture {
        fail_with: Option<CaptureError>,
        stopped: usize,
        source: Option<(Liveness, EventSender)>,
    }

    impl ManualCapture {
        fn new() -> Self {
            Self {
                fail_with: None,
                stopped: 0,
                source: None,
            }
        }

        /// Ends the source from its own side, as a lost device would.
        fn end_source(&mut self, report: bool) {
            if let Some((liveness, mut events)) = self.source.take() {
                liveness.release();
                if report {
                    events.record(CAPTURE_INTERRUPTED, MICROPHONE);
                }
            }
        }
    }

    impl Capture for ManualCapture {
        fn name(&self) -> &str {
            "manual"
        }

        fn start(
            &mut self,
            analyser: SharedAnalyser,
            events: EventSender,
        ) -> std::result::Result<CaptureHandle, CaptureError> {
            if let Some(err) = self.fail_with.clone() {
                return Err(err);
            }
            let rate = analyser.lock().map(|a| a.sample_rate()).unwrap_or(44_100);
            let liveness = Liveness::new();
            self.source = Some((liveness.clone(), events));
            Ok(CaptureHandle::new("manual", rate, liveness))
        }

        fn stop(&mut self, handle: CaptureHandle) {
            self.stopped += 1;
            handle.release();
        }
    }

    fn monitor() -> Monitor {
        Monitor::new(&AppConfig::default()).unwrap()
    }

    fn messages(monitor: &Monitor) -> Vec<String> {
        monitor.events().iter().map(|e| e.message.clone()).collect()
    }

    #[test]
    fn views_stay_idle_without_capture() {
        let mut monitor = monitor();
        let report = monitor.render_frame();

        assert!(report.metrics.is_empty());
        assert_eq!(report.state, ProcessState::Normal);
        assert!(monitor
            .views()
            .iter()
            .all(|view| view.surface().commands().is_empty()));
    }

    #[test]
    fn capture_failure_is_recorded_and_non_fatal() {
        let mut monitor = monitor();
        let mut capture = ManualCapture::new();
        capture.fail_with = Some(CaptureError::PermissionDenied);

        let err = monitor.start_capture(&mut capture).unwrap_err();
        assert_eq!(err, CaptureError::PermissionDenied);
        assert!(!monitor.is_capturing());
        assert_eq!(messages(&monitor), vec![CAPTURE_FAILED]);
        assert_eq!(monitor.events().latest().unwrap().source_id, "MIC-01");

        assert!(monitor.render_frame().metrics.is_empty());
    }

    #[test]
    fn silent_capture_renders_all_views_and_stays_normal() {
        let mut monitor = monitor();
        let mut capture = ManualCapture::new();
        monitor.start_capture(&mut capture).unwrap();
        monitor.analyser().push_samples(&[0.0; 2048]).unwrap();

        let report = monitor.render_frame();

        assert_eq!(report.metrics.len(), 3);
        assert_eq!(report.metric(ViewKind::Waveform), Some(Metric::Amplitude(1.0)));
        assert_eq!(
            report.metric(ViewKind::Spectrum),
            Some(Metric::PeakFrequency {
                hz: 0,
                magnitude: 0
            })
        );
        assert_eq!(report.state, ProcessState::Normal);
        assert_eq!(report.events_raised, 0);
    }

    #[test]
    fn loud_signal_turns_state_irregular_every_frame() {
        let mut monitor = monitor();
        let mut capture = ManualCapture::new();
        monitor.start_capture(&mut capture).unwrap();

        monitor.analyser().push_samples(&[0.9; 2048]).unwrap();
        let first = monitor.render_frame();
        let second = monitor.render_frame();

        assert_eq!(first.state, ProcessState::Irregular);
        assert!(first.state_changed);
        assert!(!second.state_changed);
        assert_eq!(first.events_raised + second.events_raised, 2);

        monitor.analyser().push_samples(&[0.0; 2048]).unwrap();
        let third = monitor.render_frame();
        assert_eq!(third.state, ProcessState::Normal);
        assert_eq!(third.events_raised, 0);
    }

    #[test]
    fn stopping_capture_ends_view_loops() {
        let mut monitor = monitor();
        let mut capture = ManualCapture::new();
        monitor.start_capture(&mut capture).unwrap();
        assert_eq!(monitor.render_frame().metrics.len(), 3);

        monitor.stop_capture(&mut capture);
        assert_eq!(capture.stopped, 1);
        assert!(monitor.render_frame().metrics.is_empty());
        assert!(monitor.scheduler().tasks().is_empty());
        assert_eq!(messages(&monitor), vec![CAPTURE_STOPPED, CAPTURE_STARTED]);

        monitor.stop_capture(&mut capture);
        assert_eq!(capture.stopped, 1);
    }

    #[test]
    fn stopping_an_ended_source_records_no_stop_event() {
        let mut monitor = monitor();
        let mut capture = ManualCapture::new();
        monitor.start_capture(&mut capture).unwrap();

        capture.end_source(false);
        assert!(!monitor.is_capturing());

        monitor.stop_capture(&mut capture);
        assert_eq!(capture.stopped, 1);
        assert_eq!(messages(&monitor), vec![CAPTURE_STARTED]);
    }

    #[test]
    fn toggle_after_source_ended_restarts_with_consistent_trail() {
        let mut monitor = monitor();
        let mut capture = ManualCapture::new();
        assert!(monitor.toggle_capture(&mut capture));

        capture.end_source(true);
        assert!(monitor.toggle_capture(&mut capture));

        assert_eq!(capture.stopped, 1);
        assert_eq!(
            messages(&monitor),
            vec![CAPTURE_STARTED, CAPTURE_INTERRUPTED, CAPTURE_STARTED]
        );
        assert_eq!(monitor.render_frame().metrics.len(), 3);
    }

    #[test]
    fn toggle_capture_flips_between_running_and_stopped() {
        let mut monitor = monitor();
        let mut capture = ManualCapture::new();
        assert!(monitor.toggle_capture(&mut capture));
        assert!(!monitor.toggle_capture(&mut capture));
    }

    #[test]
    fn export_only_records_an_event() {
        let mut monitor = monitor();
        monitor.export_results();
        let latest = monitor.events().latest().unwrap();
        assert_eq!(latest.message, RESULTS_EXPORTED);
        assert_eq!(latest.source_id, "EXP-01");
    }

    #[test]
    fn zoom_and_expand_are_per_view() {
        let mut monitor = monitor();
        assert_eq!(monitor.zoom_in(ViewKind::Spectrum), Some(1.5));
        assert_eq!(monitor.zoom_out(ViewKind::Waveform), Some(1.0));
        assert_eq!(monitor.view(ViewKind::Derivative).unwrap().zoom().factor(), 1.0);

        assert_eq!(monitor.toggle_expand(ViewKind::Derivative), Some(ViewKind::Derivative));
        assert_eq!(monitor.toggle_expand(ViewKind::Waveform), Some(ViewKind::Waveform));
        assert_eq!(monitor.toggle_expand(ViewKind::Waveform), None);
    }

    #[test]
    fn controls_clamp_sensitivity() {
        let mut monitor = monitor();
        monitor.set_sensitivity(250);
        monitor.set_auto_detect(false);
        monitor.set_chart_kind(ChartKind::Bar);
        assert_eq!(monitor.controls().sensitivity(), 100);
        assert!(!monitor.controls().auto_detect);
        assert_eq!(monitor.controls().chart_kind, ChartKind::Bar);
    }

    #[test]
    fn reserved_states_can_be_assigned_externally() {
        let mut monitor = monitor();
        monitor.assign_state(ProcessState::Warning);
        assert_eq!(monitor.state(), ProcessState::Warning);
    }
}
