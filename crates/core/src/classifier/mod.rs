use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::events::{Event, SIGNAL_PROCESSOR};

pub const IRREGULAR_MESSAGE: &str = "Irregular signal detected";

/// Discrete operational state of the monitored process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    #[default]
    Normal,
    /// Reserved severity tier; no rule produces it yet.
    Warning,
    /// Reserved severity tier; no rule produces it yet.
    Critical,
    Irregular,
}

impl ProcessState {
    pub fn label(self) -> &'static str {
        match self {
            ProcessState::Normal => "Normal",
            ProcessState::Warning => "Warning",
            ProcessState::Critical => "Critical",
            ProcessState::Irregular => "Irregular",
        }
    }

    /// Colour family the status indicator uses for this state.
    pub fn tone(self) -> &'static str {
        match self {
            ProcessState::Normal => "green",
            ProcessState::Warning => "yellow",
            ProcessState::Critical => "red",
            ProcessState::Irregular => "orange",
        }
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// When the irregular event is raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventTrigger {
    /// Every frame at or above the threshold raises an event.
    #[default]
    Level,
    /// Only the frame that enters the irregular state raises an event.
    Edge,
}

/// Outcome of feeding one amplitude metric to the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub state: ProcessState,
    pub changed: bool,
    pub event: Option<Event>,
}

/// Threshold policy mapping the waveform amplitude to a [`ProcessState`].
#[derive(Debug, Clone)]
pub struct ProcessClassifier {
    state: ProcessState,
    threshold: f32,
    trigger: EventTrigger,
}

impl Default for ProcessClassifier {
    fn default() -> Self {
        Self::new(1.6, EventTrigger::Level)
    }
}

impl ProcessClassifier {
    pub fn new(threshold: f32, trigger: EventTrigger) -> Self {
        Self {
            state: ProcessState::Normal,
            threshold,
            trigger,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn trigger(&self) -> EventTrigger {
        self.trigger
    }

    pub fn observe(&mut self, amplitude: f32) -> Classification {
        let previous = self.state;
        let next = if amplitude >= self.threshold {
            ProcessState::Irregular
        } else {
            ProcessState::Normal
        };
        self.state = next;

        let changed = previous != next;
        if changed {
            info!(from = %previous, to = %next, amplitude, "process state changed");
        } else {
            debug!(state = %next, amplitude, "process state held");
        }

        let raise = next == ProcessState::Irregular
            && match self.trigger {
                EventTrigger::Level => true,
                EventTrigger::Edge => changed,
            };

        Classification {
            state: next,
            changed,
            event: raise.then(|| Event::from_source(IRREGULAR_MESSAGE, SIGNAL_PROCESSOR)),
        }
    }

    /// Sets the state directly. The next observed metric overrides it again.
    pub fn assign(&mut self, state: ProcessState) {
        if self.state != state {
            info!(from = %self.state, to = %state, "process state assigned");
        }
        self.state = state;
    }

    pub fn reset(&mut self) {
        self.state = ProcessState::Normal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEQUENCE: [f32; 5] = [1.0, 1.59, 1.6, 1.61, 0.9];

    fn run(classifier: &mut ProcessClassifier) -> (Vec<ProcessState>, usize) {
        let mut states = Vec::new();
        let mut events = 0;
        for metric in SEQUENCE {
            let outcome = classifier.observe(metric);
            states.push(outcome.state);
            events += outcome.event.iter().count();
        }
        (states, events)
    }

    #[test]
    fn level_trigger_fires_on_every_qualifying_frame() {
        let mut classifier = ProcessClassifier::default();
        let (states, events) = run(&mut classifier);

        use ProcessState::*;
        assert_eq!(states, vec![Normal, Normal, Irregular, Irregular, Normal]);
        assert_eq!(events, 2);
    }

    #[test]
    fn edge_trigger_fires_on_entry_only() {
        let mut classifier = ProcessClassifier::new(1.6, EventTrigger::Edge);
        let (states, events) = run(&mut classifier);

        assert_eq!(states[3], ProcessState::Irregular);
        assert_eq!(events, 1);
    }

    #[test]
    fn irregular_event_is_attributed_to_signal_processor() {
        let mut classifier = ProcessClassifier::default();
        let event = classifier.observe(2.0).event.expect("event expected");
        assert_eq!(event.message, IRREGULAR_MESSAGE);
        assert_eq!(event.source_id, "PROC-01");
    }

    #[test]
    fn staying_normal_emits_nothing() {
        let mut classifier = ProcessClassifier::default();
        let outcome = classifier.observe(1.0);
        assert!(!outcome.changed);
        assert!(outcome.event.is_none());
    }

    #[test]
    fn reserved_states_can_be_assigned() {
        let mut classifier = ProcessClassifier::default();
        classifier.assign(ProcessState::Critical);
        assert_eq!(classifier.state(), ProcessState::Critical);

        let outcome = classifier.observe(1.0);
        assert!(outcome.changed);
        assert_eq!(outcome.state, ProcessState::Normal);
    }

    #[test]
    fn states_have_display_labels() {
        assert_eq!(ProcessState::Irregular.to_string(), "Irregular");
        assert_eq!(ProcessState::Warning.tone(), "yellow");
    }
}
