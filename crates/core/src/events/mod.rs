//! Append-only event trail shown to operators.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_channel as cb;
use serde::{Deserialize, Serialize};

/// Identifies the component an event is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSource {
    pub id: &'static str,
    pub label: &'static str,
}

pub const MICROPHONE: EventSource = EventSource {
    id: "MIC-01",
    label: "Main microphone",
};

pub const SIGNAL_PROCESSOR: EventSource = EventSource {
    id: "PROC-01",
    label: "Signal processor",
};

pub const EXPORTER: EventSource = EventSource {
    id: "EXP-01",
    label: "Export module",
};

/// Immutable record of something notable that happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub message: String,
    pub source_id: String,
    pub source_label: String,
}

impl Event {
    pub fn now(message: impl Into<String>, source_id: impl Into<String>, source_label: impl Into<String>) -> Self {
        Self {
            timestamp_ms: unix_millis(),
            message: message.into(),
            source_id: source_id.into(),
            source_label: source_label.into(),
        }
    }

    pub fn from_source(message: impl Into<String>, source: EventSource) -> Self {
        Self::now(message, source.id, source.label)
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.timestamp_ms, self.source_id, self.source_label, self.message
        )
    }
}

/// Destination for events raised anywhere in the pipeline.
pub trait EventSink {
    fn append(&mut self, message: &str, source_id: &str, source_label: &str);

    fn record(&mut self, message: &str, source: EventSource) {
        self.append(message, source.id, source.label);
    }
}

/// Owned newest-first event log.
///
/// Appends from other threads go through an [`EventSender`]; they are queued
/// on a single channel and folded into the log, in arrival order, by
/// [`EventLog::drain_pending`].
#[derive(Debug)]
pub struct EventLog {
    events: VecDeque<Event>,
    tx: cb::Sender<Event>,
    rx: cb::Receiver<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        let (tx, rx) = cb::unbounded();
        Self {
            events: VecDeque::new(),
            tx,
            rx,
        }
    }

    pub fn push(&mut self, event: Event) {
        tracing::info!(
            source = %event.source_id,
            message = %event.message,
            "event recorded"
        );
        self.events.push_front(event);
    }

    /// Returns a handle other threads can use to append events.
    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Moves queued cross-thread events into the log. Returns how many moved.
    pub fn drain_pending(&mut self) -> usize {
        let mut moved = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.push(event);
            moved += 1;
        }
        moved
    }

    /// Events, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn latest(&self) -> Option<&Event> {
        self.events.front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for EventLog {
    fn append(&mut self, message: &str, source_id: &str, source_label: &str) {
        self.push(Event::now(message, source_id, source_label));
    }
}

/// Cloneable, thread-safe append handle for an [`EventLog`].
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: cb::Sender<Event>,
}

impl EventSender {
    pub fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::warn!("event log dropped; discarding event");
        }
    }
}

impl EventSink for EventSender {
    fn append(&mut self, message: &str, source_id: &str, source_label: &str) {
        self.send(Event::now(message, source_id, source_label));
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_keeps_newest_first() {
        let mut log = EventLog::new();
        log.record("first", MICROPHONE);
        log.record("second", SIGNAL_PROCESSOR);

        let messages: Vec<_> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["second", "first"]);
        assert_eq!(log.latest().unwrap().source_id, "PROC-01");
    }

    #[test]
    fn cross_thread_appends_arrive_in_order() {
        let mut log = EventLog::new();
        let sender = log.sender();

        std::thread::spawn(move || {
            let mut sender = sender;
            sender.record("a", MICROPHONE);
            sender.record("b", MICROPHONE);
        })
        .join()
        .unwrap();

        assert!(log.is_empty());
        assert_eq!(log.drain_pending(), 2);
        let messages: Vec<_> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["b", "a"]);
    }

    #[test]
    fn events_carry_attribution() {
        let event = Event::from_source("Results exported", EXPORTER);
        assert_eq!(event.source_id, "EXP-01");
        assert_eq!(event.source_label, "Export module");
        assert!(event.timestamp_ms > 0);
        assert!(event.to_string().contains("Results exported"));
    }
}
