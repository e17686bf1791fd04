//! Progress events
//!
//! The loop and the orchestrator never print. They emit [`ProgressEvent`]s
//! into an injected [`EventSink`]; rendering is the caller's business.

pub mod types;

pub use types::ProgressEvent;

use std::sync::Mutex;

/// Receiver of progress events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, event: ProgressEvent) {
        tracing::trace!(event = event.event_type(), "Event dropped");
    }
}

/// Keeps every event in memory, in emission order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of recorded events of the given type
    pub fn count(&self, event_type: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.emit(ProgressEvent::AttemptStarted {
            unit: "a".to_string(),
            attempt: 0,
        });
        sink.emit(ProgressEvent::WorkingCopyReloaded {
            unit: "a".to_string(),
            attempt: 0,
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type(), "working_copy_reloaded");
        assert_eq!(sink.count("attempt_started"), 1);
    }
}
