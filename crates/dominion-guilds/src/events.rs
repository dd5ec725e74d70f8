//! Event sink abstraction.
//!
//! The conquest and diplomacy engines publish [`ConquestEvent`]s to an
//! [`EventSink`] and never wait on the result. [`EventLog`] buffers events in
//! memory; [`NullSink`] drops them.

use dominion_types::ConquestEvent;

/// Receives simulation notifications. Fire-and-forget.
pub trait EventSink {
    /// Deliver one event.
    fn publish(&mut self, event: ConquestEvent);
}

/// Buffers published events in order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<ConquestEvent>,
}

impl EventLog {
    /// Create an empty log.
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Events published so far.
    pub fn events(&self) -> &[ConquestEvent] {
        &self.events
    }

    /// Take every buffered event, leaving the log empty.
    pub fn drain(&mut self) -> Vec<ConquestEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are buffered.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for EventLog {
    fn publish(&mut self, event: ConquestEvent) {
        self.events.push(event);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&mut self, _event: ConquestEvent) {}
}
