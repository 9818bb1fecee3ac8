//! Listener registry for session events.
//!
//! Listeners are registered per event kind; all listeners for a kind run on
//! every emit, and a panicking listener is isolated so it cannot starve the
//! others.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

use pitchside_shared::protocol::ServerMsg;

use crate::session::SessionState;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Transport established and welcome flow can begin
    Connected,
    /// Transport dropped, cleanly or not
    Closed,
    Error(String),
    StateChanged(SessionState),
    /// Any decoded server message, including room broadcasts
    Message(ServerMsg),
    /// Heartbeat round-trip measurement
    Latency { rtt_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Closed,
    Error,
    StateChanged,
    Message,
    Latency,
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::Connected => EventKind::Connected,
            SessionEvent::Closed => EventKind::Closed,
            SessionEvent::Error(_) => EventKind::Error,
            SessionEvent::StateChanged(_) => EventKind::StateChanged,
            SessionEvent::Message(_) => EventKind::Message,
            SessionEvent::Latency { .. } => EventKind::Latency,
        }
    }
}

type Listener = Box<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, kind: EventKind, listener: impl Fn(&SessionEvent) + Send + Sync + 'static) {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.entry(kind).or_default().push(Box::new(listener));
    }

    pub fn emit(&self, event: &SessionEvent) {
        let listeners = self.listeners.lock().unwrap();
        let Some(registered) = listeners.get(&event.kind()) else {
            return;
        };
        for listener in registered {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!(kind = ?event.kind(), "event listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn all_listeners_for_a_kind_run() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));
        for _ in 0..3 {
            let count = count.clone();
            bus.on(EventKind::Connected, move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        bus.emit(&SessionEvent::Connected);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn listeners_only_see_their_kind() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));
        let seen = count.clone();
        bus.on(EventKind::Closed, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(&SessionEvent::Connected);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        bus.emit(&SessionEvent::Closed);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_does_not_starve_the_rest() {
        let bus = EventBus::new();
        bus.on(EventKind::Error, |_| panic!("listener bug"));
        let count = Arc::new(AtomicU32::new(0));
        let seen = count.clone();
        bus.on(EventKind::Error, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&SessionEvent::Error("boom".to_string()));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // The bus stays usable afterwards.
        bus.emit(&SessionEvent::Error("again".to_string()));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn event_payload_reaches_listener() {
        let bus = EventBus::new();
        let rtt = Arc::new(AtomicU32::new(0));
        let seen = rtt.clone();
        bus.on(EventKind::Latency, move |event| {
            if let SessionEvent::Latency { rtt_ms } = event {
                seen.store(*rtt_ms as u32, Ordering::SeqCst);
            }
        });
        bus.emit(&SessionEvent::Latency { rtt_ms: 42 });
        assert_eq!(rtt.load(Ordering::SeqCst), 42);
    }
}
