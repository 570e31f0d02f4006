//! Event emission system.
//!
//! Events are pushed from the daemon to UI subscribers via JSON-RPC
//! notifications. Each subscriber has an independent buffer with
//! backpressure at the configured capacity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use vala_engine::unix_now;

/// An event emitted by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event type name (e.g. "PulseDropped", "RadioStarted").
    pub event_type: String,
    /// Unix timestamp.
    pub timestamp: u64,
    /// Type-specific payload.
    pub payload: serde_json::Value,
}

impl Event {
    /// Build an event stamped with the current time.
    pub fn now(event_type: &str, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            timestamp: unix_now(),
            payload,
        }
    }
}

/// Filter for event subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Category filter: "pulse", "vote", "radio", "system".
    pub categories: Option<Vec<String>>,
    /// Filter to specific pulse ids.
    pub pulse_ids: Option<Vec<String>>,
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: Event) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Get the current sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl EventFilter {
    /// Check if an event matches this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref categories) = self.categories {
            let event_category = categorize_event(&event.event_type);
            if !categories.contains(&event_category) {
                return false;
            }
        }

        // Pulse id filter (check payload for pulse_id field)
        if let Some(ref pulse_ids) = self.pulse_ids {
            if let Some(id) = event.payload.get("pulse_id").and_then(|v| v.as_str()) {
                if !pulse_ids.iter().any(|p| p == id) {
                    return false;
                }
            }
        }

        true
    }
}

/// Categorize an event type into a category.
fn categorize_event(event_type: &str) -> String {
    match event_type {
        s if s.starts_with("Pulse") || s.starts_with("QuickReport") => "pulse".to_string(),
        s if s.starts_with("Respect") || s.starts_with("Report") => "vote".to_string(),
        s if s.starts_with("Radio") => "radio".to_string(),
        _ => "system".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(Event {
            event_type: "DaemonStarted".to_string(),
            timestamp: 1000,
            payload: serde_json::json!({"version": "0.1.0"}),
        });

        let event = rx.try_recv().expect("receive event");
        assert_eq!(event.event_type, "DaemonStarted");
        assert_eq!(bus.sequence(), 1);
    }

    #[test]
    fn test_event_filter_categories() {
        let filter = EventFilter {
            categories: Some(vec!["pulse".to_string()]),
            pulse_ids: None,
        };

        let pulse_event = Event {
            event_type: "PulseDropped".to_string(),
            timestamp: 1000,
            payload: serde_json::json!({}),
        };
        assert!(filter.matches(&pulse_event));

        let radio_event = Event {
            event_type: "RadioStarted".to_string(),
            timestamp: 1000,
            payload: serde_json::json!({}),
        };
        assert!(!filter.matches(&radio_event));
    }

    #[test]
    fn test_event_filter_pulse_ids() {
        let filter = EventFilter {
            categories: None,
            pulse_ids: Some(vec!["p1".to_string()]),
        };

        let matching = Event {
            event_type: "RespectGiven".to_string(),
            timestamp: 1000,
            payload: serde_json::json!({"pulse_id": "p1"}),
        };
        assert!(filter.matches(&matching));

        let other = Event {
            event_type: "RespectGiven".to_string(),
            timestamp: 1000,
            payload: serde_json::json!({"pulse_id": "p2"}),
        };
        assert!(!filter.matches(&other));
    }

    #[test]
    fn test_categorize_event() {
        assert_eq!(categorize_event("PulseDropped"), "pulse");
        assert_eq!(categorize_event("PulsesChanged"), "pulse");
        assert_eq!(categorize_event("QuickReportDropped"), "pulse");
        assert_eq!(categorize_event("RespectGiven"), "vote");
        assert_eq!(categorize_event("ReportQuorumRemoved"), "vote");
        assert_eq!(categorize_event("RadioStarted"), "radio");
        assert_eq!(categorize_event("DaemonStarted"), "system");
    }
}
