//! Shared fixtures for the cross-crate integration tests.

use vala_types::pulse::{Pulse, PulseCategory, PulseDraft};

/// Simulated timestamp for deterministic testing.
pub const TEST_TIMESTAMP: u64 = 1_700_000_000;

/// A draft for a regular voice pulse near the Tirana center.
pub fn voice_draft(created_at: u64) -> PulseDraft {
    PulseDraft {
        lat: 41.3275,
        lng: 19.8187,
        energy_value: 0.55,
        audio_url: "https://blobs.vala.fm/seed.webm".to_string(),
        created_at,
        category: PulseCategory::Chat,
        parent_id: None,
        is_quick_report: false,
    }
}

/// A draft for a quick traffic report.
pub fn quick_draft(created_at: u64) -> PulseDraft {
    PulseDraft {
        lat: 41.3275,
        lng: 19.8187,
        energy_value: 0.0,
        audio_url: String::new(),
        created_at,
        category: PulseCategory::QuickTraffic,
        parent_id: None,
        is_quick_report: true,
    }
}

/// A fully materialized pulse at the given coordinate.
pub fn pulse_at(id: &str, lat: f64, lng: f64, created_at: u64) -> Pulse {
    Pulse {
        id: id.to_string(),
        lat,
        lng,
        energy_value: 0.5,
        audio_url: format!("https://blobs.vala.fm/{id}.webm"),
        created_at,
        category: PulseCategory::Chat,
        respect_count: 0,
        deny_count: 0,
        parent_id: None,
        is_quick_report: false,
    }
}
