//! The central pulse entity and its category tag set.

use serde::{Deserialize, Serialize};

use crate::PulseId;

/// One ephemeral geotagged event, usually a voice clip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct Pulse {
    /// Remote-assigned unique identifier.
    pub id: PulseId,
    pub lat: f64,
    pub lng: f64,
    /// Normalized peak loudness in [0,1]. Immutable.
    pub energy_value: f64,
    /// Public URL of the stored audio blob; empty for quick reports.
    pub audio_url: String,
    /// Creation time, Unix seconds. Drives all TTL computation.
    pub created_at: u64,
    pub category: PulseCategory,
    /// Monotonically non-decreasing from the engine's perspective.
    pub respect_count: u32,
    /// Only meaningful for quick reports.
    pub deny_count: u32,
    /// Advisory reply relation, never a cascade-delete relation.
    pub parent_id: Option<PulseId>,
    pub is_quick_report: bool,
}

impl Pulse {
    /// Age of the pulse in seconds at `now`, saturating at zero for
    /// clock skew.
    pub fn age_secs(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }
}

/// Fixed category tag set. Quick-report categories carry no audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum PulseCategory {
    Chat,
    Music,
    Alert,
    /// Assigned when geolocation was unavailable at submission time.
    Ghost,
    QuickPolice,
    QuickTraffic,
}

impl PulseCategory {
    /// Whether this category is one of the audio-less quick-report tags.
    pub fn is_quick(&self) -> bool {
        matches!(self, PulseCategory::QuickPolice | PulseCategory::QuickTraffic)
    }

    /// Stable tag string, identical to the serde representation. Used as
    /// the database column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            PulseCategory::Chat => "chat",
            PulseCategory::Music => "music",
            PulseCategory::Alert => "alert",
            PulseCategory::Ghost => "ghost",
            PulseCategory::QuickPolice => "quick-police",
            PulseCategory::QuickTraffic => "quick-traffic",
        }
    }

    /// Parse a tag string produced by [`as_str`](Self::as_str).
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "chat" => Some(PulseCategory::Chat),
            "music" => Some(PulseCategory::Music),
            "alert" => Some(PulseCategory::Alert),
            "ghost" => Some(PulseCategory::Ghost),
            "quick-police" => Some(PulseCategory::QuickPolice),
            "quick-traffic" => Some(PulseCategory::QuickTraffic),
            _ => None,
        }
    }
}

/// Insert payload for a new pulse. The remote store assigns the id and
/// zeroes both counters.
#[derive(Clone, Debug, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct PulseDraft {
    pub lat: f64,
    pub lng: f64,
    pub energy_value: f64,
    pub audio_url: String,
    pub created_at: u64,
    pub category: PulseCategory,
    pub parent_id: Option<PulseId>,
    pub is_quick_report: bool,
}

impl PulseDraft {
    /// Materialize the pulse the remote store would return for this draft.
    pub fn into_pulse(self, id: PulseId) -> Pulse {
        Pulse {
            id,
            lat: self.lat,
            lng: self.lng,
            energy_value: self.energy_value,
            audio_url: self.audio_url,
            created_at: self.created_at,
            category: self.category,
            respect_count: 0,
            deny_count: 0,
            parent_id: self.parent_id,
            is_quick_report: self.is_quick_report,
        }
    }
}
