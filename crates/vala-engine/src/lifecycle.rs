//! Per-category lifecycle policy.
//!
//! Pure functions of `(category, is_quick_report, created_at, now)`, with
//! no clock access and no side effects. Expiry is a read-time predicate: the
//! store may transiently hold expired rows between refresh cycles, so
//! every consumer must filter through [`is_visible`] before further
//! processing.

use std::time::Duration;

use vala_types::pulse::{Pulse, PulseCategory};
use vala_types::{DEFAULT_TTL_SECS, GHOST_TTL_SECS, QUICK_REPORT_TTL_SECS};

/// Time-to-live for a pulse of the given category.
///
/// The quick-report discriminator wins over the category tag: a quick
/// report keeps its 45-minute window even if it was placed via the ghost
/// fallback.
pub fn ttl_for(category: PulseCategory, is_quick_report: bool) -> Duration {
    if is_quick_report {
        Duration::from_secs(QUICK_REPORT_TTL_SECS)
    } else if category == PulseCategory::Ghost {
        Duration::from_secs(GHOST_TTL_SECS)
    } else {
        Duration::from_secs(DEFAULT_TTL_SECS)
    }
}

/// Whether the pulse is still visible at `now`.
///
/// Visible while age is strictly less than the TTL; at exactly the TTL the
/// pulse is expired.
pub fn is_visible(pulse: &Pulse, now: u64) -> bool {
    pulse.age_secs(now) < ttl_for(pulse.category, pulse.is_quick_report).as_secs()
}

/// Remaining fraction of the pulse's lifetime in [0,1].
///
/// Presentation layers fade markers by this value; keeping the math here
/// means they never duplicate the TTL table.
pub fn life_remaining(pulse: &Pulse, now: u64) -> f64 {
    let ttl = ttl_for(pulse.category, pulse.is_quick_report).as_secs() as f64;
    let age = pulse.age_secs(now) as f64;
    (1.0 - age / ttl).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vala_types::PulseId;

    fn pulse(category: PulseCategory, is_quick_report: bool, created_at: u64) -> Pulse {
        Pulse {
            id: PulseId::from("p1"),
            lat: 41.15,
            lng: 20.16,
            energy_value: 0.5,
            audio_url: String::new(),
            created_at,
            category,
            respect_count: 0,
            deny_count: 0,
            parent_id: None,
            is_quick_report,
        }
    }

    #[test]
    fn test_ttl_table() {
        assert_eq!(ttl_for(PulseCategory::Chat, false).as_secs(), 86_400);
        assert_eq!(ttl_for(PulseCategory::Music, false).as_secs(), 86_400);
        assert_eq!(ttl_for(PulseCategory::Alert, false).as_secs(), 86_400);
        assert_eq!(ttl_for(PulseCategory::Ghost, false).as_secs(), 7_200);
        assert_eq!(ttl_for(PulseCategory::QuickPolice, true).as_secs(), 2_700);
        // Quick-report discriminator wins over the category tag.
        assert_eq!(ttl_for(PulseCategory::Ghost, true).as_secs(), 2_700);
    }

    #[test]
    fn test_default_pulse_24h_window() {
        let p = pulse(PulseCategory::Chat, false, 1_000);
        assert!(is_visible(&p, 1_000));
        assert!(is_visible(&p, 1_000 + 86_399));
        assert!(!is_visible(&p, 1_000 + 86_400));
    }

    #[test]
    fn test_ghost_pulse_2h_window() {
        let p = pulse(PulseCategory::Ghost, false, 5_000);
        assert!(is_visible(&p, 5_000 + 7_199));
        assert!(!is_visible(&p, 5_000 + 7_200));
        assert!(!is_visible(&p, 5_000 + 86_400));
    }

    #[test]
    fn test_quick_report_45m_window() {
        let p = pulse(PulseCategory::QuickTraffic, true, 0);
        assert!(is_visible(&p, 2_699));
        assert!(!is_visible(&p, 2_700));
    }

    #[test]
    fn test_life_remaining_fades() {
        let p = pulse(PulseCategory::Chat, false, 0);
        assert!((life_remaining(&p, 0) - 1.0).abs() < 1e-12);
        assert!((life_remaining(&p, 43_200) - 0.5).abs() < 1e-12);
        assert_eq!(life_remaining(&p, 86_400), 0.0);
        // Never goes negative past expiry.
        assert_eq!(life_remaining(&p, 200_000), 0.0);
    }

    #[test]
    fn test_future_created_at_is_fully_alive() {
        let p = pulse(PulseCategory::Chat, false, 10_000);
        assert!(is_visible(&p, 9_000));
        assert!((life_remaining(&p, 9_000) - 1.0).abs() < 1e-12);
    }
}
