//! # vala-types
//!
//! Shared domain types used across the Vala workspace.
//! All timestamps are Unix epoch seconds (u64).

pub mod feed;
pub mod geo;
pub mod pulse;

/// Opaque pulse identifier, assigned by the remote store on insert.
pub type PulseId = String;

/// Default pulse lifetime (24 hours).
pub const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Ghost pulse lifetime (2 hours). Applied when a pulse was submitted
/// without a valid location fix.
pub const GHOST_TTL_SECS: u64 = 2 * 60 * 60;

/// Quick report lifetime (45 minutes).
pub const QUICK_REPORT_TTL_SECS: u64 = 45 * 60;

/// Deny votes required before a quick report is deleted outright.
pub const DENY_QUORUM: u32 = 5;

/// Screen-space clustering radius in pixels.
pub const CLUSTER_RADIUS_PX: f64 = 60.0;

/// Default city center used by the ghost-pulse fallback (Tirana).
pub const DEFAULT_CENTER: geo::LatLng = geo::LatLng {
    lat: 41.1533,
    lng: 20.1683,
};

/// Maximum jitter in degrees applied around [`DEFAULT_CENTER`] when
/// placing a ghost pulse.
pub const GHOST_JITTER_DEG: f64 = 0.05;

/// Default full-refresh poll interval in seconds.
pub const REFRESH_INTERVAL_SECS: u64 = 60;

/// How long a delete tombstone suppresses stale feed events.
pub const TOMBSTONE_TTL_SECS: u64 = 300;
