//! # vala-engine
//!
//! The pulse lifecycle and realtime aggregation engine. Everything the map,
//! list, and radio surfaces display flows through here; the presentation
//! layer observes state through [`store::PulseStore::snapshot`] and the
//! store's change subscription, never through UI-framework hooks.
//!
//! ## Modules
//!
//! - [`lifecycle`] — per-category TTL and visibility predicates
//! - [`store`] — the in-memory authoritative pulse view
//! - [`reconcile`] — serialized feed/refresh reconciliation with tombstones
//! - [`cluster`] — screen-space spatial clustering
//! - [`ledger`] — per-device idempotent respect/deny voting
//! - [`playback`] — the radio-mode playback queue state machine
//! - [`submit`] — the upload/insert submission pipeline and ghost fallback
//! - [`remote`] — trait seams for the remote collection and collaborators
//! - [`stub`] — in-memory service implementations for tests and offline use

pub mod cluster;
pub mod ledger;
pub mod lifecycle;
pub mod playback;
pub mod reconcile;
pub mod remote;
pub mod store;
pub mod stub;
pub mod submit;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall clock as Unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Current wall clock as Unix milliseconds. Used for blob names, where the
/// original upload scheme keyed files by millisecond timestamp.
pub fn unix_now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
