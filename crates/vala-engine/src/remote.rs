//! Trait seams for the remote collaborators.
//!
//! Implementors provide the actual I/O: hosted database, blob storage,
//! device geolocation, reverse geocoding. The abstraction lets the engine
//! be exercised without real networking; the stubs in [`crate::stub`] and
//! the daemon's local implementations both satisfy these traits.

use std::time::Duration;

use tokio::sync::mpsc;

use vala_types::feed::FeedEvent;
use vala_types::geo::LatLng;
use vala_types::pulse::{Pulse, PulseDraft};

/// Error types for remote service operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Transport-level failure; the caller decides whether to surface or
    /// just log it.
    #[error("network failure: {0}")]
    Network(String),

    /// The remote accepted the request and refused it.
    #[error("rejected by remote: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// No location fix could be acquired. Triggers the ghost-pulse policy
    /// instead of failing the submission.
    #[error("position unavailable")]
    PositionUnavailable,
}

/// Convenience result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Counter columns mutated through the atomic server-side increment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterField {
    Respect,
    Deny,
}

impl CounterField {
    pub fn column(&self) -> &'static str {
        match self {
            CounterField::Respect => "respect_count",
            CounterField::Deny => "deny_count",
        }
    }
}

/// The remote pulses collection.
pub trait PulseService {
    /// Insert a draft; the remote assigns the id and returns the full row.
    fn insert(
        &self,
        draft: PulseDraft,
    ) -> impl std::future::Future<Output = Result<Pulse>> + Send;

    /// All rows with `created_at >= threshold`.
    fn select_since(
        &self,
        threshold: u64,
    ) -> impl std::future::Future<Output = Result<Vec<Pulse>>> + Send;

    fn delete(&self, id: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Atomic server-side counter increment; avoids lost updates when
    /// devices race on the same pulse.
    fn increment_counter(
        &self,
        id: &str,
        field: CounterField,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Open the push subscription. Each receiver sees every subsequent
    /// insert/update/delete on the collection.
    fn subscribe(
        &self,
    ) -> impl std::future::Future<Output = Result<mpsc::Receiver<FeedEvent>>> + Send;
}

/// Opaque audio blob storage with a URL-return contract.
pub trait BlobStore {
    fn upload(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Public URL for a stored blob. Pure name mapping, no I/O.
    fn public_url(&self, name: &str) -> String;

    fn delete(&self, name: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Device geolocation.
pub trait Locator {
    fn current_position(
        &self,
        timeout: Duration,
    ) -> impl std::future::Future<Output = Result<LatLng>> + Send;
}

/// Reverse geocoding, consumed as a string-producing service.
pub trait Geocoder {
    fn lookup(
        &self,
        lat: f64,
        lng: f64,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_columns() {
        assert_eq!(CounterField::Respect.column(), "respect_count");
        assert_eq!(CounterField::Deny.column(), "deny_count");
    }
}
