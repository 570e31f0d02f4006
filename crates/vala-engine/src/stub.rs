//! In-memory service implementations.
//!
//! Used by the test suites and as offline/dev stand-ins where the hosted
//! backend is not reachable. Each stub honors the same contract as the
//! real implementation, including the push feed, so engine code cannot
//! tell them apart.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use vala_types::feed::FeedEvent;
use vala_types::geo::LatLng;
use vala_types::pulse::{Pulse, PulseDraft};
use vala_types::PulseId;

use crate::ledger::{DeviceSets, SetKind, SetsError};
use crate::remote::{BlobStore, CounterField, Geocoder, Locator, PulseService, Result, ServiceError};

/// Buffer size for the stub's push feed.
const FEED_CAPACITY: usize = 256;

struct ServiceInner {
    rows: HashMap<PulseId, Pulse>,
    next_id: u64,
    offline: bool,
}

/// In-memory pulses collection with a working push feed.
#[derive(Clone)]
pub struct MemoryPulseService {
    inner: Arc<Mutex<ServiceInner>>,
    feed: broadcast::Sender<FeedEvent>,
}

impl MemoryPulseService {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(ServiceInner {
                rows: HashMap::new(),
                next_id: 0,
                offline: false,
            })),
            feed,
        }
    }

    /// Simulate a network outage (development/testing only).
    pub fn dev_set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Inspect a stored row.
    pub fn row(&self, id: &str) -> Option<Pulse> {
        self.lock().rows.get(id).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.lock().rows.len()
    }

    /// Push a feed event without touching the rows, as a misbehaving or
    /// lagging remote would.
    pub fn push_raw_event(&self, event: FeedEvent) {
        let _ = self.feed.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, ServiceInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_online(&self) -> Result<()> {
        if self.lock().offline {
            return Err(ServiceError::Network("stub offline".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryPulseService {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseService for MemoryPulseService {
    async fn insert(&self, draft: PulseDraft) -> Result<Pulse> {
        self.check_online()?;
        let pulse = {
            let mut inner = self.lock();
            inner.next_id += 1;
            let pulse = draft.into_pulse(format!("pulse-{:06}", inner.next_id));
            inner.rows.insert(pulse.id.clone(), pulse.clone());
            pulse
        };
        let _ = self.feed.send(FeedEvent::insert(pulse.clone()));
        Ok(pulse)
    }

    async fn select_since(&self, threshold: u64) -> Result<Vec<Pulse>> {
        self.check_online()?;
        Ok(self
            .lock()
            .rows
            .values()
            .filter(|p| p.created_at >= threshold)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.check_online()?;
        let removed = self.lock().rows.remove(id);
        if let Some(pulse) = removed {
            let _ = self.feed.send(FeedEvent::delete(pulse));
        }
        Ok(())
    }

    async fn increment_counter(&self, id: &str, field: CounterField) -> Result<()> {
        self.check_online()?;
        let updated = {
            let mut inner = self.lock();
            let row = inner
                .rows
                .get_mut(id)
                .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
            match field {
                CounterField::Respect => row.respect_count += 1,
                CounterField::Deny => row.deny_count += 1,
            }
            row.clone()
        };
        let _ = self.feed.send(FeedEvent::update(updated));
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<FeedEvent>> {
        self.check_online()?;
        let mut feed_rx = self.feed.subscribe();
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        tokio::spawn(async move {
            loop {
                match feed_rx.recv().await {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "stub feed subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(rx)
    }
}

struct BlobInner {
    blobs: HashMap<String, Vec<u8>>,
    offline: bool,
}

/// In-memory blob store with the URL-return contract.
#[derive(Clone)]
pub struct MemoryBlobStore {
    inner: Arc<Mutex<BlobInner>>,
    base_url: String,
}

impl MemoryBlobStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BlobInner {
                blobs: HashMap::new(),
                offline: false,
            })),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn dev_set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn blob_count(&self) -> usize {
        self.lock().blobs.len()
    }

    fn lock(&self) -> MutexGuard<'_, BlobInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BlobStore for MemoryBlobStore {
    async fn upload(&self, name: &str, bytes: &[u8], _content_type: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.offline {
            return Err(ServiceError::Network("blob store offline".to_string()));
        }
        inner.blobs.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.offline {
            return Err(ServiceError::Network("blob store offline".to_string()));
        }
        inner.blobs.remove(name);
        Ok(())
    }
}

/// In-memory device vote sets.
#[derive(Clone)]
pub struct MemorySets {
    inner: Arc<Mutex<HashMap<&'static str, HashSet<String>>>>,
}

impl MemorySets {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<&'static str, HashSet<String>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemorySets {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSets for MemorySets {
    async fn insert(&self, set: SetKind, id: &str) -> std::result::Result<bool, SetsError> {
        Ok(self
            .lock()
            .entry(set.name())
            .or_default()
            .insert(id.to_string()))
    }

    async fn contains(&self, set: SetKind, id: &str) -> std::result::Result<bool, SetsError> {
        Ok(self
            .lock()
            .get(set.name())
            .map(|s| s.contains(id))
            .unwrap_or(false))
    }

    async fn list(&self, set: SetKind) -> std::result::Result<Vec<String>, SetsError> {
        let mut ids: Vec<String> = self
            .lock()
            .get(set.name())
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        Ok(ids)
    }
}

/// A locator with a fixed answer: either a position or a permission
/// failure.
#[derive(Clone, Copy, Debug)]
pub struct FixedLocator(Option<LatLng>);

impl FixedLocator {
    pub fn at(position: LatLng) -> Self {
        Self(Some(position))
    }

    pub fn unavailable() -> Self {
        Self(None)
    }
}

impl Locator for FixedLocator {
    async fn current_position(&self, _timeout: Duration) -> Result<LatLng> {
        self.0.ok_or(ServiceError::PositionUnavailable)
    }
}

/// A geocoder that always answers with the same street name.
#[derive(Clone, Debug)]
pub struct StaticGeocoder(pub String);

impl Geocoder for StaticGeocoder {
    async fn lookup(&self, _lat: f64, _lng: f64) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vala_types::pulse::PulseCategory;

    fn draft() -> PulseDraft {
        PulseDraft {
            lat: 41.15,
            lng: 20.16,
            energy_value: 0.5,
            audio_url: "https://blobs/x.webm".to_string(),
            created_at: 1_000,
            category: PulseCategory::Chat,
            parent_id: None,
            is_quick_report: false,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_feeds() {
        let service = MemoryPulseService::new();
        let mut feed = service.subscribe().await.expect("subscribe");

        let a = service.insert(draft()).await.expect("insert");
        let b = service.insert(draft()).await.expect("insert");
        assert_ne!(a.id, b.id);

        let first = feed.recv().await.expect("event");
        assert_eq!(first.pulse.id, a.id);
    }

    #[tokio::test]
    async fn test_select_since_filters() {
        let service = MemoryPulseService::new();
        let mut old = draft();
        old.created_at = 100;
        service.insert(old).await.expect("insert");
        service.insert(draft()).await.expect("insert");

        let recent = service.select_since(500).await.expect("select");
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_fails_calls() {
        let service = MemoryPulseService::new();
        service.dev_set_offline(true);
        assert!(matches!(
            service.insert(draft()).await,
            Err(ServiceError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_blob_store_roundtrip() {
        let blobs = MemoryBlobStore::new("https://blobs.vala.fm/");
        blobs
            .upload("a.webm", &[1, 2, 3], "audio/webm")
            .await
            .expect("upload");
        assert_eq!(blobs.blob_count(), 1);
        assert_eq!(blobs.public_url("a.webm"), "https://blobs.vala.fm/a.webm");
        blobs.delete("a.webm").await.expect("delete");
        assert_eq!(blobs.blob_count(), 0);
    }

    #[tokio::test]
    async fn test_memory_sets_atomic_insert() {
        let sets = MemorySets::new();
        assert!(sets.insert(SetKind::Respected, "p1").await.expect("insert"));
        assert!(!sets.insert(SetKind::Respected, "p1").await.expect("insert"));
        assert!(sets
            .contains(SetKind::Respected, "p1")
            .await
            .expect("contains"));
        // Different sets do not interfere.
        assert!(!sets.contains(SetKind::Denied, "p1").await.expect("contains"));
    }

    #[tokio::test]
    async fn test_fixed_locator() {
        let here = LatLng { lat: 41.0, lng: 20.0 };
        let fix = FixedLocator::at(here)
            .current_position(Duration::from_secs(1))
            .await
            .expect("fix");
        assert_eq!(fix, here);

        let denied = FixedLocator::unavailable()
            .current_position(Duration::from_secs(1))
            .await;
        assert!(matches!(denied, Err(ServiceError::PositionUnavailable)));
    }
}
