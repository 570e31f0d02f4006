//! Concrete service implementations wired into the daemon.
//!
//! `LocalPulseService` serves the pulses collection out of the daemon's
//! own SQLite database and feeds a broadcast channel, giving the engine
//! the same insert/select/delete/increment/subscribe contract a hosted
//! backend would. The remaining types cover the blob store, the
//! UI-reported location fix, and the offline geocoder fallback.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{broadcast, mpsc, Mutex};

use vala_engine::ledger::{DeviceSets, SetKind, SetsError};
use vala_engine::remote::{
    BlobStore, CounterField, Geocoder, Locator, PulseService, Result, ServiceError,
};
use vala_engine::unix_now;
use vala_types::feed::FeedEvent;
use vala_types::geo::LatLng;
use vala_types::pulse::{Pulse, PulseDraft};
use vala_types::PulseId;

/// Buffer size for the local push feed.
const FEED_CAPACITY: usize = 1000;

fn db_err(e: vala_db::DbError) -> ServiceError {
    match e {
        vala_db::DbError::NotFound(what) => ServiceError::NotFound(what),
        other => ServiceError::Rejected(other.to_string()),
    }
}

/// The self-hosted pulses collection.
#[derive(Clone)]
pub struct LocalPulseService {
    db: Arc<Mutex<rusqlite::Connection>>,
    feed: broadcast::Sender<FeedEvent>,
}

impl LocalPulseService {
    pub fn new(db: Arc<Mutex<rusqlite::Connection>>) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self { db, feed }
    }

    fn new_id() -> PulseId {
        let bytes: [u8; 16] = rand::thread_rng().gen();
        hex::encode(bytes)
    }
}

impl PulseService for LocalPulseService {
    async fn insert(&self, draft: PulseDraft) -> Result<Pulse> {
        let pulse = draft.into_pulse(Self::new_id());
        {
            let db = self.db.lock().await;
            vala_db::queries::pulses::insert(&db, &pulse).map_err(db_err)?;
        }
        let _ = self.feed.send(FeedEvent::insert(pulse.clone()));
        Ok(pulse)
    }

    async fn select_since(&self, threshold: u64) -> Result<Vec<Pulse>> {
        let db = self.db.lock().await;
        vala_db::queries::pulses::select_since(&db, threshold).map_err(db_err)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let removed = {
            let db = self.db.lock().await;
            let row = vala_db::queries::pulses::get(&db, id).ok();
            vala_db::queries::pulses::delete(&db, id).map_err(db_err)?;
            row
        };
        if let Some(pulse) = removed {
            let _ = self.feed.send(FeedEvent::delete(pulse));
        }
        Ok(())
    }

    async fn increment_counter(&self, id: &str, field: CounterField) -> Result<()> {
        let updated = {
            let db = self.db.lock().await;
            vala_db::queries::pulses::increment(&db, id, field.column()).map_err(db_err)?
        };
        let _ = self.feed.send(FeedEvent::update(updated));
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<FeedEvent>> {
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
                        tracing::warn!(skipped, "feed subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(rx)
    }
}

/// Filesystem blob store with the URL-return contract.
#[derive(Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    base_url: String,
}

impl FsBlobStore {
    pub fn new(root: PathBuf, base_url: &str) -> Self {
        Self {
            root,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn blob_path(&self, name: &str) -> Result<PathBuf> {
        // Blob names are flat; anything path-like is refused.
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(ServiceError::Rejected(format!("invalid blob name: {name}")));
        }
        Ok(self.root.join(name))
    }
}

impl BlobStore for FsBlobStore {
    async fn upload(&self, name: &str, bytes: &[u8], _content_type: &str) -> Result<()> {
        let path = self.blob_path(name)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.blob_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ServiceError::Network(e.to_string())),
        }
    }
}

/// Device vote sets persisted in the daemon database.
#[derive(Clone)]
pub struct DeviceStore {
    db: Arc<Mutex<rusqlite::Connection>>,
}

impl DeviceStore {
    pub fn new(db: Arc<Mutex<rusqlite::Connection>>) -> Self {
        Self { db }
    }
}

impl DeviceSets for DeviceStore {
    async fn insert(&self, set: SetKind, id: &str) -> std::result::Result<bool, SetsError> {
        let db = self.db.lock().await;
        vala_db::queries::device_sets::insert_if_absent(&db, set.name(), id, unix_now())
            .map_err(|e| SetsError(e.to_string()))
    }

    async fn contains(&self, set: SetKind, id: &str) -> std::result::Result<bool, SetsError> {
        let db = self.db.lock().await;
        vala_db::queries::device_sets::contains(&db, set.name(), id)
            .map_err(|e| SetsError(e.to_string()))
    }

    async fn list(&self, set: SetKind) -> std::result::Result<Vec<String>, SetsError> {
        let db = self.db.lock().await;
        vala_db::queries::device_sets::list(&db, set.name()).map_err(|e| SetsError(e.to_string()))
    }
}

/// The location fix a UI client reported with its request, if any. The
/// browser owns the permission prompt; the daemon only ever sees the
/// outcome, and an absent fix triggers the ghost policy downstream.
#[derive(Clone, Copy, Debug)]
pub struct ReportedFix(pub Option<LatLng>);

impl Locator for ReportedFix {
    async fn current_position(&self, _timeout: Duration) -> Result<LatLng> {
        self.0.ok_or(ServiceError::PositionUnavailable)
    }
}

/// Offline reverse-geocoder fallback: answers with a formatted coordinate
/// string instead of a street name.
#[derive(Clone, Copy, Debug, Default)]
pub struct CoordinateGeocoder;

impl Geocoder for CoordinateGeocoder {
    async fn lookup(&self, lat: f64, lng: f64) -> Result<String> {
        let ns = if lat >= 0.0 { 'N' } else { 'S' };
        let ew = if lng >= 0.0 { 'E' } else { 'W' };
        Ok(format!("{:.4}°{} {:.4}°{}", lat.abs(), ns, lng.abs(), ew))
    }
}
