//! Pulse submission pipeline.
//!
//! Upload the audio blob, insert the row, then write the returned pulse
//! optimistically through the serialized update channel. A failure at any
//! stage aborts without partial persistence: no insert is attempted after
//! a failed upload, and an orphaned blob is deleted best-effort when the
//! insert fails. Geolocation failure is recovered locally via the
//! ghost-pulse policy, never surfaced as a hard error.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;

use vala_types::feed::FeedEvent;
use vala_types::geo::LatLng;
use vala_types::pulse::{Pulse, PulseCategory, PulseDraft};
use vala_types::{PulseId, DEFAULT_CENTER, GHOST_JITTER_DEG};

use crate::ledger::{DeviceSets, SetKind, SetsError};
use crate::reconcile::StoreUpdate;
use crate::remote::{BlobStore, Locator, PulseService, ServiceError};
use crate::store::PulseStore;
use crate::{unix_now, unix_now_millis};

/// How long to wait for a location fix before falling back to the ghost
/// policy.
const LOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// A finished capture handed over by the audio layer: the encoded blob
/// plus the peak energy scalar its analysis loop measured.
#[derive(Clone, Debug)]
pub struct Submission {
    pub audio: Vec<u8>,
    pub content_type: String,
    /// Peak loudness in [0,1]; clamped on ingestion.
    pub peak_energy: f64,
    pub category: PulseCategory,
    pub parent_id: Option<PulseId>,
}

/// Submission error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("empty audio capture")]
    EmptyAudio,

    /// Audio submissions take the regular categories; quick reports go
    /// through [`Submitter::submit_quick`].
    #[error("category {0:?} not valid for this submission kind")]
    InvalidCategory(PulseCategory),

    #[error("audio upload failed: {0}")]
    Upload(ServiceError),

    #[error("pulse insert failed: {0}")]
    Insert(ServiceError),

    #[error("pulse delete failed: {0}")]
    Delete(ServiceError),

    #[error("not the owner of pulse {0}")]
    NotOwner(PulseId),

    #[error(transparent)]
    Sets(#[from] SetsError),
}

/// Drives the submission pipeline against the injected collaborators.
pub struct Submitter<R, B, L, S> {
    remote: R,
    blobs: B,
    locator: L,
    sets: S,
    store: Arc<PulseStore>,
    updates: mpsc::Sender<StoreUpdate>,
}

impl<R, B, L, S> Submitter<R, B, L, S>
where
    R: PulseService,
    B: BlobStore,
    L: Locator,
    S: DeviceSets,
{
    pub fn new(
        remote: R,
        blobs: B,
        locator: L,
        sets: S,
        store: Arc<PulseStore>,
        updates: mpsc::Sender<StoreUpdate>,
    ) -> Self {
        Self {
            remote,
            blobs,
            locator,
            sets,
            store,
            updates,
        }
    }

    /// Submit a recorded voice pulse.
    pub async fn submit(&self, submission: Submission) -> Result<Pulse, SubmitError> {
        if submission.audio.is_empty() {
            return Err(SubmitError::EmptyAudio);
        }
        if submission.category.is_quick() {
            return Err(SubmitError::InvalidCategory(submission.category));
        }

        let now = unix_now();
        let (position, ghosted) = self.resolve_position().await;
        let category = if ghosted {
            PulseCategory::Ghost
        } else {
            submission.category
        };

        let name = blob_name(unix_now_millis());
        self.blobs
            .upload(&name, &submission.audio, &submission.content_type)
            .await
            .map_err(SubmitError::Upload)?;

        let draft = PulseDraft {
            lat: position.lat,
            lng: position.lng,
            energy_value: submission.peak_energy.clamp(0.0, 1.0),
            audio_url: self.blobs.public_url(&name),
            created_at: now,
            category,
            parent_id: submission.parent_id,
            is_quick_report: false,
        };

        let pulse = match self.remote.insert(draft).await {
            Ok(pulse) => pulse,
            Err(e) => {
                // No partial persistence: the blob must not outlive a
                // failed insert.
                if let Err(del) = self.blobs.delete(&name).await {
                    tracing::warn!(blob = %name, error = %del, "orphaned blob cleanup failed");
                }
                return Err(SubmitError::Insert(e));
            }
        };

        self.finish_insert(&pulse).await?;
        tracing::info!(pulse = %pulse.id, category = ?pulse.category, ghosted, "pulse dropped");
        Ok(pulse)
    }

    /// Submit an audio-less quick report (checkpoint/traffic). The quick
    /// category is kept even when placement falls back to jitter; the
    /// 45-minute report window already undercuts the ghost lifetime.
    pub async fn submit_quick(
        &self,
        kind: PulseCategory,
        parent_id: Option<PulseId>,
    ) -> Result<Pulse, SubmitError> {
        if !kind.is_quick() {
            return Err(SubmitError::InvalidCategory(kind));
        }

        let (position, ghosted) = self.resolve_position().await;
        let draft = PulseDraft {
            lat: position.lat,
            lng: position.lng,
            energy_value: 0.0,
            audio_url: String::new(),
            created_at: unix_now(),
            category: kind,
            parent_id,
            is_quick_report: true,
        };

        let pulse = self.remote.insert(draft).await.map_err(SubmitError::Insert)?;
        self.finish_insert(&pulse).await?;
        tracing::info!(pulse = %pulse.id, category = ?kind, ghosted, "quick report dropped");
        Ok(pulse)
    }

    /// Owner-initiated deletion of one of this device's own pulses.
    pub async fn delete_own(&self, id: &str) -> Result<(), SubmitError> {
        if !self.sets.contains(SetKind::MyPulses, id).await? {
            return Err(SubmitError::NotOwner(id.to_string()));
        }

        let held = self.store.get(id);
        self.remote.delete(id).await.map_err(SubmitError::Delete)?;

        if let Some(pulse) = held {
            if !pulse.audio_url.is_empty() {
                if let Some(name) = blob_name_from_url(&pulse.audio_url) {
                    if let Err(e) = self.blobs.delete(name).await {
                        tracing::warn!(blob = name, error = %e, "audio blob cleanup failed");
                    }
                }
            }
            let _ = self
                .updates
                .send(StoreUpdate::Feed(FeedEvent::delete(pulse)))
                .await;
        }
        tracing::info!(pulse = id, "own pulse deleted");
        Ok(())
    }

    async fn finish_insert(&self, pulse: &Pulse) -> Result<(), SubmitError> {
        self.sets.insert(SetKind::MyPulses, &pulse.id).await?;
        // Optimistic local write; the feed will echo the same row and the
        // reconciler's insert-if-absent guard absorbs the duplicate.
        let _ = self
            .updates
            .send(StoreUpdate::Feed(FeedEvent::insert(pulse.clone())))
            .await;
        Ok(())
    }

    async fn resolve_position(&self) -> (LatLng, bool) {
        match self.locator.current_position(LOCATION_TIMEOUT).await {
            Ok(fix) => (fix, false),
            Err(e) => {
                tracing::info!(error = %e, "no location fix; applying ghost placement");
                (ghost_position(), true)
            }
        }
    }
}

/// Uniform jitter around the default city center.
fn ghost_position() -> LatLng {
    let mut rng = rand::thread_rng();
    LatLng {
        lat: DEFAULT_CENTER.lat + rng.gen_range(-GHOST_JITTER_DEG..=GHOST_JITTER_DEG),
        lng: DEFAULT_CENTER.lng + rng.gen_range(-GHOST_JITTER_DEG..=GHOST_JITTER_DEG),
    }
}

/// Blob names key by millisecond timestamp plus a random suffix.
fn blob_name(now_millis: u64) -> String {
    let suffix: [u8; 4] = rand::thread_rng().gen();
    format!("{}-{}.webm", now_millis, hex::encode(suffix))
}

fn blob_name_from_url(url: &str) -> Option<&str> {
    url.rsplit('/').next().filter(|name| !name.is_empty())
}
