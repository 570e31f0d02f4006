//! Reconciliation of the realtime feed and the periodic full refresh.
//!
//! Both producers write into one `mpsc` channel of [`StoreUpdate`]s and a
//! single consumer applies them, so the ordering and tombstone logic lives
//! in exactly one place. The reconciler never filters by lifecycle (that
//! is the store's read path), but it does make deletes authoritative over
//! stale, out-of-order events via a short-lived tombstone set.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use vala_types::feed::{FeedEvent, FeedOp};
use vala_types::pulse::Pulse;
use vala_types::{PulseId, TOMBSTONE_TTL_SECS};

use crate::store::PulseStore;
use crate::unix_now;

/// One unit of work on the serialized update channel.
#[derive(Clone, Debug)]
pub enum StoreUpdate {
    /// A push event from the realtime subscription, or an optimistic local
    /// write from the submission pipeline.
    Feed(FeedEvent),
    /// A full view from the periodic poll refresh.
    Refresh(Vec<Pulse>),
}

/// The single consumer of the update channel.
pub struct Reconciler {
    store: Arc<PulseStore>,
    /// Recently deleted ids and the time the delete was applied.
    tombstones: HashMap<PulseId, u64>,
}

impl Reconciler {
    pub fn new(store: Arc<PulseStore>) -> Self {
        Self {
            store,
            tombstones: HashMap::new(),
        }
    }

    /// Apply one update at time `now`.
    pub fn apply(&mut self, update: StoreUpdate, now: u64) {
        self.prune_tombstones(now);
        match update {
            StoreUpdate::Feed(event) => self.apply_feed(event, now),
            StoreUpdate::Refresh(pulses) => self.apply_refresh(pulses, now),
        }
    }

    fn apply_feed(&mut self, event: FeedEvent, now: u64) {
        let id = event.pulse.id.clone();
        match event.op {
            // Insert only if absent: the uploading client writes its own
            // pulse optimistically and the feed echoes the same row.
            FeedOp::Insert => {
                if !self.tombstones.contains_key(&id) && !self.store.contains(&id) {
                    self.store.upsert(event.pulse);
                }
            }
            // Remote state wins for counters, unless the row was deleted;
            // a stale update must not resurrect it.
            FeedOp::Update => {
                if !self.tombstones.contains_key(&id) {
                    self.store.upsert(event.pulse);
                }
            }
            FeedOp::Delete => {
                self.store.remove(&id);
                self.tombstones.insert(id, now);
            }
        }
    }

    fn apply_refresh(&mut self, pulses: Vec<Pulse>, now: u64) {
        // A refresh racing a just-applied delete may still carry the row;
        // live tombstones filter it out. Once a tombstone is pruned the
        // source of truth wins again.
        let live: Vec<Pulse> = pulses
            .into_iter()
            .filter(|p| !self.tombstones.contains_key(&p.id))
            .collect();
        self.store.replace_all(live, now);
    }

    fn prune_tombstones(&mut self, now: u64) {
        self.tombstones
            .retain(|_, deleted_at| now.saturating_sub(*deleted_at) < TOMBSTONE_TTL_SECS);
    }

    /// Consume the channel until every producer is dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<StoreUpdate>) {
        while let Some(update) = rx.recv().await {
            self.apply(update, unix_now());
        }
        tracing::debug!("update channel closed; reconciler stopping");
    }

    #[cfg(test)]
    fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vala_types::pulse::PulseCategory;

    fn pulse(id: &str, created_at: u64) -> Pulse {
        Pulse {
            id: id.to_string(),
            lat: 41.15,
            lng: 20.16,
            energy_value: 0.5,
            audio_url: format!("https://blobs/{id}.webm"),
            created_at,
            category: PulseCategory::Chat,
            respect_count: 0,
            deny_count: 0,
            parent_id: None,
            is_quick_report: false,
        }
    }

    fn setup() -> (Arc<PulseStore>, Reconciler) {
        let store = Arc::new(PulseStore::new());
        let reconciler = Reconciler::new(store.clone());
        (store, reconciler)
    }

    #[test]
    fn test_insert_then_update_then_delete() {
        let (store, mut r) = setup();
        r.apply(StoreUpdate::Feed(FeedEvent::insert(pulse("p1", 100))), 100);
        assert!(store.contains("p1"));

        let mut counted = pulse("p1", 100);
        counted.respect_count = 3;
        r.apply(StoreUpdate::Feed(FeedEvent::update(counted)), 110);
        assert_eq!(store.get("p1").expect("held").respect_count, 3);

        r.apply(StoreUpdate::Feed(FeedEvent::delete(pulse("p1", 100))), 120);
        assert!(!store.contains("p1"));
    }

    #[test]
    fn test_duplicate_insert_does_not_clobber() {
        let (store, mut r) = setup();
        // Optimistic local insert already bumped by a vote...
        let mut local = pulse("p1", 100);
        local.respect_count = 1;
        r.apply(StoreUpdate::Feed(FeedEvent::insert(local)), 100);
        // ...then the feed echoes the original zero-count row.
        r.apply(StoreUpdate::Feed(FeedEvent::insert(pulse("p1", 100))), 101);

        assert_eq!(store.get("p1").expect("held").respect_count, 1);
    }

    #[test]
    fn test_stale_update_does_not_resurrect_delete() {
        let (store, mut r) = setup();
        r.apply(StoreUpdate::Feed(FeedEvent::insert(pulse("p1", 100))), 100);
        r.apply(StoreUpdate::Feed(FeedEvent::delete(pulse("p1", 100))), 110);

        let mut stale = pulse("p1", 100);
        stale.respect_count = 5;
        r.apply(StoreUpdate::Feed(FeedEvent::update(stale)), 111);

        assert!(!store.contains("p1"));
        assert!(store.snapshot(112).is_empty());
    }

    #[test]
    fn test_stale_insert_does_not_resurrect_delete() {
        let (store, mut r) = setup();
        r.apply(StoreUpdate::Feed(FeedEvent::delete(pulse("p1", 100))), 110);
        r.apply(StoreUpdate::Feed(FeedEvent::insert(pulse("p1", 100))), 111);
        assert!(!store.contains("p1"));
    }

    #[test]
    fn test_refresh_respects_live_tombstones() {
        let (store, mut r) = setup();
        r.apply(StoreUpdate::Feed(FeedEvent::delete(pulse("p1", 100))), 200);
        // The poll raced the delete and still carries the row.
        r.apply(
            StoreUpdate::Refresh(vec![pulse("p1", 100), pulse("p2", 150)]),
            201,
        );

        assert!(!store.contains("p1"));
        assert!(store.contains("p2"));
    }

    #[test]
    fn test_tombstones_expire() {
        let (store, mut r) = setup();
        r.apply(StoreUpdate::Feed(FeedEvent::delete(pulse("p1", 100))), 200);
        assert_eq!(r.tombstone_count(), 1);

        // Past the tombstone window the source of truth wins again.
        let later = 200 + TOMBSTONE_TTL_SECS;
        r.apply(StoreUpdate::Refresh(vec![pulse("p1", later - 10)]), later);
        assert_eq!(r.tombstone_count(), 0);
        assert!(store.contains("p1"));
    }

    #[test]
    fn test_update_for_unknown_id_inserts() {
        // A missed insert followed by an update: remote state wins.
        let (store, mut r) = setup();
        r.apply(StoreUpdate::Feed(FeedEvent::update(pulse("p9", 100))), 100);
        assert!(store.contains("p9"));
    }

    #[tokio::test]
    async fn test_run_consumes_channel() {
        let store = Arc::new(PulseStore::new());
        let reconciler = Reconciler::new(store.clone());
        let (tx, rx) = mpsc::channel(8);

        let handle = tokio::spawn(reconciler.run(rx));
        tx.send(StoreUpdate::Feed(FeedEvent::insert(pulse("p1", unix_now()))))
            .await
            .expect("send");
        drop(tx);
        handle.await.expect("reconciler task");

        assert!(store.contains("p1"));
    }
}
