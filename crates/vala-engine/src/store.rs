//! In-memory authoritative view of currently-known pulses.
//!
//! Keys are unique pulse ids. The store holds whatever the reconciler and
//! refresh paths last wrote, including rows that have since expired;
//! expiry is applied on every read through the lifecycle filter. Writers
//! take a short exclusive lock per mutation, so concurrent readers never
//! observe a partial update.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::watch;

use vala_types::pulse::Pulse;
use vala_types::PulseId;

use crate::lifecycle;

/// Shared pulse store. Cheap to share behind an `Arc`; all methods take
/// `&self`.
pub struct PulseStore {
    inner: RwLock<HashMap<PulseId, Pulse>>,
    revision: watch::Sender<u64>,
}

impl PulseStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: RwLock::new(HashMap::new()),
            revision,
        }
    }

    /// Subscribe to change notifications. The value is a revision counter;
    /// any observer holding a receiver wakes on every committed mutation
    /// and re-reads via [`snapshot`](Self::snapshot).
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Current revision counter.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    /// Insert or overwrite by id. Last writer wins; safe because every
    /// field besides the counters is immutable and counter updates are
    /// monotonic increments applied remotely.
    pub fn upsert(&self, pulse: Pulse) {
        self.write().insert(pulse.id.clone(), pulse);
        self.bump_revision();
    }

    /// Remove by id. Removing an absent id is a no-op, not an error.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.write().remove(id).is_some();
        if removed {
            self.bump_revision();
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<Pulse> {
        self.read().get(id).cloned()
    }

    /// Number of held rows, expired rows included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// The currently visible pulses, newest first. Ties on `created_at`
    /// break by id so the ordering is stable across calls.
    pub fn snapshot(&self, now: u64) -> Vec<Pulse> {
        let mut pulses: Vec<Pulse> = self
            .read()
            .values()
            .filter(|p| lifecycle::is_visible(p, now))
            .cloned()
            .collect();
        pulses.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        pulses
    }

    /// Replace the whole view from a full refresh. The lifecycle filter is
    /// applied at ingestion so the store never grows unbounded with
    /// expired quick reports.
    pub fn replace_all(&self, pulses: Vec<Pulse>, now: u64) {
        let fresh: HashMap<PulseId, Pulse> = pulses
            .into_iter()
            .filter(|p| lifecycle::is_visible(p, now))
            .map(|p| (p.id.clone(), p))
            .collect();
        *self.write() = fresh;
        self.bump_revision();
    }

    /// Optimistic local respect increment. Returns the new count, or
    /// `None` if the pulse is not held.
    pub fn bump_respect(&self, id: &str) -> Option<u32> {
        let count = {
            let mut inner = self.write();
            let pulse = inner.get_mut(id)?;
            pulse.respect_count += 1;
            pulse.respect_count
        };
        self.bump_revision();
        Some(count)
    }

    /// Optimistic local deny increment. Returns the new count, or `None`
    /// if the pulse is not held.
    pub fn bump_deny(&self, id: &str) -> Option<u32> {
        let count = {
            let mut inner = self.write();
            let pulse = inner.get_mut(id)?;
            pulse.deny_count += 1;
            pulse.deny_count
        };
        self.bump_revision();
        Some(count)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<PulseId, Pulse>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<PulseId, Pulse>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for PulseStore {
    fn default() -> Self {
        Self::new()
    }
}
