//! Per-device idempotent voting.
//!
//! The device's persisted vote sets are the source of truth for "can this
//! device vote again", independent of remote success. A failed increment
//! RPC is logged and never rolled back: the local optimistic counter may
//! run ahead of the remote until the next full refresh corrects it, but
//! the vote-set entry guarantees the device cannot vote twice. That
//! asymmetry favors idempotence over accuracy.

use std::sync::Arc;

use vala_types::{PulseId, DENY_QUORUM};

use crate::remote::{CounterField, PulseService};
use crate::store::PulseStore;

/// The three persisted device-scoped id sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetKind {
    MyPulses,
    Respected,
    Denied,
}

impl SetKind {
    pub fn name(&self) -> &'static str {
        match self {
            SetKind::MyPulses => "my_pulses",
            SetKind::Respected => "respected_pulses",
            SetKind::Denied => "denied_reports",
        }
    }
}

/// Device set access failure (local persistence, not the network).
#[derive(Debug, thiserror::Error)]
#[error("device set access failed: {0}")]
pub struct SetsError(pub String);

/// Persisted key-value string sets with atomic read-modify-write. Each
/// insert is atomic relative to concurrent vote actions, so rapid
/// double-taps cannot produce lost updates.
pub trait DeviceSets {
    /// Insert `id` into the set. Returns `false` if it was already
    /// present; the check and the write are one atomic step.
    fn insert(
        &self,
        set: SetKind,
        id: &str,
    ) -> impl std::future::Future<Output = std::result::Result<bool, SetsError>> + Send;

    fn contains(
        &self,
        set: SetKind,
        id: &str,
    ) -> impl std::future::Future<Output = std::result::Result<bool, SetsError>> + Send;

    fn list(
        &self,
        set: SetKind,
    ) -> impl std::future::Future<Output = std::result::Result<Vec<String>, SetsError>> + Send;
}

/// Voting error taxonomy. `AlreadyVoted` is surfaced as a no-op
/// notification, not an error dialog.
#[derive(Debug, thiserror::Error)]
pub enum VoteError {
    #[error("already voted on this pulse")]
    AlreadyVoted,

    #[error("unknown pulse: {0}")]
    UnknownPulse(PulseId),

    #[error("not a quick report: {0}")]
    NotAQuickReport(PulseId),

    #[error(transparent)]
    Sets(#[from] SetsError),
}

/// Outcome of a deny vote. Reaching the quorum is a normal outcome, not
/// an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyOutcome {
    /// The deny was counted; the pulse survives at this count.
    Counted(u32),
    /// The quorum was crossed; the pulse has been deleted.
    QuorumReached,
}

/// Respect voting for regular pulses.
pub struct VoteLedger<S, R> {
    sets: S,
    remote: R,
    store: Arc<PulseStore>,
}

impl<S: DeviceSets, R: PulseService> VoteLedger<S, R> {
    pub fn new(sets: S, remote: R, store: Arc<PulseStore>) -> Self {
        Self { sets, remote, store }
    }

    /// Give one respect vote from this device.
    pub async fn give_respect(&self, id: &str) -> Result<(), VoteError> {
        if !self.sets.insert(SetKind::Respected, id).await? {
            return Err(VoteError::AlreadyVoted);
        }

        // Optimistic local bump; the pulse may legitimately be absent if
        // it expired between render and tap.
        if self.store.bump_respect(id).is_none() {
            tracing::debug!(pulse = id, "respect vote on a pulse not locally held");
        }

        if let Err(e) = self.remote.increment_counter(id, CounterField::Respect).await {
            tracing::warn!(pulse = id, error = %e, "respect increment RPC failed; keeping local vote");
        }
        Ok(())
    }
}

/// Confirm/deny voting for quick reports, with the deny quorum.
pub struct ReportLedger<S, R> {
    sets: S,
    remote: R,
    store: Arc<PulseStore>,
}

impl<S: DeviceSets, R: PulseService> ReportLedger<S, R> {
    pub fn new(sets: S, remote: R, store: Arc<PulseStore>) -> Self {
        Self { sets, remote, store }
    }

    /// Confirm a quick report ("still there"). Shares the respect counter
    /// and the respected set; one confirm per device per report.
    pub async fn confirm_report(&self, id: &str) -> Result<(), VoteError> {
        self.require_quick(id)?;
        if !self.sets.insert(SetKind::Respected, id).await? {
            return Err(VoteError::AlreadyVoted);
        }
        self.store.bump_respect(id);
        if let Err(e) = self.remote.increment_counter(id, CounterField::Respect).await {
            tracing::warn!(pulse = id, error = %e, "confirm increment RPC failed; keeping local vote");
        }
        Ok(())
    }

    /// Deny a quick report ("gone/false"). Crossing the quorum deletes the
    /// report outright instead of counting further.
    pub async fn deny_report(&self, id: &str) -> Result<DenyOutcome, VoteError> {
        let pulse = self.require_quick(id)?;
        if !self.sets.insert(SetKind::Denied, id).await? {
            return Err(VoteError::AlreadyVoted);
        }

        let count = self
            .store
            .bump_deny(id)
            .unwrap_or(pulse.deny_count.saturating_add(1));

        if count >= DENY_QUORUM {
            if let Err(e) = self.remote.delete(id).await {
                tracing::warn!(pulse = id, error = %e, "quorum delete RPC failed; removing locally anyway");
            }
            self.store.remove(id);
            tracing::info!(pulse = id, denies = count, "quick report removed by deny quorum");
            return Ok(DenyOutcome::QuorumReached);
        }

        if let Err(e) = self.remote.increment_counter(id, CounterField::Deny).await {
            tracing::warn!(pulse = id, error = %e, "deny increment RPC failed; keeping local vote");
        }
        Ok(DenyOutcome::Counted(count))
    }

    fn require_quick(&self, id: &str) -> Result<vala_types::pulse::Pulse, VoteError> {
        let pulse = self
            .store
            .get(id)
            .ok_or_else(|| VoteError::UnknownPulse(id.to_string()))?;
        if !pulse.is_quick_report {
            return Err(VoteError::NotAQuickReport(id.to_string()));
        }
        Ok(pulse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{MemoryPulseService, MemorySets};
    use vala_types::pulse::{Pulse, PulseCategory, PulseDraft};

    fn draft(is_quick: bool) -> PulseDraft {
        PulseDraft {
            lat: 41.15,
            lng: 20.16,
            energy_value: if is_quick { 0.0 } else { 0.5 },
            audio_url: if is_quick {
                String::new()
            } else {
                "https://blobs/x.webm".to_string()
            },
            created_at: 1_000,
            category: if is_quick {
                PulseCategory::QuickPolice
            } else {
                PulseCategory::Chat
            },
            parent_id: None,
            is_quick_report: is_quick,
        }
    }

    async fn seeded(is_quick: bool) -> (Arc<PulseStore>, MemoryPulseService, Pulse) {
        let store = Arc::new(PulseStore::new());
        let remote = MemoryPulseService::new();
        let pulse = remote.insert(draft(is_quick)).await.expect("insert");
        store.upsert(pulse.clone());
        (store, remote, pulse)
    }

    #[tokio::test]
    async fn test_respect_is_idempotent_per_device() {
        let (store, remote, pulse) = seeded(false).await;
        let ledger = VoteLedger::new(MemorySets::new(), remote.clone(), store.clone());

        ledger.give_respect(&pulse.id).await.expect("first vote");
        let second = ledger.give_respect(&pulse.id).await;
        assert!(matches!(second, Err(VoteError::AlreadyVoted)));

        // Exactly one increment, locally and remotely.
        assert_eq!(store.get(&pulse.id).expect("held").respect_count, 1);
        assert_eq!(remote.row(&pulse.id).expect("row").respect_count, 1);
    }

    #[tokio::test]
    async fn test_two_devices_may_both_respect() {
        let (store, remote, pulse) = seeded(false).await;
        let device_a = VoteLedger::new(MemorySets::new(), remote.clone(), store.clone());
        let device_b = VoteLedger::new(MemorySets::new(), remote.clone(), store.clone());

        device_a.give_respect(&pulse.id).await.expect("device a");
        device_b.give_respect(&pulse.id).await.expect("device b");
        assert_eq!(remote.row(&pulse.id).expect("row").respect_count, 2);
    }

    #[tokio::test]
    async fn test_failed_rpc_keeps_local_vote() {
        let (store, remote, pulse) = seeded(false).await;
        let ledger = VoteLedger::new(MemorySets::new(), remote.clone(), store.clone());

        remote.dev_set_offline(true);
        ledger.give_respect(&pulse.id).await.expect("vote still succeeds");

        // Local optimistic increment retained, remote untouched.
        assert_eq!(store.get(&pulse.id).expect("held").respect_count, 1);
        assert_eq!(remote.row(&pulse.id).expect("row").respect_count, 0);

        // And the device cannot vote again once back online.
        remote.dev_set_offline(false);
        let again = ledger.give_respect(&pulse.id).await;
        assert!(matches!(again, Err(VoteError::AlreadyVoted)));
    }

    #[tokio::test]
    async fn test_deny_rejects_regular_pulse() {
        let (store, remote, pulse) = seeded(false).await;
        let ledger = ReportLedger::new(MemorySets::new(), remote, store);
        let result = ledger.deny_report(&pulse.id).await;
        assert!(matches!(result, Err(VoteError::NotAQuickReport(_))));
    }

    #[tokio::test]
    async fn test_deny_quorum_deletes_report() {
        let (store, remote, pulse) = seeded(true).await;

        // Five distinct devices: each has its own persisted deny set.
        for i in 0..5 {
            let device = ReportLedger::new(MemorySets::new(), remote.clone(), store.clone());
            let outcome = device.deny_report(&pulse.id).await.expect("deny");
            if i < 4 {
                assert_eq!(outcome, DenyOutcome::Counted(i + 1));
            } else {
                assert_eq!(outcome, DenyOutcome::QuorumReached);
            }
        }

        assert!(!store.contains(&pulse.id));
        assert!(store.snapshot(2_000).is_empty());
        assert!(remote.row(&pulse.id).is_none());
    }

    #[tokio::test]
    async fn test_deny_is_idempotent_per_device() {
        let (store, remote, pulse) = seeded(true).await;
        let ledger = ReportLedger::new(MemorySets::new(), remote, store);

        ledger.deny_report(&pulse.id).await.expect("first deny");
        let second = ledger.deny_report(&pulse.id).await;
        assert!(matches!(second, Err(VoteError::AlreadyVoted)));
    }

    #[tokio::test]
    async fn test_confirm_and_deny_are_independent_sets() {
        let (store, remote, pulse) = seeded(true).await;
        let ledger = ReportLedger::new(MemorySets::new(), remote, store.clone());

        ledger.confirm_report(&pulse.id).await.expect("confirm");
        ledger.deny_report(&pulse.id).await.expect("deny after confirm");

        let held = store.get(&pulse.id).expect("held");
        assert_eq!(held.respect_count, 1);
        assert_eq!(held.deny_count, 1);
    }

    #[tokio::test]
    async fn test_vote_on_unknown_report() {
        let store = Arc::new(PulseStore::new());
        let ledger = ReportLedger::new(MemorySets::new(), MemoryPulseService::new(), store);
        let result = ledger.confirm_report("nope").await;
        assert!(matches!(result, Err(VoteError::UnknownPulse(_))));
    }
}
