//! Respect and quick-report voting command handlers.

use std::sync::Arc;

use serde_json::Value;

use vala_engine::ledger::{DenyOutcome, DeviceSets as _, ReportLedger, SetKind, VoteError, VoteLedger};

use crate::events::Event;
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

fn vote_err(e: VoteError) -> RpcError {
    match e {
        VoteError::AlreadyVoted => RpcError::already_voted(""),
        VoteError::UnknownPulse(id) => RpcError::pulse_not_found(&id),
        VoteError::NotAQuickReport(id) => RpcError::not_a_quick_report(&id),
        VoteError::Sets(e) => RpcError::internal_error(&e.to_string()),
    }
}

fn require_pulse_id(params: &Value) -> std::result::Result<String, RpcError> {
    params
        .get("pulse_id")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| RpcError::invalid_params("pulse_id required"))
}

/// Give one respect vote on a pulse.
pub async fn give_respect(state: &Arc<DaemonState>, params: &Value) -> Result {
    let pulse_id = require_pulse_id(params)?;

    let ledger = VoteLedger::new(
        state.sets.clone(),
        state.remote.clone(),
        state.store.clone(),
    );
    ledger.give_respect(&pulse_id).await.map_err(|e| match e {
        VoteError::AlreadyVoted => RpcError::already_voted(&pulse_id),
        other => vote_err(other),
    })?;

    state.event_bus.emit(Event::now(
        "RespectGiven",
        serde_json::json!({"pulse_id": pulse_id}),
    ));

    Ok(serde_json::json!({"voted": true}))
}

/// Confirm a quick report ("still there").
pub async fn confirm_report(state: &Arc<DaemonState>, params: &Value) -> Result {
    let pulse_id = require_pulse_id(params)?;

    let ledger = ReportLedger::new(
        state.sets.clone(),
        state.remote.clone(),
        state.store.clone(),
    );
    ledger.confirm_report(&pulse_id).await.map_err(|e| match e {
        VoteError::AlreadyVoted => RpcError::already_voted(&pulse_id),
        other => vote_err(other),
    })?;

    state.event_bus.emit(Event::now(
        "ReportConfirmed",
        serde_json::json!({"pulse_id": pulse_id}),
    ));

    Ok(serde_json::json!({"voted": true}))
}

/// Deny a quick report. Crossing the quorum removes the report.
pub async fn deny_report(state: &Arc<DaemonState>, params: &Value) -> Result {
    let pulse_id = require_pulse_id(params)?;

    let ledger = ReportLedger::new(
        state.sets.clone(),
        state.remote.clone(),
        state.store.clone(),
    );
    let outcome = ledger.deny_report(&pulse_id).await.map_err(|e| match e {
        VoteError::AlreadyVoted => RpcError::already_voted(&pulse_id),
        other => vote_err(other),
    })?;

    match outcome {
        DenyOutcome::Counted(denies) => {
            state.event_bus.emit(Event::now(
                "ReportDenied",
                serde_json::json!({"pulse_id": pulse_id, "denies": denies}),
            ));
            Ok(serde_json::json!({"outcome": "counted", "denies": denies}))
        }
        DenyOutcome::QuorumReached => {
            state.event_bus.emit(Event::now(
                "ReportQuorumRemoved",
                serde_json::json!({"pulse_id": pulse_id}),
            ));
            Ok(serde_json::json!({"outcome": "quorum_reached"}))
        }
    }
}

/// The device's three persisted vote sets.
pub async fn get_vote_sets(state: &Arc<DaemonState>) -> Result {
    let mine = state
        .sets
        .list(SetKind::MyPulses)
        .await
        .map_err(|e| RpcError::internal_error(&e.to_string()))?;
    let respected = state
        .sets
        .list(SetKind::Respected)
        .await
        .map_err(|e| RpcError::internal_error(&e.to_string()))?;
    let denied = state
        .sets
        .list(SetKind::Denied)
        .await
        .map_err(|e| RpcError::internal_error(&e.to_string()))?;

    Ok(serde_json::json!({
        "my_pulses": mine,
        "respected_pulses": respected,
        "denied_reports": denied,
    }))
}
