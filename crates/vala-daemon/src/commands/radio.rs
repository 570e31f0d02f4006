//! Radio-mode command handlers.
//!
//! The daemon owns the queue state machine; the UI owns the audio element
//! and reports natural completion via `radio_next`.

use std::sync::Arc;

use serde_json::Value;

use vala_engine::playback::{PlaybackError, PlaybackStatus};
use vala_types::pulse::Pulse;

use crate::events::Event;
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

fn playback_err(e: PlaybackError) -> RpcError {
    match e {
        PlaybackError::EmptyQueue => RpcError::empty_queue(),
        PlaybackError::NoAudio(id) => RpcError::no_audio(&id),
    }
}

fn pulse_json(pulse: &Pulse) -> Value {
    serde_json::to_value(pulse).unwrap_or(Value::Null)
}

/// Start radio mode over an ordered pulse id list (typically expanded
/// cluster leaves, already ranked).
pub async fn radio_start(state: &Arc<DaemonState>, params: &Value) -> Result {
    let ids = params
        .get("pulse_ids")
        .and_then(|v| v.as_array())
        .ok_or_else(|| RpcError::invalid_params("pulse_ids required"))?;

    // Resolve against the store, preserving order; ids that expired since
    // the client fetched them are skipped.
    let list: Vec<Pulse> = ids
        .iter()
        .filter_map(|v| v.as_str())
        .filter_map(|id| state.store.get(id))
        .collect();

    let mut radio = state.radio.lock().await;
    let first = radio.start(list).map_err(playback_err)?;

    state.event_bus.emit(Event::now(
        "RadioStarted",
        serde_json::json!({"pulse_id": first.id}),
    ));

    Ok(serde_json::json!({"playing": pulse_json(first)}))
}

/// Natural completion of the current pulse's audio; advance the queue.
pub async fn radio_next(state: &Arc<DaemonState>) -> Result {
    let mut radio = state.radio.lock().await;
    match radio.complete() {
        Some(next) => {
            let payload = pulse_json(next);
            state.event_bus.emit(Event::now(
                "RadioAdvanced",
                serde_json::json!({"pulse_id": next.id}),
            ));
            Ok(serde_json::json!({"playing": payload}))
        }
        None => {
            state
                .event_bus
                .emit(Event::now("RadioStopped", serde_json::json!({})));
            Ok(serde_json::json!({"playing": Value::Null}))
        }
    }
}

/// Cancel playback immediately.
pub async fn radio_stop(state: &Arc<DaemonState>) -> Result {
    let mut radio = state.radio.lock().await;
    radio.stop();
    state
        .event_bus
        .emit(Event::now("RadioStopped", serde_json::json!({})));
    Ok(serde_json::json!({"stopped": true}))
}

/// Manual selection: cancels autoplay, plays one pulse as a one-off.
pub async fn radio_play(state: &Arc<DaemonState>, params: &Value) -> Result {
    let pulse_id = params
        .get("pulse_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("pulse_id required"))?;

    let pulse = state
        .store
        .get(pulse_id)
        .ok_or_else(|| RpcError::pulse_not_found(pulse_id))?;

    let mut radio = state.radio.lock().await;
    radio.select(pulse.clone()).map_err(playback_err)?;

    state.event_bus.emit(Event::now(
        "RadioSolo",
        serde_json::json!({"pulse_id": pulse.id}),
    ));

    Ok(serde_json::json!({"playing": pulse_json(&pulse)}))
}

/// Current playback status.
pub async fn radio_status(state: &Arc<DaemonState>) -> Result {
    let radio = state.radio.lock().await;
    let status = match radio.status() {
        PlaybackStatus::Idle => serde_json::json!({"state": "idle"}),
        PlaybackStatus::Playing { pulse, index, of } => serde_json::json!({
            "state": "playing",
            "index": index,
            "of": of,
            "pulse": pulse_json(&pulse),
        }),
        PlaybackStatus::Solo { pulse } => serde_json::json!({
            "state": "solo",
            "pulse": pulse_json(&pulse),
        }),
    };
    Ok(status)
}
