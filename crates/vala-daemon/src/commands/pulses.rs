//! Pulse submission, queries, and clustering command handlers.

use std::sync::Arc;

use base64::Engine as _;
use serde_json::Value;

use vala_engine::cluster::{self, MapEntity};
use vala_engine::lifecycle;
use vala_engine::ledger::SetKind;
use vala_engine::remote::Geocoder;
use vala_engine::submit::{SubmitError, Submission, Submitter};
use vala_engine::unix_now;
use vala_types::geo::{BoundingBox, LatLng};
use vala_types::pulse::PulseCategory;

use crate::events::Event;
use crate::rpc::RpcError;
use crate::service::ReportedFix;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

fn submit_err(e: SubmitError) -> RpcError {
    match e {
        SubmitError::EmptyAudio => RpcError::invalid_params("audio payload is empty"),
        SubmitError::InvalidCategory(category) => {
            RpcError::invalid_params(&format!("invalid category {category:?}"))
        }
        SubmitError::Upload(e) | SubmitError::Insert(e) | SubmitError::Delete(e) => {
            RpcError::network_failure(&e.to_string())
        }
        SubmitError::NotOwner(id) => RpcError::not_owner(&id),
        SubmitError::Sets(e) => RpcError::internal_error(&e.to_string()),
    }
}

/// The optional `position: {lat, lng}` request field.
fn parse_position(params: &Value) -> Option<LatLng> {
    let position = params.get("position")?;
    Some(LatLng {
        lat: position.get("lat")?.as_f64()?,
        lng: position.get("lng")?.as_f64()?,
    })
}

fn submitter(state: &Arc<DaemonState>, fix: ReportedFix) -> Submitter<
    crate::service::LocalPulseService,
    crate::service::FsBlobStore,
    ReportedFix,
    crate::service::DeviceStore,
> {
    Submitter::new(
        state.remote.clone(),
        state.blobs.clone(),
        fix,
        state.sets.clone(),
        state.store.clone(),
        state.updates_tx.clone(),
    )
}

/// Drop a recorded voice pulse.
pub async fn drop_pulse(state: &Arc<DaemonState>, params: &Value) -> Result {
    let audio_b64 = params
        .get("audio_b64")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("audio_b64 required"))?;
    let audio = base64::engine::general_purpose::STANDARD
        .decode(audio_b64)
        .map_err(|_| RpcError::invalid_params("audio_b64 is not valid base64"))?;

    let peak_energy = params
        .get("peak_energy")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| RpcError::invalid_params("peak_energy required"))?;

    let category = match params.get("category").and_then(|v| v.as_str()) {
        Some(tag) => PulseCategory::parse(tag)
            .ok_or_else(|| RpcError::invalid_params(&format!("unknown category '{tag}'")))?,
        None => PulseCategory::Chat,
    };

    let submission = Submission {
        audio,
        content_type: params
            .get("content_type")
            .and_then(|v| v.as_str())
            .unwrap_or("audio/webm")
            .to_string(),
        peak_energy,
        category,
        parent_id: params
            .get("parent_id")
            .and_then(|v| v.as_str())
            .map(String::from),
    };

    let fix = ReportedFix(parse_position(params));
    let pulse = submitter(state, fix)
        .submit(submission)
        .await
        .map_err(submit_err)?;

    state.event_bus.emit(Event::now(
        "PulseDropped",
        serde_json::json!({"pulse_id": pulse.id, "category": pulse.category}),
    ));

    serde_json::to_value(&pulse).map_err(|e| RpcError::internal_error(&e.to_string()))
}

/// Drop an audio-less quick report.
pub async fn quick_report(state: &Arc<DaemonState>, params: &Value) -> Result {
    let kind = params
        .get("kind")
        .and_then(|v| v.as_str())
        .and_then(PulseCategory::parse)
        .ok_or_else(|| RpcError::invalid_params("kind must be quick-police or quick-traffic"))?;

    let parent_id = params
        .get("parent_id")
        .and_then(|v| v.as_str())
        .map(String::from);

    let fix = ReportedFix(parse_position(params));
    let pulse = submitter(state, fix)
        .submit_quick(kind, parent_id)
        .await
        .map_err(submit_err)?;

    state.event_bus.emit(Event::now(
        "QuickReportDropped",
        serde_json::json!({"pulse_id": pulse.id, "category": pulse.category}),
    ));

    serde_json::to_value(&pulse).map_err(|e| RpcError::internal_error(&e.to_string()))
}

/// Delete one of this device's own pulses.
pub async fn delete_pulse(state: &Arc<DaemonState>, params: &Value) -> Result {
    let pulse_id = params
        .get("pulse_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("pulse_id required"))?
        .to_string();

    let fix = ReportedFix(None);
    submitter(state, fix)
        .delete_own(&pulse_id)
        .await
        .map_err(submit_err)?;

    state.event_bus.emit(Event::now(
        "PulseDeleted",
        serde_json::json!({"pulse_id": pulse_id}),
    ));

    Ok(serde_json::json!({"deleted": true}))
}

/// All currently visible pulses, newest first, with the fade fraction the
/// UI renders.
pub async fn get_pulses(state: &Arc<DaemonState>) -> Result {
    let now = unix_now();
    let pulses: Vec<Value> = state
        .store
        .snapshot(now)
        .into_iter()
        .map(|p| {
            let life = lifecycle::life_remaining(&p, now);
            let mut value = serde_json::to_value(&p).unwrap_or(Value::Null);
            if let Some(map) = value.as_object_mut() {
                map.insert("life_remaining".to_string(), serde_json::json!(life));
            }
            value
        })
        .collect();

    Ok(serde_json::json!({
        "pulses": pulses,
        "revision": state.store.revision(),
    }))
}

/// Cluster the visible pulses for the given viewport. Bounds default to
/// the configured map viewport when omitted.
pub async fn get_clusters(state: &Arc<DaemonState>, params: &Value) -> Result {
    let bounds: BoundingBox = match params.get("bounds") {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|_| RpcError::invalid_params("bounds must be {west, south, east, north}"))?,
        None => state.config.map_bounds(),
    };
    let zoom = params
        .get("zoom")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| RpcError::invalid_params("zoom required"))?;

    let snapshot = state.store.snapshot(unix_now());
    let entities: Vec<Value> = cluster::cluster(&snapshot, &bounds, zoom)
        .into_iter()
        .map(|entity| match entity {
            MapEntity::Single(pulse) => serde_json::json!({
                "type": "single",
                "pulse": pulse,
            }),
            MapEntity::Cluster(node) => {
                let leaves = cluster::expand(&node);
                serde_json::json!({
                    "type": "cluster",
                    "lat": node.lat,
                    "lng": node.lng,
                    "count": node.count,
                    "leaves": leaves,
                })
            }
        })
        .collect();

    Ok(serde_json::json!({"entities": entities}))
}

/// The pulses this device dropped, resolved against the current view.
pub async fn get_my_pulses(state: &Arc<DaemonState>) -> Result {
    use vala_engine::ledger::DeviceSets as _;

    let ids = state
        .sets
        .list(SetKind::MyPulses)
        .await
        .map_err(|e| RpcError::internal_error(&e.to_string()))?;

    let now = unix_now();
    let pulses: Vec<Value> = ids
        .iter()
        .filter_map(|id| state.store.get(id))
        .filter(|p| lifecycle::is_visible(p, now))
        .map(|p| serde_json::to_value(&p).unwrap_or(Value::Null))
        .collect();

    Ok(serde_json::json!({"ids": ids, "pulses": pulses}))
}

/// Reverse-geocode a coordinate into a display string.
pub async fn describe_location(state: &Arc<DaemonState>, params: &Value) -> Result {
    let lat = params
        .get("lat")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| RpcError::invalid_params("lat required"))?;
    let lng = params
        .get("lng")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| RpcError::invalid_params("lng required"))?;

    let street = state
        .geocoder
        .lookup(lat, lng)
        .await
        .map_err(|e| RpcError::network_failure(&e.to_string()))?;

    Ok(serde_json::json!({"street": street}))
}
