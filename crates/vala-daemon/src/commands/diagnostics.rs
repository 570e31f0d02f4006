//! Diagnostics and settings command handlers.

use std::sync::Arc;

use serde_json::Value;

use vala_engine::unix_now;

use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Daemon status snapshot.
pub async fn get_status(state: &Arc<DaemonState>) -> Result {
    let now = unix_now();
    let visible = state.store.snapshot(now).len();
    let radio = state.radio.lock().await;

    Ok(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "held_pulses": state.store.len(),
        "visible_pulses": visible,
        "store_revision": state.store.revision(),
        "event_sequence": state.event_bus.sequence(),
        "radio_idle": radio.is_idle(),
    }))
}

/// The effective daemon configuration.
pub async fn get_config(state: &Arc<DaemonState>) -> Result {
    serde_json::to_value(&state.config).map_err(|e| RpcError::internal_error(&e.to_string()))
}

/// Read a settings key.
pub async fn get_setting(state: &Arc<DaemonState>, params: &Value) -> Result {
    let key = params
        .get("key")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("key required"))?;

    let db = state.db.lock().await;
    match vala_db::queries::settings::get(&db, key) {
        Ok(value) => Ok(serde_json::json!({"key": key, "value": value})),
        Err(vala_db::DbError::NotFound(_)) => {
            Err(RpcError::invalid_params(&format!("unknown setting '{key}'")))
        }
        Err(e) => Err(RpcError::internal_error(&e.to_string())),
    }
}

/// Write a settings key.
pub async fn set_setting(state: &Arc<DaemonState>, params: &Value) -> Result {
    let key = params
        .get("key")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("key required"))?;
    let value = params
        .get("value")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("value required"))?;

    let db = state.db.lock().await;
    vala_db::queries::settings::set(&db, key, value)
        .map_err(|e| RpcError::internal_error(&e.to_string()))?;

    Ok(serde_json::json!({"key": key, "value": value}))
}
