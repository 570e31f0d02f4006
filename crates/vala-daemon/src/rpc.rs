//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! JSON-RPC method calls to the appropriate command handlers. A
//! `subscribe_events` call upgrades the connection into a notification
//! stream fed from the event bus.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use crate::commands;
use crate::events::EventFilter;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Error code.
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "PARSE_ERROR".to_string(),
            data: None,
        }
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"method": method})),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self {
            code: -32602,
            message: "INVALID_PARAMS".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self {
            code: -32603,
            message: "INTERNAL_ERROR".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    // Domain errors

    /// Already voted (-32020). Surfaced by clients as a no-op
    /// notification, not an error dialog.
    pub fn already_voted(pulse_id: &str) -> Self {
        Self {
            code: -32020,
            message: "ALREADY_VOTED".to_string(),
            data: Some(serde_json::json!({"pulse_id": pulse_id})),
        }
    }

    /// Not a quick report (-32021).
    pub fn not_a_quick_report(pulse_id: &str) -> Self {
        Self {
            code: -32021,
            message: "NOT_A_QUICK_REPORT".to_string(),
            data: Some(serde_json::json!({"pulse_id": pulse_id})),
        }
    }

    /// Not the owner (-32022).
    pub fn not_owner(pulse_id: &str) -> Self {
        Self {
            code: -32022,
            message: "NOT_OWNER".to_string(),
            data: Some(serde_json::json!({"pulse_id": pulse_id})),
        }
    }

    /// Pulse not found (-32023).
    pub fn pulse_not_found(pulse_id: &str) -> Self {
        Self {
            code: -32023,
            message: "PULSE_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"pulse_id": pulse_id})),
        }
    }

    /// Empty playback queue (-32030).
    pub fn empty_queue() -> Self {
        Self {
            code: -32030,
            message: "EMPTY_QUEUE".to_string(),
            data: None,
        }
    }

    /// Pulse carries no audio (-32031).
    pub fn no_audio(pulse_id: &str) -> Self {
        Self {
            code: -32031,
            message: "NO_AUDIO".to_string(),
            data: Some(serde_json::json!({"pulse_id": pulse_id})),
        }
    }

    /// Upload or insert failed (-32040).
    pub fn network_failure(detail: &str) -> Self {
        Self {
            code: -32040,
            message: "NETWORK_FAILURE".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }

        let request = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => request,
            Err(_) => {
                write_json(
                    &mut writer,
                    &RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
                )
                .await?;
                continue;
            }
        };

        // subscribe_events upgrades this connection into an event stream.
        if request.method == "subscribe_events" {
            let filter: EventFilter =
                serde_json::from_value(request.params.clone()).unwrap_or_default();
            write_json(
                &mut writer,
                &RpcResponse::success(request.id, serde_json::json!({"subscribed": true})),
            )
            .await?;
            return stream_events(state, reader, writer, filter).await;
        }

        let response = dispatch_request(state.clone(), request).await;
        write_json(&mut writer, &response).await?;
    }

    Ok(())
}

/// Forward matching bus events to the client until it disconnects.
async fn stream_events(
    state: Arc<DaemonState>,
    mut reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    mut writer: tokio::net::unix::OwnedWriteHalf,
    filter: EventFilter,
) -> anyhow::Result<()> {
    let mut events = state.event_bus.subscribe();
    let mut line = String::new();

    loop {
        line.clear();
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) if filter.matches(&event) => {
                        let notification = serde_json::json!({
                            "jsonrpc": "2.0",
                            "method": "event",
                            "params": event,
                        });
                        let mut payload = serde_json::to_string(&notification)?;
                        payload.push('\n');
                        writer.write_all(payload.as_bytes()).await?;
                        writer.flush().await?;
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event subscriber lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            read = reader.read_line(&mut line) => {
                // Any read result besides data means the client went away;
                // further requests on a streaming connection are ignored.
                if matches!(read, Ok(0) | Err(_)) {
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn write_json(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    response: &RpcResponse,
) -> anyhow::Result<()> {
    let mut payload = serde_json::to_string(response)?;
    payload.push('\n');
    writer.write_all(payload.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Pulse commands
        "drop_pulse" => commands::pulses::drop_pulse(&state, &request.params).await,
        "quick_report" => commands::pulses::quick_report(&state, &request.params).await,
        "delete_pulse" => commands::pulses::delete_pulse(&state, &request.params).await,
        "get_pulses" => commands::pulses::get_pulses(&state).await,
        "get_clusters" => commands::pulses::get_clusters(&state, &request.params).await,
        "get_my_pulses" => commands::pulses::get_my_pulses(&state).await,
        "describe_location" => {
            commands::pulses::describe_location(&state, &request.params).await
        }

        // Vote commands
        "give_respect" => commands::votes::give_respect(&state, &request.params).await,
        "confirm_report" => commands::votes::confirm_report(&state, &request.params).await,
        "deny_report" => commands::votes::deny_report(&state, &request.params).await,
        "get_vote_sets" => commands::votes::get_vote_sets(&state).await,

        // Radio commands
        "radio_start" => commands::radio::radio_start(&state, &request.params).await,
        "radio_next" => commands::radio::radio_next(&state).await,
        "radio_stop" => commands::radio::radio_stop(&state).await,
        "radio_play" => commands::radio::radio_play(&state, &request.params).await,
        "radio_status" => commands::radio::radio_status(&state).await,

        // Diagnostics commands
        "get_status" => commands::diagnostics::get_status(&state).await,
        "get_config" => commands::diagnostics::get_config(&state).await,
        "get_setting" => commands::diagnostics::get_setting(&state, &request.params).await,
        "set_setting" => commands::diagnostics::set_setting(&state, &request.params).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_codes() {
        let err = RpcError::already_voted("p1");
        assert_eq!(err.code, -32020);
        assert_eq!(err.message, "ALREADY_VOTED");

        let err = RpcError::empty_queue();
        assert_eq!(err.code, -32030);

        let err = RpcError::method_not_found("unknown");
        assert_eq!(err.code, -32601);
    }

    #[test]
    fn test_rpc_response_success() {
        let resp = RpcResponse::success(
            serde_json::json!(1),
            serde_json::json!({"pulses": []}),
        );
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_rpc_response_error() {
        let resp = RpcResponse::error(serde_json::json!(1), RpcError::internal_error("test"));
        assert!(resp.result.is_none());
        assert!(resp.error.is_some());
    }

    #[test]
    fn test_request_parses_without_params() {
        let request: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"get_pulses"}"#)
                .expect("parse");
        assert_eq!(request.method, "get_pulses");
        assert!(request.params.is_null());
    }
}
