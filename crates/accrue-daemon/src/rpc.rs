//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! newline-delimited JSON-RPC calls to the command handlers. A connection
//! that calls `subscribe_events` additionally receives matching events as
//! `event` notifications until it calls `unsubscribe_events` or closes.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use accrue_ledger::{ErrorKind, LedgerError};

use crate::commands;
use crate::events::{Event, EventFilter};
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

/// JSON-RPC notification pushed to subscribers.
#[derive(Debug, Serialize)]
pub struct RpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: &'a Event,
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

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self {
            code: -32600,
            message: "INVALID_REQUEST".to_string(),
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

    // Ledger errors

    /// Input rejected before any mutation (-32020).
    pub fn validation_failed(detail: &str) -> Self {
        Self {
            code: -32020,
            message: "VALIDATION_FAILED".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Ledger invariant would break (-32021).
    pub fn invariant_violation(detail: &str) -> Self {
        Self {
            code: -32021,
            message: "INVARIANT_VIOLATION".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Record missing or ledger not initialized (-32022).
    pub fn not_found(detail: &str) -> Self {
        Self {
            code: -32022,
            message: "NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Required signer absent (-32023).
    pub fn unauthorized(detail: &str) -> Self {
        Self {
            code: -32023,
            message: "UNAUTHORIZED".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Payout could not be queued (-32030).
    pub fn transfer_failed(detail: &str) -> Self {
        Self {
            code: -32030,
            message: "TRANSFER_FAILED".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }
}

impl From<LedgerError> for RpcError {
    fn from(err: LedgerError) -> Self {
        let detail = err.to_string();
        match err.kind() {
            ErrorKind::Validation => Self::validation_failed(&detail),
            ErrorKind::Invariant => {
                error!("ledger invariant violated: {detail}");
                Self::invariant_violation(&detail)
            }
            ErrorKind::NotFound => Self::not_found(&detail),
            ErrorKind::Unauthorized => Self::unauthorized(&detail),
            ErrorKind::Transfer => Self::transfer_failed(&detail),
            ErrorKind::Storage => Self::internal_error(&detail),
        }
    }
}

impl From<accrue_db::DbError> for RpcError {
    fn from(err: accrue_db::DbError) -> Self {
        Self::internal_error(&format!("db error: {err}"))
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

/// An active event subscription on one connection.
struct Subscription {
    rx: broadcast::Receiver<Event>,
    filter: EventFilter,
}

/// What woke a connection up.
enum Incoming {
    Line(Option<String>),
    Event(Result<Event, broadcast::error::RecvError>),
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut subscription: Option<Subscription> = None;

    loop {
        let line = match subscription.as_mut() {
            Some(sub) => tokio::select! {
                line = lines.next_line() => Incoming::Line(line?),
                event = sub.rx.recv() => Incoming::Event(event),
            },
            None => Incoming::Line(lines.next_line().await?),
        };

        let line = match line {
            Incoming::Line(line) => line,
            Incoming::Event(Ok(event)) => {
                let matches = subscription
                    .as_ref()
                    .is_some_and(|sub| sub.filter.matches(&event));
                if matches {
                    let note = RpcNotification {
                        jsonrpc: "2.0",
                        method: "event",
                        params: &event,
                    };
                    write_line(&mut writer, &note).await?;
                }
                continue;
            }
            Incoming::Event(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                warn!("Subscriber lagged, {} events dropped", skipped);
                continue;
            }
            Incoming::Event(Err(broadcast::error::RecvError::Closed)) => {
                subscription = None;
                continue;
            }
        };

        let Some(line) = line else {
            break; // EOF
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) if request.jsonrpc != "2.0" => {
                RpcResponse::error(request.id, RpcError::invalid_request())
            }
            Ok(request) => match request.method.as_str() {
                "subscribe_events" => {
                    let filter = if request.params.is_null() {
                        Ok(EventFilter::default())
                    } else {
                        serde_json::from_value::<EventFilter>(request.params.clone())
                    };
                    match filter {
                        Ok(filter) => {
                            subscription = Some(Subscription {
                                rx: state.event_bus.subscribe(),
                                filter,
                            });
                            RpcResponse::success(
                                request.id,
                                serde_json::json!({"subscribed": true}),
                            )
                        }
                        Err(e) => RpcResponse::error(
                            request.id,
                            RpcError::invalid_params(&e.to_string()),
                        ),
                    }
                }
                "unsubscribe_events" => {
                    let was = subscription.take().is_some();
                    RpcResponse::success(request.id, serde_json::json!({"unsubscribed": was}))
                }
                _ => dispatch_request(state.clone(), request).await,
            },
            Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
        };

        write_line(&mut writer, &response).await?;
    }

    Ok(())
}

async fn write_line<T: Serialize>(writer: &mut OwnedWriteHalf, message: &T) -> anyhow::Result<()> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
pub async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();
    let params = &request.params;

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Ledger writes
        "init" => commands::ledger::init(&state, params).await,
        "register_producer" => commands::ledger::register_producer(&state, params).await,
        "add_vote" => commands::ledger::add_vote(&state, params).await,
        "sub_vote" => commands::ledger::sub_vote(&state, params).await,
        "vote_for_producers" => commands::ledger::vote_for_producers(&state, params).await,
        "claim" => commands::ledger::claim(&state, params).await,
        "claim_for" => commands::ledger::claim_for(&state, params).await,
        "on_deposit" => commands::ledger::on_deposit(&state, params).await,

        // Reads
        "get_global_state" => commands::queries::get_global_state(&state).await,
        "get_producer" => commands::queries::get_producer(&state, params).await,
        "is_producer_registered" => {
            commands::queries::is_producer_registered(&state, params).await
        }
        "list_producers" => commands::queries::list_producers(&state, params).await,
        "get_voter" => commands::queries::get_voter(&state, params).await,

        // Payout queue
        "list_pending_transfers" => commands::queries::list_pending_transfers(&state).await,
        "mark_transfer_sent" => commands::queries::mark_transfer_sent(&state, params).await,

        // Daemon
        "get_daemon_status" => Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "events_emitted": state.event_bus.sequence(),
            "system_account": state.ledger_config.system_account,
            "token_account": state.ledger_config.token_account,
        })),
        "shutdown" => {
            let _ = state.shutdown_tx.send(());
            Ok(serde_json::json!({"stopping": true}))
        }

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => {
            warn!("RPC {} rejected: {} ({})", method, err.message, err.code);
            RpcResponse::error(id, err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{signed, state};

    fn request(method: &str, params: serde_json::Value) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: serde_json::json!(1),
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn test_rpc_error_codes() {
        let err = RpcError::method_not_found("unknown");
        assert_eq!(err.code, -32601);

        let err: RpcError = LedgerError::NonPositiveVotes.into();
        assert_eq!(err.code, -32020);
        assert_eq!(err.message, "VALIDATION_FAILED");

        let err: RpcError = LedgerError::NotInitialized.into();
        assert_eq!(err.code, -32022);

        let err: RpcError = LedgerError::Invariant("boom".into()).into();
        assert_eq!(err.code, -32021);

        let err: RpcError = LedgerError::Storage("disk".into()).into();
        assert_eq!(err.code, -32603);
    }

    #[test]
    fn test_rpc_response_success() {
        let resp = RpcResponse::success(serde_json::json!(1), serde_json::json!({"ok": true}));
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_rpc_response_error() {
        let resp = RpcResponse::error(serde_json::json!(1), RpcError::internal_error("test"));
        assert!(resp.result.is_none());
        assert!(resp.error.is_some());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let resp = dispatch_request(state(), request("nope", serde_json::Value::Null)).await;
        assert_eq!(resp.error.expect("error").code, -32601);
    }

    #[tokio::test]
    async fn test_dispatch_init_then_read() {
        let state = state();
        let resp = dispatch_request(
            state.clone(),
            request("init", signed(&["flon"], serde_json::json!({}))),
        )
        .await;
        assert!(resp.error.is_none(), "{:?}", resp.error);

        let resp = dispatch_request(state, request("get_global_state", serde_json::Value::Null)).await;
        let result = resp.result.expect("result");
        assert_eq!(result["total_rewards"], "0.0000 FLON");
    }

    async fn read_json(
        lines: &mut tokio::io::Lines<BufReader<tokio::net::unix::OwnedReadHalf>>,
    ) -> serde_json::Value {
        let line = lines.next_line().await.expect("read").expect("line");
        serde_json::from_str(&line).expect("json")
    }

    #[tokio::test]
    async fn test_connection_streams_events() {
        let (client, server) = tokio::net::UnixStream::pair().expect("socket pair");
        tokio::spawn(handle_connection(state(), server));

        let (reader, mut writer) = client.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"subscribe_events\"}\n")
            .await
            .expect("write");
        let resp = read_json(&mut lines).await;
        assert_eq!(resp["result"]["subscribed"], true);

        writer
            .write_all(
                b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"init\",\"params\":{\"signers\":[\"flon\"]}}\n",
            )
            .await
            .expect("write");
        let resp = read_json(&mut lines).await;
        assert_eq!(resp["id"], 2);
        assert_eq!(resp["result"]["symbol"], "4,FLON");

        let note = read_json(&mut lines).await;
        assert_eq!(note["method"], "event");
        assert_eq!(note["params"]["event_type"], "LedgerInitialized");
    }

    #[tokio::test]
    async fn test_dispatch_maps_ledger_errors() {
        let resp = dispatch_request(
            state(),
            request(
                "register_producer",
                signed(&["bp1"], serde_json::json!({"producer": "bp1"})),
            ),
        )
        .await;
        let err = resp.error.expect("error");
        assert_eq!(err.code, -32022);
    }
}
