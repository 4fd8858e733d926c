//! Read-only views and payout queue handlers.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use accrue_db::queries::{global, producers, transfers, voters};
use accrue_types::Name;

use crate::commands::parse_params;
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

#[derive(Deserialize)]
struct ProducerParams {
    producer: Name,
}

#[derive(Deserialize)]
struct VoterParams {
    voter: Name,
}

#[derive(Deserialize, Default)]
struct ListProducersParams {
    #[serde(default)]
    registered_only: bool,
}

#[derive(Deserialize)]
struct MarkSentParams {
    id: i64,
}

fn to_json<T: serde::Serialize>(value: &T) -> Result {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(&e.to_string()))
}

/// Get the ledger-wide state.
pub async fn get_global_state(state: &Arc<DaemonState>) -> Result {
    let db = state.db.lock().await;
    let global = global::get(&db)?
        .ok_or_else(|| RpcError::not_found("reward ledger has not been initialized"))?;
    to_json(&global)
}

/// Get one producer record.
pub async fn get_producer(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: ProducerParams = parse_params(params)?;
    let db = state.db.lock().await;
    let producer = producers::get(&db, &p.producer)?
        .ok_or_else(|| RpcError::not_found(&format!("producer not found: {}", p.producer)))?;
    let voter_count = voters::count_for_producer(&db, &p.producer)?;

    let mut value = to_json(&producer)?;
    value["voter_count"] = serde_json::json!(voter_count);
    Ok(value)
}

/// Whether a producer is registered.
pub async fn is_producer_registered(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: ProducerParams = parse_params(params)?;
    let db = state.db.lock().await;
    let registered = producers::get(&db, &p.producer)?.is_some_and(|record| record.is_registered);
    Ok(serde_json::json!({"producer": p.producer, "is_registered": registered}))
}

/// List producer records.
pub async fn list_producers(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: ListProducersParams = if params.is_null() {
        ListProducersParams::default()
    } else {
        parse_params(params)?
    };
    let db = state.db.lock().await;
    to_json(&producers::list(&db, p.registered_only)?)
}

/// Get one voter record with its snapshots.
pub async fn get_voter(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: VoterParams = parse_params(params)?;
    let db = state.db.lock().await;
    let voter = voters::get(&db, &p.voter)?
        .ok_or_else(|| RpcError::not_found(&format!("voter not found: {}", p.voter)))?;
    to_json(&voter)
}

/// Payouts queued by claims but not yet delivered.
pub async fn list_pending_transfers(state: &Arc<DaemonState>) -> Result {
    let db = state.db.lock().await;
    to_json(&transfers::pending(&db)?)
}

/// Acknowledge delivery of a queued payout.
pub async fn mark_transfer_sent(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: MarkSentParams = parse_params(params)?;
    let db = state.db.lock().await;
    if !transfers::mark_sent(&db, p.id)? {
        return Err(RpcError::not_found(&format!("no pending transfer {}", p.id)));
    }
    tracing::info!(id = p.id, "payout delivered");
    Ok(serde_json::json!({"id": p.id, "sent": true}))
}
