//! IPC command handlers.
//!
//! `ledger` holds the write entry points, `queries` the read-only views and
//! payout queue maintenance.

pub mod ledger;
pub mod queries;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::rpc::RpcError;

/// Decode typed params, mapping failures to `INVALID_PARAMS`.
pub(crate) fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, RpcError> {
    serde_json::from_value(params.clone()).map_err(|e| RpcError::invalid_params(&e.to_string()))
}
