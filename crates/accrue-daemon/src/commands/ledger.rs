//! Ledger write handlers.
//!
//! Each handler opens one SQLite transaction, runs a single ledger entry
//! point against it and commits only if the entry point succeeded. Claims
//! queue their payout through the same transaction. Events go out after
//! the commit.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use accrue_db::{SqliteOutbox, SqliteStore};
use accrue_ledger::{RewardLedger, Signers, SystemClock};
use accrue_types::{Asset, Name, Symbol};

use crate::commands::parse_params;
use crate::events::{kind, Event};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

type SqliteLedger<'a> = RewardLedger<SqliteStore<'a>, SqliteOutbox<'a>, &'a SystemClock>;

#[derive(Deserialize)]
struct InitParams {
    signers: Vec<Name>,
    /// Defaults to `ledger.core_symbol` from the config.
    #[serde(default)]
    symbol: Option<Symbol>,
}

#[derive(Deserialize)]
struct ProducerParams {
    signers: Vec<Name>,
    producer: Name,
}

#[derive(Deserialize)]
struct VoteParams {
    signers: Vec<Name>,
    voter: Name,
    votes: i64,
}

#[derive(Deserialize)]
struct VoteProducersParams {
    signers: Vec<Name>,
    voter: Name,
    producers: Vec<Name>,
}

#[derive(Deserialize)]
struct ClaimParams {
    signers: Vec<Name>,
    voter: Name,
}

#[derive(Deserialize)]
struct ClaimForParams {
    signers: Vec<Name>,
    claimer: Name,
    voter: Name,
}

#[derive(Deserialize)]
struct DepositParams {
    signers: Vec<Name>,
    producer: Name,
    quantity: Asset,
}

/// Run `op` against a ledger bound to a fresh transaction.
async fn in_transaction<R>(
    state: &Arc<DaemonState>,
    op: impl FnOnce(&mut SqliteLedger<'_>) -> accrue_ledger::Result<R>,
) -> std::result::Result<R, RpcError> {
    let mut db = state.db.lock().await;
    let tx = db
        .transaction()
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;

    let out = {
        let mut ledger = RewardLedger::new(
            SqliteStore::new(&tx),
            SqliteOutbox::new(&tx),
            &state.clock,
            state.ledger_config.clone(),
        );
        op(&mut ledger)?
    };

    tx.commit()
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
    Ok(out)
}

fn emit(state: &DaemonState, event_type: &str, payload: Value) {
    state
        .event_bus
        .emit(Event::new(event_type, state.now(), payload));
}

/// Initialize the ledger with its core symbol.
pub async fn init(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: InitParams = parse_params(params)?;
    let symbol = match p.symbol {
        Some(symbol) => symbol,
        None => state
            .config
            .ledger
            .core_symbol()
            .map_err(|e| RpcError::internal_error(&e.to_string()))?,
    };
    let signers = Signers::new(p.signers);

    in_transaction(state, |ledger| ledger.init(&signers, &symbol)).await?;

    emit(
        state,
        kind::LEDGER_INITIALIZED,
        serde_json::json!({"symbol": symbol}),
    );
    Ok(serde_json::json!({"symbol": symbol}))
}

/// Register a producer.
pub async fn register_producer(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: ProducerParams = parse_params(params)?;
    let signers = Signers::new(p.signers);

    in_transaction(state, |ledger| ledger.register_producer(&signers, &p.producer)).await?;

    emit(
        state,
        kind::PRODUCER_REGISTERED,
        serde_json::json!({"producer": p.producer}),
    );
    Ok(serde_json::json!({"producer": p.producer, "is_registered": true}))
}

/// Increase a voter's weight.
pub async fn add_vote(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: VoteParams = parse_params(params)?;
    let signers = Signers::new(p.signers);

    let votes = in_transaction(state, |ledger| {
        ledger.add_vote(&signers, &p.voter, p.votes)?;
        current_votes(ledger, &p.voter)
    })
    .await?;

    emit(
        state,
        kind::VOTES_CHANGED,
        serde_json::json!({"voter": p.voter, "delta": p.votes, "votes": votes}),
    );
    Ok(serde_json::json!({"voter": p.voter, "votes": votes}))
}

/// Decrease a voter's weight.
pub async fn sub_vote(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: VoteParams = parse_params(params)?;
    let signers = Signers::new(p.signers);

    let votes = in_transaction(state, |ledger| {
        ledger.sub_vote(&signers, &p.voter, p.votes)?;
        current_votes(ledger, &p.voter)
    })
    .await?;

    emit(
        state,
        kind::VOTES_CHANGED,
        serde_json::json!({"voter": p.voter, "delta": -p.votes, "votes": votes}),
    );
    Ok(serde_json::json!({"voter": p.voter, "votes": votes}))
}

/// Replace a voter's producer set.
pub async fn vote_for_producers(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: VoteProducersParams = parse_params(params)?;
    let signers = Signers::new(p.signers);

    in_transaction(state, |ledger| {
        ledger.vote_for_producers(&signers, &p.voter, &p.producers)
    })
    .await?;

    emit(
        state,
        kind::PRODUCERS_VOTED,
        serde_json::json!({"voter": p.voter, "producers": p.producers}),
    );
    Ok(serde_json::json!({"voter": p.voter, "producers": p.producers}))
}

/// Settle and pay out a voter's rewards.
pub async fn claim(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: ClaimParams = parse_params(params)?;
    let signers = Signers::new(p.signers);

    let quantity = in_transaction(state, |ledger| ledger.claim(&signers, &p.voter)).await?;

    emit(
        state,
        kind::REWARDS_CLAIMED,
        serde_json::json!({"voter": p.voter, "claimer": p.voter, "quantity": quantity}),
    );
    Ok(serde_json::json!({"voter": p.voter, "quantity": quantity}))
}

/// Settle and pay out a voter's rewards on the claimer's authority.
pub async fn claim_for(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: ClaimForParams = parse_params(params)?;
    let signers = Signers::new(p.signers);

    let quantity = in_transaction(state, |ledger| {
        ledger.claim_for(&signers, &p.claimer, &p.voter)
    })
    .await?;

    emit(
        state,
        kind::REWARDS_CLAIMED,
        serde_json::json!({"voter": p.voter, "claimer": p.claimer, "quantity": quantity}),
    );
    Ok(serde_json::json!({"voter": p.voter, "quantity": quantity}))
}

/// Book a producer's reward deposit reported by the token ledger.
pub async fn on_deposit(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: DepositParams = parse_params(params)?;
    let signers = Signers::new(p.signers);

    let rewards_per_vote = in_transaction(state, |ledger| {
        ledger.on_deposit(&signers, &p.producer, &p.quantity)?;
        Ok(ledger
            .producer(&p.producer)?
            .map(|record| record.rewards_per_vote)
            .unwrap_or_default())
    })
    .await?;

    emit(
        state,
        kind::DEPOSIT_RECEIVED,
        serde_json::json!({"producer": p.producer, "quantity": p.quantity}),
    );
    Ok(serde_json::json!({
        "producer": p.producer,
        "quantity": p.quantity,
        "rewards_per_vote": rewards_per_vote.to_string(),
    }))
}

fn current_votes(ledger: &SqliteLedger<'_>, voter: &Name) -> accrue_ledger::Result<i64> {
    Ok(ledger.voter(voter)?.map(|v| v.votes).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{signed, state};

    async fn bootstrap(state: &Arc<DaemonState>) {
        init(state, &signed(&["flon"], serde_json::json!({})))
            .await
            .expect("init");
        register_producer(
            state,
            &signed(&["bp1"], serde_json::json!({"producer": "bp1"})),
        )
        .await
        .expect("register");
    }

    #[tokio::test]
    async fn test_claim_queues_payout() {
        let state = state();
        bootstrap(&state).await;
        let mut events = state.event_bus.subscribe();

        add_vote(
            &state,
            &signed(&["flon", "alice"], serde_json::json!({"voter": "alice", "votes": 100})),
        )
        .await
        .expect("add_vote");
        vote_for_producers(
            &state,
            &signed(
                &["flon", "alice"],
                serde_json::json!({"voter": "alice", "producers": ["bp1"]}),
            ),
        )
        .await
        .expect("vote");
        on_deposit(
            &state,
            &signed(
                &["flon.token"],
                serde_json::json!({"producer": "bp1", "quantity": "10.0000 FLON"}),
            ),
        )
        .await
        .expect("deposit");

        let result = claim(&state, &signed(&["alice"], serde_json::json!({"voter": "alice"})))
            .await
            .expect("claim");
        assert_eq!(result["quantity"], "10.0000 FLON");

        let db = state.db.lock().await;
        let pending = accrue_db::queries::transfers::pending(&db).expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].recipient.as_str(), "alice");
        assert_eq!(pending[0].memo, "voted rewards");
        drop(db);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event.event_type);
        }
        assert_eq!(
            seen,
            vec![
                kind::VOTES_CHANGED,
                kind::PRODUCERS_VOTED,
                kind::DEPOSIT_RECEIVED,
                kind::REWARDS_CLAIMED,
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_call_rolls_back() {
        let state = state();
        bootstrap(&state).await;

        let err = sub_vote(
            &state,
            &signed(&["flon", "alice"], serde_json::json!({"voter": "alice", "votes": 5})),
        )
        .await
        .expect_err("insufficient votes");
        assert_eq!(err.code, -32020);

        let db = state.db.lock().await;
        let voter = accrue_db::queries::voters::get(&db, &Name::new("alice").expect("name"))
            .expect("get");
        assert!(voter.is_none());
    }

    #[tokio::test]
    async fn test_missing_signer_rejected() {
        let state = state();
        bootstrap(&state).await;

        let err = add_vote(
            &state,
            &signed(&["alice"], serde_json::json!({"voter": "alice", "votes": 5})),
        )
        .await
        .expect_err("system account missing");
        assert_eq!(err.code, -32023);
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let state = state();
        let err = on_deposit(
            &state,
            &signed(
                &["flon.token"],
                serde_json::json!({"producer": "bp1", "quantity": "ten"}),
            ),
        )
        .await
        .expect_err("bad asset");
        assert_eq!(err.code, -32602);
    }

    #[tokio::test]
    async fn test_double_init_rejected() {
        let state = state();
        init(&state, &signed(&["flon"], serde_json::json!({"symbol": "4,FLON"})))
            .await
            .expect("init");
        let err = init(&state, &signed(&["flon"], serde_json::json!({})))
            .await
            .expect_err("second init");
        assert_eq!(err.code, -32020);
    }
}
