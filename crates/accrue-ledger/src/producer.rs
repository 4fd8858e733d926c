//! Producer account operations.
//!
//! ## Accumulator
//!
//! ```text
//! rewards_per_vote += amount * SCALE / votes        (votes > 0)
//! ```
//!
//! A deposit that arrives while the producer has no votes leaves the
//! accumulator untouched. The amount still lands in `allocating_rewards`,
//! where it stays unattributed: later deposits only fold in their own
//! amounts. See `test_deposit_with_zero_votes_stays_unattributed`.

use accrue_types::{Asset, Producer, Timestamp, SCALE};

use crate::{LedgerError, Result};

/// New accumulator value after depositing `amount` across `votes`.
///
/// # Errors
///
/// - [`LedgerError::Invariant`] on negative inputs or 128-bit overflow
pub fn calc_rewards_per_vote(old_rewards_per_vote: i128, amount: i64, votes: i64) -> Result<i128> {
    if amount < 0 || votes < 0 {
        return Err(LedgerError::invariant(
            "rewards and votes must be non-negative",
        ));
    }
    if amount == 0 || votes == 0 {
        return Ok(old_rewards_per_vote);
    }
    let increment = i128::from(amount)
        .checked_mul(SCALE)
        .ok_or_else(|| LedgerError::invariant("calculated rewards_per_vote overflow"))?
        / i128::from(votes);
    let new_rewards_per_vote = old_rewards_per_vote
        .checked_add(increment)
        .ok_or_else(|| LedgerError::invariant("calculated rewards_per_vote overflow"))?;
    if new_rewards_per_vote < old_rewards_per_vote {
        return Err(LedgerError::invariant("calculated rewards_per_vote overflow"));
    }
    Ok(new_rewards_per_vote)
}

/// Rewards owed to `votes` over an accumulator increase of
/// `rewards_per_vote_delta`, rounded down.
///
/// # Errors
///
/// - [`LedgerError::Invariant`] on negative inputs, overflow, or a result
///   outside `i64`
pub fn calc_voter_rewards(votes: i64, rewards_per_vote_delta: i128) -> Result<i64> {
    if votes < 0 || rewards_per_vote_delta < 0 {
        return Err(LedgerError::invariant(
            "votes and rewards_per_vote must be non-negative",
        ));
    }
    let rewards = i128::from(votes)
        .checked_mul(rewards_per_vote_delta)
        .ok_or_else(|| LedgerError::invariant("calculated rewards overflow"))?
        / SCALE;
    i64::try_from(rewards).map_err(|_| LedgerError::invariant("calculated rewards overflow"))
}

/// Mark the producer registered. Idempotent apart from the timestamp.
pub fn register(producer: &mut Producer, now: Timestamp) {
    producer.is_registered = true;
    producer.updated_at = now;
}

/// Book a deposit of `amount` to the producer.
///
/// The caller checks the symbol against the ledger's core symbol.
///
/// # Errors
///
/// - [`LedgerError::ProducerNotRegistered`] if the producer never registered
/// - [`LedgerError::NonPositiveAmount`] if `amount <= 0`
/// - [`LedgerError::Invariant`] on accumulator or balance overflow
pub fn deposit(producer: &mut Producer, amount: &Asset, now: Timestamp) -> Result<()> {
    if !producer.is_registered {
        return Err(LedgerError::ProducerNotRegistered(producer.owner.clone()));
    }
    if !amount.is_positive() {
        return Err(LedgerError::NonPositiveAmount);
    }

    let rewards_per_vote =
        calc_rewards_per_vote(producer.rewards_per_vote, amount.amount, producer.votes)?;
    let total_rewards = producer
        .total_rewards
        .checked_add(amount)
        .map_err(|e| LedgerError::invariant(format!("producer total_rewards: {e}")))?;
    let allocating_rewards = producer
        .allocating_rewards
        .checked_add(amount)
        .map_err(|e| LedgerError::invariant(format!("producer allocating_rewards: {e}")))?;

    if producer.votes == 0 {
        tracing::warn!(
            producer = %producer.owner,
            amount = %amount,
            "deposit to producer without votes left unattributed"
        );
    }

    producer.rewards_per_vote = rewards_per_vote;
    producer.total_rewards = total_rewards;
    producer.allocating_rewards = allocating_rewards;
    producer.updated_at = now;
    check_balances(producer)
}

/// Apply a vote delta with no activity requirement, as settlement does.
///
/// # Errors
///
/// - [`LedgerError::Invariant`] if the count would go negative or overflow
pub fn apply_vote_delta(producer: &mut Producer, delta: i64, now: Timestamp) -> Result<()> {
    let votes = producer
        .votes
        .checked_add(delta)
        .ok_or_else(|| LedgerError::invariant("producer votes overflow"))?;
    if votes < 0 {
        return Err(LedgerError::invariant(format!(
            "producer {} votes can not be negative",
            producer.owner
        )));
    }
    producer.votes = votes;
    producer.updated_at = now;
    Ok(())
}

/// Adjust votes on behalf of the hosting delegation layer; adding votes
/// requires the producer to be registered.
///
/// The ledger's own entry points never call this. Settlement moves votes
/// through [`apply_vote_delta`], which skips the registration check so a
/// voter can keep backing an unregistered producer.
///
/// # Errors
///
/// - [`LedgerError::ProducerNotRegistered`] if `delta > 0` on an inactive producer
/// - [`LedgerError::Invariant`] if the count would go negative
pub fn adjust_votes(producer: &mut Producer, delta: i64, now: Timestamp) -> Result<()> {
    if delta > 0 && !producer.is_registered {
        return Err(LedgerError::ProducerNotRegistered(producer.owner.clone()));
    }
    apply_vote_delta(producer, delta, now)
}

/// Verify `total_rewards == allocating_rewards + allocated_rewards`.
pub fn check_balances(producer: &Producer) -> Result<()> {
    let sum = producer
        .allocating_rewards
        .checked_add(&producer.allocated_rewards)
        .map_err(|e| LedgerError::invariant(format!("producer balances: {e}")))?;
    if sum != producer.total_rewards {
        return Err(LedgerError::invariant(format!(
            "producer {} total_rewards {} != allocating {} + allocated {}",
            producer.owner,
            producer.total_rewards,
            producer.allocating_rewards,
            producer.allocated_rewards
        )));
    }
    Ok(())
}
