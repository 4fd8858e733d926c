//! Reward settlement.
//!
//! For each `(producer, snapshot)` pair the voter's share of everything
//! deposited since the snapshot is
//!
//! ```text
//! earned = votes_old * (producer.rewards_per_vote - snapshot) / SCALE
//! ```
//!
//! moved from the producer's `allocating_rewards` to `allocated_rewards` and
//! credited to the caller's running total. The producer's vote count then
//! moves by `votes_delta` and the snapshot advances to the current
//! accumulator.
//!
//! Callers changing a voter's backing set settle three disjoint partitions
//! in this order:
//!
//! | partition | `votes_old`    | `votes_delta`  |
//! |-----------|----------------|----------------|
//! | removed   | weight before  | `-weight`      |
//! | kept      | weight before  | `0`            |
//! | added     | `0`            | `+weight`      |

use accrue_types::{Asset, VotedProducerMap};

use crate::producer::{self, calc_voter_rewards};
use crate::store::ProducerAccounts;
use crate::{LedgerError, Result};

/// Settle `producers` for a voter whose weight over the elapsed interval was
/// `votes_old`, then apply `votes_delta` to each producer.
///
/// Earned rewards are added to `rewards_out`; snapshots in `producers` are
/// advanced in place. Nothing is committed: on error the caller discards the
/// whole changeset.
///
/// # Errors
///
/// - [`LedgerError::Invariant`] if a snapshot is ahead of its producer's
///   accumulator, the producer lacks allocating rewards to pay out, the
///   voter's weight exceeds the producer's, or a vote count goes negative
pub fn allocate_producer_rewards(
    accounts: &mut dyn ProducerAccounts,
    producers: &mut VotedProducerMap,
    votes_old: i64,
    votes_delta: i64,
    rewards_out: &mut Asset,
) -> Result<()> {
    let now = accounts.now();
    for (owner, snapshot) in producers.iter_mut() {
        let producer = accounts.producer_mut(owner)?;

        let rewards_per_vote_delta = producer
            .rewards_per_vote
            .checked_sub(snapshot.last_rewards_per_vote)
            .filter(|delta| *delta >= 0)
            .ok_or_else(|| {
                LedgerError::invariant(format!(
                    "last_rewards_per_vote invalid for producer {owner}"
                ))
            })?;

        if rewards_per_vote_delta > 0 && votes_old > 0 {
            if votes_old > producer.votes {
                return Err(LedgerError::invariant(format!(
                    "voter weight {votes_old} exceeds producer {owner} votes {}",
                    producer.votes
                )));
            }
            let earned = Asset::new(
                calc_voter_rewards(votes_old, rewards_per_vote_delta)?,
                rewards_out.symbol.clone(),
            );
            if producer.allocating_rewards.amount < earned.amount {
                return Err(LedgerError::invariant(format!(
                    "producer {owner} allocating rewards insufficient"
                )));
            }
            producer.allocating_rewards = producer
                .allocating_rewards
                .checked_sub(&earned)
                .map_err(|e| LedgerError::invariant(e.to_string()))?;
            producer.allocated_rewards = producer
                .allocated_rewards
                .checked_add(&earned)
                .map_err(|e| LedgerError::invariant(e.to_string()))?;
            producer::check_balances(producer)?;

            *rewards_out = rewards_out
                .checked_add(&earned)
                .map_err(|e| LedgerError::invariant(e.to_string()))?;

            tracing::trace!(
                producer = %owner,
                votes_old,
                earned = earned.amount,
                "settled producer rewards"
            );
        }

        producer::apply_vote_delta(producer, votes_delta, now)?;
        snapshot.last_rewards_per_vote = producer.rewards_per_vote;
    }
    Ok(())
}
