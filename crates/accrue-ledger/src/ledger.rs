//! Ledger entry points.
//!
//! Every entry point follows the same shape: load the global state (the
//! ledger is unusable before `init`), check authority, validate input, do
//! all work inside a [`Changeset`], and commit its [`crate::WriteBatch`]
//! only when nothing failed.

use serde::{Deserialize, Serialize};

use accrue_types::{
    Asset, GlobalRewardState, Name, Producer, Symbol, VotedProducerMap, Voter,
    MAX_VOTE_PRODUCERS,
};

use crate::auth::{require_auth, Authorizer};
use crate::clock::Clock;
use crate::distributor::allocate_producer_rewards;
use crate::producer;
use crate::reconciler::reconcile;
use crate::store::{Changeset, ProducerAccounts, RecordStore};
use crate::transfer::TokenTransfer;
use crate::{LedgerError, Result};

/// Memo attached to claim payouts.
pub const CLAIM_MEMO: &str = "voted rewards";

/// Accounts and limits the ledger enforces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Privileged identity that initializes the ledger and co-signs vote changes.
    pub system_account: Name,
    /// Token ledger whose incoming transfers count as deposits.
    pub token_account: Name,
    /// Maximum producers per voter.
    pub max_vote_producers: usize,
}

impl LedgerConfig {
    pub fn new(system_account: Name, token_account: Name) -> Self {
        Self {
            system_account,
            token_account,
            max_vote_producers: MAX_VOTE_PRODUCERS,
        }
    }
}

/// Direction of a voter weight change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VoteChange {
    Add,
    Sub,
}

/// The reward accrual ledger.
pub struct RewardLedger<S, T, C> {
    store: S,
    transfer: T,
    clock: C,
    config: LedgerConfig,
}

impl<S, T, C> RewardLedger<S, T, C>
where
    S: RecordStore,
    T: TokenTransfer,
    C: Clock,
{
    pub fn new(store: S, transfer: T, clock: C, config: LedgerConfig) -> Self {
        Self {
            store,
            transfer,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    /// Tear the ledger apart into its collaborators.
    pub fn into_parts(self) -> (S, T, C) {
        (self.store, self.transfer, self.clock)
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// The global state, `None` before `init`.
    pub fn global_state(&self) -> Result<Option<GlobalRewardState>> {
        self.store.load_global()
    }

    pub fn producer(&self, owner: &Name) -> Result<Option<Producer>> {
        self.store.load_producer(owner)
    }

    pub fn voter(&self, owner: &Name) -> Result<Option<Voter>> {
        self.store.load_voter(owner)
    }

    /// Whether `owner` has a registered producer record.
    pub fn is_producer_registered(&self, owner: &Name) -> Result<bool> {
        Ok(self
            .store
            .load_producer(owner)?
            .is_some_and(|p| p.is_registered))
    }

    // ------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------

    /// Fix the ledger's core symbol. Callable once, by the system account.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`] without the system account's authority
    /// - [`LedgerError::AlreadyInitialized`] on a second call
    pub fn init(&mut self, auth: &dyn Authorizer, core_symbol: &Symbol) -> Result<()> {
        require_auth(auth, &self.config.system_account)?;
        if self.store.load_global()?.is_some() {
            return Err(LedgerError::AlreadyInitialized);
        }

        let batch = {
            let mut cs = Changeset::new(&self.store, core_symbol.clone(), self.clock.now());
            cs.set_global(GlobalRewardState::new(core_symbol));
            cs.into_batch()
        };
        self.store.commit(batch)?;

        tracing::info!(symbol = %core_symbol, "reward ledger initialized");
        Ok(())
    }

    /// Register `owner` as a producer. Idempotent.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotInitialized`] before `init`
    /// - [`LedgerError::Unauthorized`] without the producer's authority
    pub fn register_producer(&mut self, auth: &dyn Authorizer, owner: &Name) -> Result<()> {
        let global = self.load_initialized()?;
        require_auth(auth, owner)?;

        let now = self.clock.now();
        let batch = {
            let mut cs = Changeset::new(&self.store, global.core_symbol().clone(), now);
            let record = cs.producer_mut(owner)?;
            producer::register(record, now);
            cs.into_batch()
        };
        self.store.commit(batch)?;

        tracing::info!(producer = %owner, "producer registered");
        Ok(())
    }

    /// Add `votes` to the voter's weight, settling every backed producer
    /// first. Requires both the system account and the voter.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NonPositiveVotes`] if `votes <= 0`
    /// - [`LedgerError::Invariant`] if settlement breaks an invariant
    pub fn add_vote(&mut self, auth: &dyn Authorizer, voter: &Name, votes: i64) -> Result<()> {
        self.change_vote(auth, voter, votes, VoteChange::Add)
    }

    /// Remove `votes` from the voter's weight, settling every backed producer
    /// first. Requires both the system account and the voter.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NonPositiveVotes`] if `votes <= 0`
    /// - [`LedgerError::InsufficientVotes`] if the voter holds fewer than `votes`
    pub fn sub_vote(&mut self, auth: &dyn Authorizer, voter: &Name, votes: i64) -> Result<()> {
        self.change_vote(auth, voter, votes, VoteChange::Sub)
    }

    /// Replace the voter's backing set with `producers` (strictly ascending).
    ///
    /// Removed producers are settled and lose the voter's weight, kept ones
    /// are settled, added ones gain the weight with a fresh snapshot.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::TooManyProducers`] above the configured maximum
    /// - [`LedgerError::UnsortedProducers`] on unsorted or duplicate entries
    /// - [`LedgerError::Invariant`] if settlement breaks an invariant
    pub fn vote_for_producers(
        &mut self,
        auth: &dyn Authorizer,
        voter: &Name,
        producers: &[Name],
    ) -> Result<()> {
        let global = self.load_initialized()?;
        require_auth(auth, &self.config.system_account)?;
        require_auth(auth, voter)?;

        if producers.len() > self.config.max_vote_producers {
            return Err(LedgerError::TooManyProducers {
                count: producers.len(),
                max: self.config.max_vote_producers,
            });
        }

        let now = self.clock.now();
        let symbol = global.core_symbol().clone();
        let batch = {
            let mut cs = Changeset::new(&self.store, symbol, now);
            let mut v = cs.voter_or_new(voter)?;

            let old: Vec<Name> = v.producers.keys().cloned().collect();
            let diff = reconcile(&old, producers)?;

            let mut removed = VotedProducerMap::new();
            for owner in &diff.removed {
                if let Some(info) = v.producers.remove(owner) {
                    removed.insert(owner.clone(), info);
                }
            }
            let mut added: VotedProducerMap = diff
                .added
                .iter()
                .map(|owner| (owner.clone(), Default::default()))
                .collect();

            let votes = v.votes;
            let mut unclaimed = v.unclaimed_rewards.clone();
            allocate_producer_rewards(&mut cs, &mut removed, votes, -votes, &mut unclaimed)?;
            allocate_producer_rewards(&mut cs, &mut v.producers, votes, 0, &mut unclaimed)?;
            allocate_producer_rewards(&mut cs, &mut added, 0, votes, &mut unclaimed)?;
            v.producers.append(&mut added);

            tracing::debug!(
                voter = %voter,
                removed = diff.removed.len(),
                kept = diff.kept.len(),
                added = diff.added.len(),
                "voter producer set reconciled"
            );

            v.unclaimed_rewards = unclaimed;
            v.updated_at = now;
            cs.put_voter(v);
            cs.into_batch()
        };
        self.store.commit(batch)?;
        Ok(())
    }

    /// Settle and pay out the voter's rewards. Requires the voter.
    ///
    /// Returns the amount transferred.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::VoterNotFound`] for an unknown voter
    /// - [`LedgerError::NothingToClaim`] if nothing is owed after settlement
    /// - [`LedgerError::Transfer`] if the payout fails; nothing is committed
    pub fn claim(&mut self, auth: &dyn Authorizer, voter: &Name) -> Result<Asset> {
        self.load_initialized()?;
        require_auth(auth, voter)?;
        self.claim_rewards(voter)
    }

    /// Settle and pay out `voter`'s rewards on behalf of `claimer`. The
    /// payout still goes to the voter. Requires the claimer.
    ///
    /// # Errors
    ///
    /// Same as [`Self::claim`], with authority checked against `claimer`.
    pub fn claim_for(
        &mut self,
        auth: &dyn Authorizer,
        claimer: &Name,
        voter: &Name,
    ) -> Result<Asset> {
        self.load_initialized()?;
        require_auth(auth, claimer)?;
        tracing::debug!(claimer = %claimer, voter = %voter, "delegated claim");
        self.claim_rewards(voter)
    }

    /// Book an incoming transfer from `producer` as that producer's reward
    /// deposit. Requires the token account.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::SymbolMismatch`] if `quantity` is not in the core symbol
    /// - [`LedgerError::NonPositiveAmount`] if `quantity <= 0`
    /// - [`LedgerError::ProducerNotFound`] / [`LedgerError::ProducerNotRegistered`]
    pub fn on_deposit(
        &mut self,
        auth: &dyn Authorizer,
        producer: &Name,
        quantity: &Asset,
    ) -> Result<()> {
        let mut global = self.load_initialized()?;
        require_auth(auth, &self.config.token_account)?;

        if &quantity.symbol != global.core_symbol() {
            return Err(LedgerError::SymbolMismatch {
                expected: global.core_symbol().to_string(),
                actual: quantity.symbol.to_string(),
            });
        }
        if !quantity.is_positive() {
            return Err(LedgerError::NonPositiveAmount);
        }

        let now = self.clock.now();
        let batch = {
            let mut cs = Changeset::new(&self.store, global.core_symbol().clone(), now);
            let p = cs
                .find_producer_mut(producer)?
                .ok_or_else(|| LedgerError::ProducerNotFound(producer.clone()))?;
            producer::deposit(p, quantity, now)?;

            global.total_rewards = global
                .total_rewards
                .checked_add(quantity)
                .map_err(|e| LedgerError::invariant(format!("global total_rewards: {e}")))?;
            cs.set_global(global);
            cs.into_batch()
        };
        self.store.commit(batch)?;

        tracing::info!(producer = %producer, quantity = %quantity, "deposit received");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn load_initialized(&self) -> Result<GlobalRewardState> {
        self.store
            .load_global()?
            .ok_or(LedgerError::NotInitialized)
    }

    fn change_vote(
        &mut self,
        auth: &dyn Authorizer,
        voter: &Name,
        votes: i64,
        change: VoteChange,
    ) -> Result<()> {
        let global = self.load_initialized()?;
        require_auth(auth, &self.config.system_account)?;
        require_auth(auth, voter)?;

        if votes <= 0 {
            return Err(LedgerError::NonPositiveVotes);
        }

        let now = self.clock.now();
        let batch = {
            let mut cs = Changeset::new(&self.store, global.core_symbol().clone(), now);
            let mut v = cs.voter_or_new(voter)?;

            let votes_delta = match change {
                VoteChange::Add => votes,
                VoteChange::Sub => {
                    if v.votes < votes {
                        return Err(LedgerError::InsufficientVotes {
                            available: v.votes,
                            requested: votes,
                        });
                    }
                    -votes
                }
            };

            let mut unclaimed = v.unclaimed_rewards.clone();
            allocate_producer_rewards(
                &mut cs,
                &mut v.producers,
                v.votes,
                votes_delta,
                &mut unclaimed,
            )?;
            v.unclaimed_rewards = unclaimed;
            v.votes = v
                .votes
                .checked_add(votes_delta)
                .filter(|total| *total >= 0)
                .ok_or_else(|| LedgerError::invariant("voter's votes can not be negative"))?;
            v.updated_at = now;

            tracing::debug!(voter = %voter, votes_delta, total = v.votes, "voter weight changed");
            cs.put_voter(v);
            cs.into_batch()
        };
        self.store.commit(batch)
    }

    fn claim_rewards(&mut self, voter: &Name) -> Result<Asset> {
        let global = self.load_initialized()?;
        let now = self.clock.now();

        let (batch, payout) = {
            let mut cs = Changeset::new(&self.store, global.core_symbol().clone(), now);
            let mut v = cs
                .voter(voter)?
                .ok_or_else(|| LedgerError::VoterNotFound(voter.clone()))?;

            if v.votes > 0 {
                let mut unclaimed = v.unclaimed_rewards.clone();
                allocate_producer_rewards(&mut cs, &mut v.producers, v.votes, 0, &mut unclaimed)?;
                v.unclaimed_rewards = unclaimed;
            }
            if !v.unclaimed_rewards.is_positive() {
                return Err(LedgerError::NothingToClaim(voter.clone()));
            }

            let payout = v.unclaimed_rewards.clone();
            v.claimed_rewards = v
                .claimed_rewards
                .checked_add(&payout)
                .map_err(|e| LedgerError::invariant(format!("voter claimed_rewards: {e}")))?;
            v.unclaimed_rewards = Asset::zero(&payout.symbol);
            v.updated_at = now;
            cs.put_voter(v);
            (cs.into_batch(), payout)
        };

        self.transfer.transfer(voter, &payout, CLAIM_MEMO)?;
        self.store.commit(batch)?;

        tracing::info!(voter = %voter, amount = %payout, "rewards claimed");
        Ok(payout)
    }
}
