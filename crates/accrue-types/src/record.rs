//! Persistent reward records.
//!
//! Producers and voters live in independent keyed stores. The only link
//! between them is the voter-owned [`VotedProducerMap`]: producers never hold
//! a collection of their voters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Asset, Name, Symbol, Timestamp};

/// Ledger-wide state, created once by `init`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalRewardState {
    /// Sum of every deposit ever received. Its symbol is the core symbol.
    pub total_rewards: Asset,
}

impl GlobalRewardState {
    /// Fresh state denominated in `symbol`.
    pub fn new(symbol: &Symbol) -> Self {
        Self {
            total_rewards: Asset::zero(symbol),
        }
    }

    /// The ledger's core symbol.
    pub fn core_symbol(&self) -> &Symbol {
        &self.total_rewards.symbol
    }
}

/// A producer's reward account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Producer {
    pub owner: Name,
    pub is_registered: bool,
    /// Always `allocating_rewards + allocated_rewards`.
    pub total_rewards: Asset,
    /// Deposited but not yet credited to any voter.
    pub allocating_rewards: Asset,
    /// Credited to some voter's unclaimed balance.
    pub allocated_rewards: Asset,
    pub votes: i64,
    /// Cumulative reward per vote, scaled by [`crate::SCALE`]. Never decreases.
    #[serde(with = "i128_string")]
    pub rewards_per_vote: i128,
    pub updated_at: Timestamp,
}

impl Producer {
    /// A zero-balance, unregistered producer record.
    pub fn new(owner: Name, symbol: &Symbol, now: Timestamp) -> Self {
        Self {
            owner,
            is_registered: false,
            total_rewards: Asset::zero(symbol),
            allocating_rewards: Asset::zero(symbol),
            allocated_rewards: Asset::zero(symbol),
            votes: 0,
            rewards_per_vote: 0,
            updated_at: now,
        }
    }
}

/// A voter's pull pointer into one producer's accumulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotedProducerInfo {
    #[serde(with = "i128_string")]
    pub last_rewards_per_vote: i128,
}

/// Snapshot map keyed by producer, iterated in ascending name order.
pub type VotedProducerMap = BTreeMap<Name, VotedProducerInfo>;

/// A voter's reward account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub owner: Name,
    pub votes: i64,
    pub producers: VotedProducerMap,
    pub unclaimed_rewards: Asset,
    pub claimed_rewards: Asset,
    pub updated_at: Timestamp,
}

impl Voter {
    /// A voter with no weight, no producers and zero balances.
    pub fn new(owner: Name, symbol: &Symbol, now: Timestamp) -> Self {
        Self {
            owner,
            votes: 0,
            producers: VotedProducerMap::new(),
            unclaimed_rewards: Asset::zero(symbol),
            claimed_rewards: Asset::zero(symbol),
            updated_at: now,
        }
    }
}

/// Serialize `i128` as a decimal string; JSON consumers cannot hold 128-bit
/// integers losslessly.
pub mod i128_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flon() -> Symbol {
        Symbol::new(4, "FLON").expect("symbol")
    }

    #[test]
    fn test_new_producer_is_zeroed() {
        let p = Producer::new(Name::new("bp1").expect("name"), &flon(), 7);
        assert!(!p.is_registered);
        assert_eq!(p.total_rewards.amount, 0);
        assert_eq!(p.allocating_rewards.amount, 0);
        assert_eq!(p.allocated_rewards.amount, 0);
        assert_eq!(p.votes, 0);
        assert_eq!(p.rewards_per_vote, 0);
        assert_eq!(p.updated_at, 7);
    }

    #[test]
    fn test_global_core_symbol() {
        let g = GlobalRewardState::new(&flon());
        assert_eq!(g.core_symbol(), &flon());
        assert_eq!(g.total_rewards.amount, 0);
    }

    #[test]
    fn test_rewards_per_vote_serialized_as_string() {
        let mut p = Producer::new(Name::new("bp1").expect("name"), &flon(), 0);
        p.rewards_per_vote = i128::MAX;
        let json = serde_json::to_value(&p).expect("serialize");
        assert_eq!(json["rewards_per_vote"], i128::MAX.to_string());
        let back: Producer = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.rewards_per_vote, i128::MAX);
    }
}
