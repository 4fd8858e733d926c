//! # accrue-ledger
//!
//! Reward accrual and settlement for delegated producer voting.
//!
//! Deposits to a producer raise its cumulative `rewards_per_vote`
//! accumulator in O(1). Voters hold a snapshot of that accumulator per
//! backed producer and pull their share whenever their weight, their
//! producer set, or a claim touches them. Producers never iterate voters.
//!
//! ## Modules
//!
//! - [`producer`] — producer account operations (register, deposit, votes)
//! - [`distributor`] — the settlement algorithm
//! - [`reconciler`] — old/new producer set diffing
//! - [`ledger`] — entry points: init, register, vote, deposit, claim
//! - [`store`] — record store seam, in-memory store and per-call changeset
//! - [`auth`] — authorization seam
//! - [`clock`] — timestamp source
//! - [`transfer`] — outbound token transfer seam

pub mod auth;
pub mod clock;
pub mod distributor;
pub mod ledger;
pub mod producer;
pub mod reconciler;
pub mod store;
pub mod transfer;

pub use auth::{Authorizer, Signers};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::{LedgerConfig, RewardLedger};
pub use store::{MemoryStore, RecordStore, WriteBatch};
pub use transfer::{TokenTransfer, TransferLog};

use accrue_types::Name;

/// Coarse classification of ledger failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; rejected before any mutation.
    Validation,
    /// A ledger invariant would break; signals a logic or call-ordering bug.
    Invariant,
    /// Missing record, uninitialized ledger, or nothing to claim.
    NotFound,
    /// Required authority absent.
    Unauthorized,
    /// Record store failure.
    Storage,
    /// Outbound transfer failure.
    Transfer,
}

/// Error types for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Asset symbol differs from the core symbol.
    #[error("symbol mismatch: expected {expected}, got {actual}")]
    SymbolMismatch {
        /// The ledger's core symbol.
        expected: String,
        /// The symbol supplied.
        actual: String,
    },

    /// Amount must be strictly positive.
    #[error("amount must be positive")]
    NonPositiveAmount,

    /// Vote delta must be strictly positive.
    #[error("votes must be positive")]
    NonPositiveVotes,

    /// Producer list is not strictly ascending.
    #[error("producer votes must be unique and sorted")]
    UnsortedProducers,

    /// Producer list exceeds the per-voter limit.
    #[error("attempt to vote for too many producers: {count} > {max}")]
    TooManyProducers {
        /// Requested list length.
        count: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Voter holds fewer votes than requested for removal.
    #[error("voter's votes insufficient: has {available}, requested {requested}")]
    InsufficientVotes {
        /// Current voter weight.
        available: i64,
        /// Weight requested for removal.
        requested: i64,
    },

    /// `init` called twice.
    #[error("reward ledger has already been initialized")]
    AlreadyInitialized,

    /// A ledger invariant would be violated.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Entry point called before `init`.
    #[error("reward ledger has not been initialized")]
    NotInitialized,

    /// Producer record does not exist.
    #[error("producer not found: {0}")]
    ProducerNotFound(Name),

    /// Producer record exists but never registered.
    #[error("producer not registered: {0}")]
    ProducerNotRegistered(Name),

    /// Voter record does not exist.
    #[error("voter not found: {0}")]
    VoterNotFound(Name),

    /// Voter has no unclaimed rewards after settlement.
    #[error("no rewards to claim for {0}")]
    NothingToClaim(Name),

    /// Required authority is missing.
    #[error("missing authority of {0}")]
    Unauthorized(Name),

    /// Record store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Outbound transfer failure.
    #[error("transfer failed: {0}")]
    Transfer(String),
}

impl LedgerError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SymbolMismatch { .. }
            | Self::NonPositiveAmount
            | Self::NonPositiveVotes
            | Self::UnsortedProducers
            | Self::TooManyProducers { .. }
            | Self::InsufficientVotes { .. }
            | Self::AlreadyInitialized => ErrorKind::Validation,
            Self::Invariant(_) => ErrorKind::Invariant,
            Self::NotInitialized
            | Self::ProducerNotFound(_)
            | Self::ProducerNotRegistered(_)
            | Self::VoterNotFound(_)
            | Self::NothingToClaim(_) => ErrorKind::NotFound,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Transfer(_) => ErrorKind::Transfer,
        }
    }

    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }
}

/// Convenience result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(LedgerError::UnsortedProducers.kind(), ErrorKind::Validation);
        assert_eq!(
            LedgerError::invariant("negative votes").kind(),
            ErrorKind::Invariant
        );
        assert_eq!(LedgerError::NotInitialized.kind(), ErrorKind::NotFound);
        let bob = Name::new("bob").expect("name");
        assert_eq!(LedgerError::NothingToClaim(bob.clone()).kind(), ErrorKind::NotFound);
        assert_eq!(LedgerError::Unauthorized(bob).kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_error_messages() {
        let err = LedgerError::TooManyProducers { count: 31, max: 30 };
        assert_eq!(
            err.to_string(),
            "attempt to vote for too many producers: 31 > 30"
        );
    }
}
