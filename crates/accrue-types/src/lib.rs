//! # accrue-types
//!
//! Shared domain types used across the accrue workspace: account names,
//! token symbols and assets, and the persistent reward records.

pub mod asset;
pub mod name;
pub mod record;

pub use asset::{Asset, Symbol};
pub use name::Name;
pub use record::{GlobalRewardState, Producer, VotedProducerInfo, VotedProducerMap, Voter};

/// Producer account identity.
pub type ProducerId = Name;

/// Voter account identity.
pub type VoterId = Name;

/// Unix epoch seconds.
pub type Timestamp = u64;

/// Fixed-point scale of `rewards_per_vote` (10^18).
pub const SCALE: i128 = 1_000_000_000_000_000_000;

/// Maximum number of producers a single voter may back.
pub const MAX_VOTE_PRODUCERS: usize = 30;

/// Errors raised while parsing or combining domain values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// Account name is empty, too long, or contains an invalid character.
    #[error("invalid account name: {0}")]
    InvalidName(String),

    /// Symbol string is not `<precision>,<CODE>`.
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Asset string is not `<amount> <CODE>` with matching precision.
    #[error("invalid asset: {0}")]
    InvalidAsset(String),

    /// Arithmetic on assets of different symbols.
    #[error("symbol mismatch: {left} vs {right}")]
    SymbolMismatch {
        /// Left-hand symbol.
        left: String,
        /// Right-hand symbol.
        right: String,
    },

    /// Asset arithmetic overflowed `i64`.
    #[error("asset amount overflow")]
    Overflow,
}

/// Convenience result type for domain value operations.
pub type Result<T> = std::result::Result<T, TypeError>;
