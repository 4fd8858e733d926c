//! Outbound token transfer seam.
//!
//! Claims pay out through a [`TokenTransfer`]. The ledger treats it as an
//! opaque, atomic primitive: it either moves the funds or returns an error,
//! in which case the claim is abandoned without committing any record.

use serde::{Deserialize, Serialize};

use accrue_types::{Asset, Name};

use crate::Result;

/// Moves funds from the reward ledger to a recipient.
pub trait TokenTransfer {
    /// Transfer `quantity` to `to`, annotated with `memo`.
    fn transfer(&mut self, to: &Name, quantity: &Asset, memo: &str) -> Result<()>;
}

/// A transfer captured by [`TransferLog`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedTransfer {
    pub to: Name,
    pub quantity: Asset,
    pub memo: String,
}

/// In-memory transfer sink that records every payout.
#[derive(Clone, Debug, Default)]
pub struct TransferLog {
    transfers: Vec<RecordedTransfer>,
}

impl TransferLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All transfers in the order they were made.
    pub fn transfers(&self) -> &[RecordedTransfer] {
        &self.transfers
    }

    /// Sum of all amounts paid to `to`.
    pub fn total_to(&self, to: &Name) -> i64 {
        self.transfers
            .iter()
            .filter(|t| &t.to == to)
            .map(|t| t.quantity.amount)
            .sum()
    }
}

impl TokenTransfer for TransferLog {
    fn transfer(&mut self, to: &Name, quantity: &Asset, memo: &str) -> Result<()> {
        tracing::debug!(to = %to, quantity = %quantity, memo, "transfer recorded");
        self.transfers.push(RecordedTransfer {
            to: to.clone(),
            quantity: quantity.clone(),
            memo: memo.to_string(),
        });
        Ok(())
    }
}
