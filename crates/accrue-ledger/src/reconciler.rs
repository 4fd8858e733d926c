//! Producer set diffing.
//!
//! Splits an old and a new producer list into removed / kept / added with a
//! single merge-join pass. Both lists must be strictly ascending.

use accrue_types::Name;

use crate::{LedgerError, Result};

/// Partition of an old and new producer list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoteSetDiff {
    /// Only in the old list.
    pub removed: Vec<Name>,
    /// In both lists.
    pub kept: Vec<Name>,
    /// Only in the new list.
    pub added: Vec<Name>,
}

/// Reject lists that are not strictly ascending.
///
/// # Errors
///
/// - [`LedgerError::UnsortedProducers`] on a duplicate or out-of-order entry
pub fn ensure_sorted_unique(producers: &[Name]) -> Result<()> {
    if producers.windows(2).all(|pair| pair[0] < pair[1]) {
        Ok(())
    } else {
        Err(LedgerError::UnsortedProducers)
    }
}

/// Diff `old` against `new` in O(n + m).
///
/// # Errors
///
/// - [`LedgerError::UnsortedProducers`] if either list is not strictly ascending
pub fn reconcile(old: &[Name], new: &[Name]) -> Result<VoteSetDiff> {
    ensure_sorted_unique(old)?;
    ensure_sorted_unique(new)?;

    let mut diff = VoteSetDiff::default();
    let mut old_iter = old.iter().peekable();
    let mut new_iter = new.iter().peekable();

    loop {
        match (old_iter.peek(), new_iter.peek()) {
            (Some(o), Some(n)) => match o.cmp(n) {
                std::cmp::Ordering::Less => {
                    diff.removed.push((*o).clone());
                    old_iter.next();
                }
                std::cmp::Ordering::Greater => {
                    diff.added.push((*n).clone());
                    new_iter.next();
                }
                std::cmp::Ordering::Equal => {
                    diff.kept.push((*o).clone());
                    old_iter.next();
                    new_iter.next();
                }
            },
            (Some(o), None) => {
                diff.removed.push((*o).clone());
                old_iter.next();
            }
            (None, Some(n)) => {
                diff.added.push((*n).clone());
                new_iter.next();
            }
            (None, None) => break,
        }
    }

    Ok(diff)
}
