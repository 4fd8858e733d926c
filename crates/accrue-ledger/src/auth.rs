//! Authorization seam.
//!
//! The hosting layer decides who signed a call; the ledger only asks whether
//! a given account's authority is present.

use std::collections::BTreeSet;

use accrue_types::Name;

use crate::{LedgerError, Result};

/// Answers whether an account authorized the current call.
pub trait Authorizer {
    /// `true` if `account` authorized the call.
    fn has_auth(&self, account: &Name) -> bool;
}

/// Fail with [`LedgerError::Unauthorized`] unless `account` authorized the call.
pub fn require_auth(auth: &dyn Authorizer, account: &Name) -> Result<()> {
    if auth.has_auth(account) {
        Ok(())
    } else {
        Err(LedgerError::Unauthorized(account.clone()))
    }
}

/// The set of accounts that signed a call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signers(BTreeSet<Name>);

impl Signers {
    /// Signers from any iterator of names.
    pub fn new(accounts: impl IntoIterator<Item = Name>) -> Self {
        Self(accounts.into_iter().collect())
    }

    /// Iterate over the signing accounts.
    pub fn iter(&self) -> impl Iterator<Item = &Name> {
        self.0.iter()
    }
}

impl Authorizer for Signers {
    fn has_auth(&self, account: &Name) -> bool {
        self.0.contains(account)
    }
}

impl FromIterator<Name> for Signers {
    fn from_iter<I: IntoIterator<Item = Name>>(iter: I) -> Self {
        Self::new(iter)
    }
}
