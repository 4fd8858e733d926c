//! Query functions organized by record type.

pub mod global;
pub mod producers;
pub mod transfers;
pub mod voters;

use crate::{DbError, Result};

/// Parse a 128-bit accumulator stored as decimal TEXT.
pub(crate) fn parse_i128(raw: &str) -> Result<i128> {
    raw.parse()
        .map_err(|_| DbError::Corrupt(format!("not a 128-bit integer: {raw}")))
}
