//! Token symbols and assets.
//!
//! An [`Asset`] is a signed integer amount tagged with a [`Symbol`]. The
//! symbol's precision fixes how many of the integer's digits are fractional:
//! `Asset { amount: 12345, symbol: 4,FLON }` renders as `1.2345 FLON`.
//! Arithmetic is checked and refuses to mix symbols.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Result, TypeError};

/// Maximum decimal precision of a symbol.
pub const MAX_PRECISION: u8 = 18;

/// Maximum length of a symbol code.
pub const MAX_CODE_LEN: usize = 7;

/// A token symbol: decimal precision plus an upper-case code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    precision: u8,
    code: String,
}

impl Symbol {
    /// Build a symbol, validating precision and code.
    pub fn new(precision: u8, code: impl Into<String>) -> Result<Self> {
        let code = code.into();
        if precision > MAX_PRECISION
            || code.is_empty()
            || code.len() > MAX_CODE_LEN
            || !code.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(TypeError::InvalidSymbol(format!("{precision},{code}")));
        }
        Ok(Self { precision, code })
    }

    /// Number of fractional digits.
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Symbol code, e.g. `FLON`.
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.precision, self.code)
    }
}

impl FromStr for Symbol {
    type Err = TypeError;

    /// Parse `<precision>,<CODE>`, e.g. `4,FLON`.
    fn from_str(s: &str) -> Result<Self> {
        let (precision, code) = s
            .split_once(',')
            .ok_or_else(|| TypeError::InvalidSymbol(s.to_string()))?;
        let precision: u8 = precision
            .trim()
            .parse()
            .map_err(|_| TypeError::InvalidSymbol(s.to_string()))?;
        Self::new(precision, code.trim())
    }
}

impl TryFrom<String> for Symbol {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.to_string()
    }
}

/// An amount of a given token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    /// Raw integer amount in the smallest unit.
    pub amount: i64,
    /// Token symbol.
    pub symbol: Symbol,
}

impl Asset {
    /// Create an asset.
    pub fn new(amount: i64, symbol: Symbol) -> Self {
        Self { amount, symbol }
    }

    /// Zero amount of the given symbol.
    pub fn zero(symbol: &Symbol) -> Self {
        Self::new(0, symbol.clone())
    }

    /// Whether the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    /// Checked addition; fails on symbol mismatch or overflow.
    pub fn checked_add(&self, other: &Asset) -> Result<Asset> {
        self.ensure_same_symbol(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(TypeError::Overflow)?;
        Ok(Asset::new(amount, self.symbol.clone()))
    }

    /// Checked subtraction; fails on symbol mismatch or overflow.
    pub fn checked_sub(&self, other: &Asset) -> Result<Asset> {
        self.ensure_same_symbol(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(TypeError::Overflow)?;
        Ok(Asset::new(amount, self.symbol.clone()))
    }

    fn ensure_same_symbol(&self, other: &Asset) -> Result<()> {
        if self.symbol != other.symbol {
            return Err(TypeError::SymbolMismatch {
                left: self.symbol.to_string(),
                right: other.symbol.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        let precision = u32::from(self.symbol.precision);
        if precision == 0 {
            return write!(f, "{sign}{abs} {}", self.symbol.code);
        }
        let divisor = 10u64.pow(precision.min(19));
        write!(
            f,
            "{sign}{}.{:0width$} {}",
            abs / divisor,
            abs % divisor,
            self.symbol.code,
            width = precision as usize
        )
    }
}

impl FromStr for Asset {
    type Err = TypeError;

    /// Parse `<amount> <CODE>`; the number of fractional digits sets the
    /// precision, e.g. `1.2500 FLON` is 12500 at precision 4.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TypeError::InvalidAsset(s.to_string());
        let (number, code) = s.trim().split_once(' ').ok_or_else(invalid)?;
        let (negative, digits) = match number.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, number),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty()
            || !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
            || (digits.contains('.') && frac_part.is_empty())
        {
            return Err(invalid());
        }
        let precision = u8::try_from(frac_part.len()).map_err(|_| invalid())?;
        let symbol = Symbol::new(precision, code.trim())?;

        let raw: i64 = format!("{int_part}{frac_part}")
            .parse()
            .map_err(|_| invalid())?;
        let amount = if negative { -raw } else { raw };
        Ok(Asset::new(amount, symbol))
    }
}

impl TryFrom<String> for Asset {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}
