//! Account names.
//!
//! Names are 1-12 characters drawn from `a-z`, `1-5` and `.`, and may not end
//! with a dot. Ordering is plain lexicographic order, which is the order the
//! vote reconciler relies on for sorted producer lists.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Result, TypeError};

/// Maximum length of an account name.
pub const MAX_NAME_LEN: usize = 12;

/// A validated account name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(String);

impl Name {
    /// Validate and wrap an account name.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_NAME_LEN {
            return Err(TypeError::InvalidName(value));
        }
        let valid_chars = value
            .chars()
            .all(|c| c.is_ascii_lowercase() || ('1'..='5').contains(&c) || c == '.');
        if !valid_chars || value.ends_with('.') {
            return Err(TypeError::InvalidName(value));
        }
        Ok(Self(value))
    }

    /// Borrow the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Name {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Name {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.0
    }
}
