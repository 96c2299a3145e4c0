//! Wallet addresses and transport identities
//!
//! Contacts are keyed by their wallet address. The canonical form is `0x`
//! followed by 40 lower-case hex digits; every address entering the engine
//! is folded to that form so map lookups and deduplication never depend on
//! the casing the user happened to type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CollabError;

/// Number of hex digits in a wallet address, excluding the `0x` prefix.
const ADDRESS_HEX_LEN: usize = 40;

/// A wallet address in canonical lower-case form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and canonicalize an address.
    ///
    /// Accepts any hex casing, trims surrounding whitespace, and stores the
    /// lower-case form. Returns `CollabError::InvalidContact` for anything
    /// that is not `0x` + 40 hex digits.
    pub fn parse(raw: &str) -> Result<Self, CollabError> {
        let trimmed = raw.trim();
        if !Self::is_valid(trimmed) {
            return Err(CollabError::InvalidContact(format!(
                "'{trimmed}' is not a valid wallet address"
            )));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Check whether a string has wallet address syntax.
    pub fn is_valid(value: &str) -> bool {
        value.len() == 2 + ADDRESS_HEX_LEN
            && value.starts_with("0x")
            && value[2..].chars().all(|c| c.is_ascii_hexdigit())
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against raw user input.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0 == candidate.trim().to_ascii_lowercase()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = CollabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = CollabError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque identity of a messaging inbox.
///
/// The transport assigns these; the engine only ever compares them against
/// its own identity to filter self-authored traffic. No structure is assumed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(String);

impl SenderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SenderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
