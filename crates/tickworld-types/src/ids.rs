//! Identifiers for worlds and submitting agents.
//!
//! A [`WorldId`] is an opaque, operator-chosen string. An [`AgentAddress`]
//! is the fixed-width public identity of a submitter: the 32 bytes of its
//! verifying key, rendered as `0x`-prefixed hex on the wire.
//!
//! Address parsing is case-insensitive. Two spellings of the same key that
//! differ only in hex case decode to equal addresses, so equality, hashing,
//! and ordering never depend on how a client chose to spell its address.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of bytes in an [`AgentAddress`].
pub const ADDRESS_LEN: usize = 32;

/// Identifier of a world. Compared byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(String);

impl WorldId {
    /// Create a world identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorldId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for WorldId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Errors produced when parsing an [`AgentAddress`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    /// The text is not valid hexadecimal.
    #[error("address is not valid hex: {0}")]
    InvalidHex(String),

    /// The decoded address has the wrong number of bytes.
    #[error("address must be {ADDRESS_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// Public identity of a submitting agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentAddress([u8; ADDRESS_LEN]);

impl AgentAddress {
    /// Wrap raw key bytes as an address.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Return the raw key bytes.
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl FromStr for AgentAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let decoded =
            hex::decode(digits).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        let len = decoded.len();
        let bytes: [u8; ADDRESS_LEN] = decoded
            .try_into()
            .map_err(|_bytes: Vec<u8>| AddressParseError::InvalidLength(len))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for AgentAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AgentAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
