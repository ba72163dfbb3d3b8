pub mod random;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// URL-safe alphabet (RFC 4648 §5), 64 symbols.
pub const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
/// Length of every generated short id.
pub const SHORT_ID_LEN: usize = 8;

pub trait GenerateShortId {
    fn generate(&self) -> ShortId;
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid short id `{0}`")]
pub struct InvalidShortId(pub String);

/// A well-formed short identifier: exactly [`SHORT_ID_LEN`] symbols from [`ALPHABET`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortId(String);

impl ShortId {
    pub fn parse(raw: &str) -> Result<Self, InvalidShortId> {
        if Self::is_well_formed(raw) {
            Ok(Self(raw.to_owned()))
        } else {
            Err(InvalidShortId(raw.to_owned()))
        }
    }

    pub fn is_well_formed(raw: &str) -> bool {
        raw.len() == SHORT_ID_LEN && raw.bytes().all(|b| ALPHABET.contains(&b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Only for generators that draw from [`ALPHABET`] with [`SHORT_ID_LEN`].
    pub(crate) fn from_generated(raw: String) -> Self {
        debug_assert!(Self::is_well_formed(&raw));
        Self(raw)
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShortId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ShortId {
    type Error = InvalidShortId;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        if Self::is_well_formed(&raw) {
            Ok(Self(raw))
        } else {
            Err(InvalidShortId(raw))
        }
    }
}

impl From<ShortId> for String {
    fn from(id: ShortId) -> Self {
        id.0
    }
}
