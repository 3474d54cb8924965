use std::fmt;

use serde::{Deserialize, Serialize};

use crate::HashValidationError;

const HASH_LEN: usize = 64;

/// A validated SHA-256 digest in lowercase hex: the dedup key of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Accepts exactly 64 hex digits of either case and stores them lowercased.
    pub fn parse(raw: &str) -> Result<Self, HashValidationError> {
        let count = raw.chars().count();
        if count != HASH_LEN {
            return Err(HashValidationError::Length(count));
        }
        if let Some((position, ch)) = raw.chars().enumerate().find(|(_, c)| !c.is_ascii_hexdigit()) {
            return Err(HashValidationError::NonHex { ch, position });
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContentHash {
    type Error = HashValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
