use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Length of a hex-encoded content hash
pub const HASH_HEX_LEN: usize = 64;

/// Identifier of a piece of content in the store.
///  Opaque to everything outside of the store implementations,
///  but always a lowercase hex encoded 32 byte BLAKE3 digest,
///  which keeps it convertible to and from an iroh-blobs hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HashError {
    #[error("invalid content hash {0:?}: expected {HASH_HEX_LEN} hex characters")]
    Invalid(String),
}

impl ContentHash {
    /// Hash some bytes
    pub fn of(data: &[u8]) -> Self {
        Self(blake3::hash(data).to_hex().to_string())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        // NOTE: the constructor guarantees 64 valid hex chars
        hex::decode_to_slice(&self.0, &mut bytes).unwrap_or_default();
        bytes
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized.len() != HASH_HEX_LEN || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HashError::Invalid(s.to_string()));
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<String> for ContentHash {
    type Error = HashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let a = ContentHash::of(b"hello");
        let b = ContentHash::of(b"hello");
        let c = ContentHash::of(b"world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), HASH_HEX_LEN);
    }

    #[test]
    fn test_parse_and_bytes() {
        let hash = ContentHash::of(b"some content");
        let parsed: ContentHash = hash.as_str().to_uppercase().parse().unwrap();
        assert_eq!(parsed, hash);
        assert_eq!(ContentHash::from_bytes(hash.to_bytes()), hash);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not-a-hash".parse::<ContentHash>().is_err());
        assert!("zz".repeat(32).parse::<ContentHash>().is_err());
        assert!("ab".repeat(31).parse::<ContentHash>().is_err());
    }

    #[test]
    fn test_serde_validates() {
        let hash = ContentHash::of(b"x");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash));
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
        assert!(serde_json::from_str::<ContentHash>("\"nope\"").is_err());
    }
}
