//! Digest Primitives
//!
//! SHA-256 digests shared by receipt commitments, Merkle nodes and proofs.
//! Every digest crossing the crate boundary is a lowercase hex string of
//! [`DIGEST_HEX_LEN`] characters; internally they are fixed 32-byte arrays.

use sha2::{Digest as _, Sha256};
use thiserror::Error;

/// Hash output type (256 bits / 32 bytes)
pub type Digest = [u8; 32];

/// Digest length in bytes.
pub const DIGEST_LEN: usize = 32;

/// Digest length in hex characters.
pub const DIGEST_HEX_LEN: usize = DIGEST_LEN * 2;

/// Errors parsing a hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    /// Text is not valid hexadecimal.
    #[error("digest is not valid hex: {0}")]
    InvalidHex(String),

    /// Decoded digest has the wrong length.
    #[error("digest has {got} bytes, expected {expected}")]
    WrongLength {
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        got: usize,
    },
}

/// Incremental SHA-256 hasher.
///
/// Order of updates is part of the digest; callers feed fields in a fixed order.
pub struct DigestHasher {
    hasher: Sha256,
}

impl Default for DigestHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl DigestHasher {
    /// Create a hasher with no prefix.
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Create a hasher with a domain separator prefix.
    pub fn with_domain(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with UTF-8 text.
    #[inline]
    pub fn update_str(&mut self, text: &str) {
        self.hasher.update(text.as_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> Digest {
        self.hasher.finalize().into()
    }
}

/// Compute a plain SHA-256 of arbitrary data.
pub fn hash_bytes(data: &[u8]) -> Digest {
    Sha256::digest(data).into()
}

/// Hash two child nodes as `H(left || right)`, with no domain prefix.
#[inline]
pub fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Render a digest as lowercase hex.
pub fn to_hex(digest: &Digest) -> String {
    hex::encode(digest)
}

/// Parse a hex digest, accepting either case.
pub fn parse_digest(text: &str) -> Result<Digest, DigestError> {
    let bytes = hex::decode(text).map_err(|e| DigestError::InvalidHex(e.to_string()))?;
    let got = bytes.len();
    bytes.try_into().map_err(|_| DigestError::WrongLength {
        expected: DIGEST_LEN,
        got,
    })
}

/// Serde adapter: digests as lowercase hex strings.
pub mod serde_hex {
    use super::{parse_digest, to_hex, Digest};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    /// Serialize a digest as hex.
    pub fn serialize<S: Serializer>(digest: &Digest, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_hex(digest))
    }

    /// Deserialize a digest from hex.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Digest, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_digest(&text).map_err(D::Error::custom)
    }
}

// =============================================================================
// TESTS
// =============================================================================
