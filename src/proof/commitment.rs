//! Attested Playback Receipt Commitments
//!
//! Binds one session's playback metadata into a fixed-length SHA-256 digest.
//! The commitment becomes a Merkle leaf of its window.
//!
//! ## Preimage layout
//!
//! ```text
//! session_id|video_id|seconds_watched|interactions|nonce|device_hash
//! ```
//!
//! Numeric fields are rendered in decimal. `device_hash` is the empty string
//! when absent. Text fields may not contain the `|` delimiter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::hash::{hash_bytes, parse_digest, to_hex, Digest, DigestError};

/// Field delimiter in the commitment preimage.
pub const FIELD_DELIMITER: char = '|';

/// Errors building a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiptError {
    /// A required field is absent.
    #[error("receipt is missing required field `{0}`")]
    MissingField(&'static str),

    /// A text field contains the preimage delimiter.
    #[error("receipt field `{0}` contains the '|' delimiter")]
    DelimiterInField(&'static str),

    /// The record could not be decoded.
    #[error("malformed receipt record: {0}")]
    Malformed(String),
}

/// Playback metadata for one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptMeta {
    /// Viewer session.
    pub session_id: u64,
    /// Video watched.
    pub video_id: u64,
    /// Seconds of playback.
    pub seconds_watched: u64,
    /// Interaction count (likes, shares, ...).
    pub interactions: u64,
    /// Client-generated nonce.
    pub nonce: String,
    /// Optional device attestation hash.
    #[serde(default)]
    pub device_hash: Option<String>,
}

impl ReceiptMeta {
    /// Decode a receipt record from JSON.
    ///
    /// Absent required fields surface as [`ReceiptError::MissingField`].
    pub fn from_json(s: &str) -> Result<Self, ReceiptError> {
        let raw: RawReceipt =
            serde_json::from_str(s).map_err(|e| ReceiptError::Malformed(e.to_string()))?;
        let mut builder = ReceiptBuilder {
            session_id: raw.session_id,
            video_id: raw.video_id,
            seconds_watched: raw.seconds_watched,
            interactions: raw.interactions,
            nonce: raw.nonce,
            device_hash: None,
        };
        if let Some(device_hash) = raw.device_hash {
            builder = builder.device_hash(device_hash);
        }
        builder.build()
    }

    /// Check text fields are safe to join.
    pub fn validate(&self) -> Result<(), ReceiptError> {
        if self.nonce.is_empty() {
            return Err(ReceiptError::MissingField("nonce"));
        }
        if self.nonce.contains(FIELD_DELIMITER) {
            return Err(ReceiptError::DelimiterInField("nonce"));
        }
        if let Some(device_hash) = &self.device_hash {
            if device_hash.contains(FIELD_DELIMITER) {
                return Err(ReceiptError::DelimiterInField("device_hash"));
            }
        }
        Ok(())
    }

    /// Canonical preimage text.
    pub fn preimage(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.session_id,
            self.video_id,
            self.seconds_watched,
            self.interactions,
            self.nonce,
            self.device_hash.as_deref().unwrap_or(""),
        )
    }
}

/// Loose record shape used while decoding; every field may be absent.
#[derive(Deserialize)]
struct RawReceipt {
    session_id: Option<u64>,
    video_id: Option<u64>,
    seconds_watched: Option<u64>,
    interactions: Option<u64>,
    nonce: Option<String>,
    device_hash: Option<String>,
}

/// A receipt commitment digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Commitment(#[serde(with = "crate::core::hash::serde_hex")] pub Digest);

impl Commitment {
    /// Raw digest bytes.
    pub fn as_digest(&self) -> &Digest {
        &self.0
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    /// Parse from hex (either case).
    pub fn from_hex(text: &str) -> Result<Self, DigestError> {
        parse_digest(text).map(Self)
    }
}

impl std::fmt::Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Commit to a receipt.
///
/// Pure: identical metadata always yields the identical commitment.
pub fn commit(meta: &ReceiptMeta) -> Result<Commitment, ReceiptError> {
    meta.validate()?;
    Ok(Commitment(hash_bytes(meta.preimage().as_bytes())))
}

/// Commit and return the lowercase hex digest.
pub fn commit_hex(meta: &ReceiptMeta) -> Result<String, ReceiptError> {
    commit(meta).map(|c| c.to_hex())
}

/// Builder for receipts assembled field by field.
#[derive(Clone, Debug, Default)]
pub struct ReceiptBuilder {
    session_id: Option<u64>,
    video_id: Option<u64>,
    seconds_watched: Option<u64>,
    interactions: Option<u64>,
    nonce: Option<String>,
    device_hash: Option<String>,
}

impl ReceiptBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session ID.
    pub fn session_id(mut self, id: u64) -> Self {
        self.session_id = Some(id);
        self
    }

    /// Set the video ID.
    pub fn video_id(mut self, id: u64) -> Self {
        self.video_id = Some(id);
        self
    }

    /// Set seconds watched.
    pub fn seconds_watched(mut self, seconds: u64) -> Self {
        self.seconds_watched = Some(seconds);
        self
    }

    /// Set the interaction count.
    pub fn interactions(mut self, count: u64) -> Self {
        self.interactions = Some(count);
        self
    }

    /// Set the client nonce.
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Set the device attestation hash.
    pub fn device_hash(mut self, hash: impl Into<String>) -> Self {
        self.device_hash = Some(hash.into());
        self
    }

    /// Build the receipt, failing on the first missing required field.
    pub fn build(self) -> Result<ReceiptMeta, ReceiptError> {
        let meta = ReceiptMeta {
            session_id: self.session_id.ok_or(ReceiptError::MissingField("session_id"))?,
            video_id: self.video_id.ok_or(ReceiptError::MissingField("video_id"))?,
            seconds_watched: self
                .seconds_watched
                .ok_or(ReceiptError::MissingField("seconds_watched"))?,
            interactions: self
                .interactions
                .ok_or(ReceiptError::MissingField("interactions"))?,
            nonce: self.nonce.ok_or(ReceiptError::MissingField("nonce"))?,
            device_hash: self.device_hash,
        };
        meta.validate()?;
        Ok(meta)
    }
}
