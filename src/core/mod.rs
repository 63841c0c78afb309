//! Core primitives.
//!
//! Digests, the seedable permutation RNG and engine configuration. Nothing
//! here touches storage or the network.

pub mod config;
pub mod hash;
pub mod rng;

// Re-export core types
pub use config::{ConfigError, EngineConfig};
pub use hash::{parse_digest, to_hex, Digest, DigestError, DIGEST_HEX_LEN, DIGEST_LEN};
pub use rng::{derive_settlement_seed, DeterministicRng};
