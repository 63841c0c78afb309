//! # FairSplit
//!
//! Attested engagement receipts and fair allocation of value among content
//! contributors.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         FAIRSPLIT                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                               │
//! │  ├── hash.rs     - SHA-256 digests, hex encoding            │
//! │  ├── rng.rs      - Seedable Xorshift128+ PRNG               │
//! │  └── config.rs   - Engine configuration                     │
//! │                                                             │
//! │  proof/          - Attested receipts                        │
//! │  ├── commitment.rs - Receipt commitments                    │
//! │  ├── merkle.rs   - Window Merkle tree                       │
//! │  ├── verify.rs   - Inclusion proof verification             │
//! │  └── window.rs   - Window accumulator + store capability    │
//! │                                                             │
//! │  allocation/     - Fair allocation                          │
//! │  ├── shapley.rs  - Monte-Carlo Shapley estimator            │
//! │  ├── matching.rs - Quadratic matching                       │
//! │  ├── engine.rs   - Per-event payout                         │
//! │  ├── quality.rs  - Content quality score                    │
//! │  └── fairsplit.rs- Bounty + paid request ledger postings    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data flow
//!
//! ```text
//! receipts -> commit -> window leaves -> root + proofs -> auditors
//! events   -> Shapley weights -> quadratic match -> payouts -> host ledger
//! ```
//!
//! Everything here is synchronous and storage-free. The host supplies
//! receipts, contribution events and a [`proof::WindowStore`], and persists
//! what comes back.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod allocation;
pub mod core;
pub mod proof;

// Re-export commonly used types
pub use crate::allocation::{
    quadratic_match, AllocationEngine, AllocationError, AllocationResult, ContributionEvent,
    ShapleyEstimator, ValueCurve,
};
pub use crate::core::{DeterministicRng, Digest, EngineConfig};
pub use crate::proof::{
    commit, merkle_proofs, merkle_root, verify, verify_hex, Commitment, MemoryWindowStore,
    MerkleTree, ProofError, ReceiptError, ReceiptMeta, WindowAccumulator, WindowError,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
