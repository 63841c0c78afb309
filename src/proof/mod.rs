//! Attested Receipt Proof System
//!
//! Provides tamper-evident engagement receipts through:
//! - Per-session receipt commitments
//! - Window-scoped Merkle roots
//! - Inclusion proofs verifiable without the full leaf set
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF SYSTEM                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  commitment.rs   - Receipt metadata -> SHA-256 commitment   │
//! │  merkle.rs       - Binary Merkle tree, root + proofs        │
//! │  verify.rs       - Proof replay against a claimed root      │
//! │  window.rs       - Window accumulation, root publication    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod commitment;
pub mod merkle;
pub mod verify;
pub mod window;

// Re-export key types
pub use commitment::{commit, commit_hex, Commitment, ReceiptBuilder, ReceiptError, ReceiptMeta};
pub use merkle::{
    merkle_proofs, merkle_root, merkle_root_hex, MerkleProof, MerkleTree, ProofStep, Side,
    EMPTY_ROOT,
};
pub use verify::{verify, verify_hex, ProofError};
pub use window::{
    CommitReceipt, CommitStatus, MemoryWindowStore, ProofEntry, PublishedRoot, WindowAccumulator,
    WindowEntry, WindowError, WindowLabel, WindowProofs, WindowStore,
};
