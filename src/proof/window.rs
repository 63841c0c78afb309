//! Window Accumulation and Root Publication
//!
//! Receipts are committed into caller-labelled windows (typically hourly
//! buckets). A window is append-only and rejects a commitment it already
//! holds; the same commitment in a different window is a distinct event.
//! Publishing computes the root over the window's current membership and
//! overwrites any previous root for that window.
//!
//! Storage is a host capability ([`WindowStore`]). [`MemoryWindowStore`] is the
//! reference implementation used by tests and the audit binary.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::allocation::fairsplit::{self, FairSplitPreview, SettlementError};
use crate::proof::commitment::{commit, Commitment, ReceiptError, ReceiptMeta};
use crate::proof::merkle::{MerkleTree, ProofStep, EMPTY_ROOT};
use crate::proof::verify::verify;

/// Window accumulation errors.
#[derive(Debug, Error)]
pub enum WindowError {
    /// Commitment already present in this window.
    #[error("commitment {commitment} already recorded in window {window}")]
    DuplicateCommitment {
        /// Window label.
        window: String,
        /// Rejected commitment.
        commitment: Commitment,
    },

    /// Receipt failed validation.
    #[error(transparent)]
    InvalidReceipt(#[from] ReceiptError),

    /// Operation needs a published, non-empty root.
    #[error("no merkle root published for window {0}")]
    RootNotPublished(String),

    /// Bounty split rejected its inputs.
    #[error(transparent)]
    Settlement(#[from] SettlementError),

    /// Backing store failure.
    #[error("window store error: {0}")]
    Store(String),
}

/// Window label helper.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowLabel(pub String);

impl WindowLabel {
    /// Hour bucket label, `YYYYMMDDHH` in UTC.
    pub fn hourly(at: DateTime<Utc>) -> Self {
        Self(at.format("%Y%m%d%H").to_string())
    }

    /// Label text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WindowLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A committed receipt held by a window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowEntry {
    /// Leaf commitment.
    pub commitment: Commitment,
    /// Receipt it commits to.
    pub meta: ReceiptMeta,
}

/// Root published for a window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedRoot {
    /// Window label.
    pub window: String,
    /// Root hex ([`EMPTY_ROOT`] for an empty window).
    pub root: String,
    /// Leaves covered by the root.
    pub leaf_count: usize,
}

/// Outcome of committing one receipt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStatus {
    /// New leaf appended.
    Recorded,
    /// Leaf already present; nothing changed.
    DuplicateIgnored,
}

/// Commitment plus what happened to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// Commitment digest.
    pub commitment: Commitment,
    /// Recorded or ignored.
    pub status: CommitStatus,
}

/// Host-provided window storage.
///
/// Implementations must keep entries in insertion order. Callers serialize
/// `contains` + `append` per window; `append` must still refuse a duplicate.
pub trait WindowStore {
    /// Is `commitment` already a leaf of `window`?
    fn contains(&self, window: &str, commitment: &Commitment) -> Result<bool, WindowError>;

    /// Append a new leaf.
    fn append(&mut self, window: &str, entry: WindowEntry) -> Result<(), WindowError>;

    /// All entries of `window` in insertion order.
    fn entries(&self, window: &str) -> Result<Vec<WindowEntry>, WindowError>;

    /// Store (or replace) the published root.
    fn put_root(&mut self, root: PublishedRoot) -> Result<(), WindowError>;

    /// Last published root for `window`.
    fn root(&self, window: &str) -> Result<Option<PublishedRoot>, WindowError>;
}

/// Leaves of one window: insertion order plus a membership index.
#[derive(Clone, Debug, Default)]
struct WindowLog {
    entries: Vec<WindowEntry>,
    members: BTreeSet<Commitment>,
}

/// In-memory window store.
#[derive(Clone, Debug, Default)]
pub struct MemoryWindowStore {
    windows: BTreeMap<String, WindowLog>,
    roots: BTreeMap<String, PublishedRoot>,
}

impl MemoryWindowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl WindowStore for MemoryWindowStore {
    fn contains(&self, window: &str, commitment: &Commitment) -> Result<bool, WindowError> {
        Ok(self
            .windows
            .get(window)
            .is_some_and(|log| log.members.contains(commitment)))
    }

    fn append(&mut self, window: &str, entry: WindowEntry) -> Result<(), WindowError> {
        let log = self.windows.entry(window.to_string()).or_default();
        if !log.members.insert(entry.commitment) {
            return Err(WindowError::DuplicateCommitment {
                window: window.to_string(),
                commitment: entry.commitment,
            });
        }
        log.entries.push(entry);
        Ok(())
    }

    fn entries(&self, window: &str) -> Result<Vec<WindowEntry>, WindowError> {
        Ok(self
            .windows
            .get(window)
            .map(|log| log.entries.clone())
            .unwrap_or_default())
    }

    fn put_root(&mut self, root: PublishedRoot) -> Result<(), WindowError> {
        self.roots.insert(root.window.clone(), root);
        Ok(())
    }

    fn root(&self, window: &str) -> Result<Option<PublishedRoot>, WindowError> {
        Ok(self.roots.get(window).cloned())
    }
}

/// One leaf's proof in a window bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofEntry {
    /// Leaf commitment.
    pub commitment: Commitment,
    /// Receipt metadata.
    pub meta: ReceiptMeta,
    /// Steps from the leaf to the snapshot root.
    pub proof: Vec<ProofStep>,
}

/// Audit bundle: every leaf of a window with its proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowProofs {
    /// Window label.
    pub window: String,
    /// Last published root ([`EMPTY_ROOT`] if never published).
    pub root: String,
    /// Root of the leaf set the proofs were built from.
    pub snapshot_root: String,
    /// Per-leaf proofs in insertion order.
    pub entries: Vec<ProofEntry>,
}

impl WindowProofs {
    /// Does the published root cover exactly this snapshot?
    pub fn is_current(&self) -> bool {
        self.root == self.snapshot_root
    }

    /// Replay every proof against the snapshot root.
    pub fn verify_all(&self) -> bool {
        let Ok(root) = crate::core::hash::parse_digest(&self.snapshot_root) else {
            return self.entries.is_empty();
        };
        self.entries
            .iter()
            .all(|e| verify(e.commitment.as_digest(), &e.proof, &root))
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

/// Commits receipts into windows and publishes their roots.
pub struct WindowAccumulator<S: WindowStore> {
    store: S,
}

impl<S: WindowStore> WindowAccumulator<S> {
    /// Wrap a store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Unwrap the store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Commit a receipt into `window`.
    ///
    /// A commitment already in the window is reported as
    /// [`CommitStatus::DuplicateIgnored`] and leaves the window unchanged.
    pub fn commit_receipt(
        &mut self,
        window: &str,
        meta: ReceiptMeta,
    ) -> Result<CommitReceipt, WindowError> {
        let commitment = commit(&meta)?;

        if self.store.contains(window, &commitment)? {
            debug!(window, %commitment, "duplicate receipt ignored");
            return Ok(CommitReceipt {
                commitment,
                status: CommitStatus::DuplicateIgnored,
            });
        }

        match self.store.append(window, WindowEntry { commitment, meta }) {
            Ok(()) => {
                debug!(window, %commitment, "receipt recorded");
                Ok(CommitReceipt {
                    commitment,
                    status: CommitStatus::Recorded,
                })
            }
            Err(WindowError::DuplicateCommitment { .. }) => {
                debug!(window, %commitment, "duplicate receipt ignored by store");
                Ok(CommitReceipt {
                    commitment,
                    status: CommitStatus::DuplicateIgnored,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Compute and store the root over the window's current leaves.
    pub fn publish_root(&mut self, window: &str) -> Result<PublishedRoot, WindowError> {
        let tree = self.tree(window)?;
        let published = PublishedRoot {
            window: window.to_string(),
            root: tree.root_hex(),
            leaf_count: tree.leaf_count(),
        };
        self.store.put_root(published.clone())?;

        info!(
            window,
            root = %published.root,
            leaves = published.leaf_count,
            "published window root"
        );
        Ok(published)
    }

    /// Last published root, if any.
    pub fn published_root(&self, window: &str) -> Result<Option<PublishedRoot>, WindowError> {
        self.store.root(window)
    }

    /// Proofs for every leaf of the window's current membership.
    pub fn proof_bundle(&self, window: &str) -> Result<WindowProofs, WindowError> {
        let entries = self.store.entries(window)?;
        let tree = MerkleTree::from_leaves(entries.iter().map(|e| e.commitment.0).collect());
        let proofs = tree.proofs();

        let root = self
            .store
            .root(window)?
            .map(|r| r.root)
            .unwrap_or_else(|| EMPTY_ROOT.to_string());

        let bundle = WindowProofs {
            window: window.to_string(),
            root,
            snapshot_root: tree.root_hex(),
            entries: entries
                .into_iter()
                .zip(proofs)
                .map(|(entry, proof)| ProofEntry {
                    commitment: entry.commitment,
                    meta: entry.meta,
                    proof: proof.steps,
                })
                .collect(),
        };

        debug!(
            window,
            leaves = bundle.entries.len(),
            current = bundle.is_current(),
            "built proof bundle"
        );
        Ok(bundle)
    }

    /// Bounty split preview over a window with a published root.
    ///
    /// A negative or non-finite pool is rejected.
    pub fn fairsplit_preview(
        &self,
        window: &str,
        pool: f64,
    ) -> Result<FairSplitPreview, WindowError> {
        let root = match self.store.root(window)? {
            Some(published) if published.root != EMPTY_ROOT => published.root,
            _ => return Err(WindowError::RootNotPublished(window.to_string())),
        };
        let receipts: Vec<ReceiptMeta> = self
            .store
            .entries(window)?
            .into_iter()
            .map(|e| e.meta)
            .collect();
        Ok(fairsplit::preview(window, &root, &receipts, pool)?)
    }

    fn tree(&self, window: &str) -> Result<MerkleTree, WindowError> {
        let leaves = self
            .store
            .entries(window)?
            .iter()
            .map(|e| e.commitment.0)
            .collect();
        Ok(MerkleTree::from_leaves(leaves))
    }
}
