//! Merkle Tree over Window Commitments
//!
//! Binary SHA-256 tree over an ordered list of receipt commitments.
//!
//! Construction rules:
//! - Leaves are the commitments themselves (no re-hashing).
//! - A single leaf is its own root; an empty tree has no root.
//! - Parents are `H(left || right)`.
//! - On an odd-length level the last node pairs with itself.
//!
//! All levels are kept after construction so every proof is a read-only walk
//! of O(log n) steps.

use serde::de::Error as _;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::hash::{hash_pair, parse_digest, to_hex, Digest, DigestError};

/// Root text for a window with no leaves.
pub const EMPTY_ROOT: &str = "";

/// Which side of the running node a sibling sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Sibling precedes the node: parent is `H(sibling || node)`.
    #[serde(rename = "L")]
    Left,
    /// Sibling follows the node: parent is `H(node || sibling)`.
    #[serde(rename = "R")]
    Right,
}

impl Side {
    /// Wire marker (`"L"` or `"R"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "L",
            Side::Right => "R",
        }
    }

    /// Parse a wire marker.
    pub fn parse(marker: &str) -> Option<Self> {
        match marker {
            "L" => Some(Side::Left),
            "R" => Some(Side::Right),
            _ => None,
        }
    }
}

/// One level of an inclusion proof.
///
/// Serialized as a `[sibling_hex, side]` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofStep {
    /// Sibling of the running node at this level.
    pub sibling: Digest,
    /// Position of the sibling relative to the running node.
    pub side: Side,
}

impl ProofStep {
    /// Fold the running node with this step's sibling.
    #[inline]
    pub fn apply(&self, node: &Digest) -> Digest {
        match self.side {
            Side::Right => hash_pair(node, &self.sibling),
            Side::Left => hash_pair(&self.sibling, node),
        }
    }

    /// Hex/marker pair as it appears on the wire.
    pub fn to_wire(&self) -> (String, &'static str) {
        (to_hex(&self.sibling), self.side.as_str())
    }
}

impl Serialize for ProofStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut pair = serializer.serialize_tuple(2)?;
        pair.serialize_element(&to_hex(&self.sibling))?;
        pair.serialize_element(&self.side)?;
        pair.end()
    }
}

impl<'de> Deserialize<'de> for ProofStep {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (sibling, side) = <(String, Side)>::deserialize(deserializer)?;
        let sibling = parse_digest(&sibling).map_err(D::Error::custom)?;
        Ok(Self { sibling, side })
    }
}

/// Merkle inclusion proof.
///
/// Tied to the exact leaf set the tree was built from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Index of the leaf this proof is for.
    pub leaf_index: usize,
    /// Sibling steps from the leaf level upward.
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    /// Replay this proof from `leaf` and compare with `root`.
    pub fn verify(&self, leaf: &Digest, root: &Digest) -> bool {
        crate::proof::verify::verify(leaf, &self.steps, root)
    }
}

/// Binary Merkle tree with all levels retained.
#[derive(Clone, Debug, Default)]
pub struct MerkleTree {
    /// Tree levels (leaves at index 0, root at last index).
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Build a tree over `leaves` in the given order.
    pub fn from_leaves(leaves: Vec<Digest>) -> Self {
        if leaves.is_empty() {
            return Self { levels: Vec::new() };
        }

        let mut levels = vec![leaves];
        loop {
            let top = &levels[levels.len() - 1];
            if top.len() <= 1 {
                break;
            }
            let next = parent_level(top);
            levels.push(next);
        }

        Self { levels }
    }

    /// Build a tree from hex leaves.
    pub fn from_hex_leaves<S: AsRef<str>>(leaves: &[S]) -> Result<Self, DigestError> {
        let parsed = leaves
            .iter()
            .map(|leaf| parse_digest(leaf.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_leaves(parsed))
    }

    /// Root digest, or `None` for an empty tree.
    pub fn root(&self) -> Option<Digest> {
        self.levels.last()?.first().copied()
    }

    /// Root as lowercase hex, [`EMPTY_ROOT`] for an empty tree.
    pub fn root_hex(&self) -> String {
        self.root().map(|r| to_hex(&r)).unwrap_or_else(|| EMPTY_ROOT.to_string())
    }

    /// Number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Leaf digests in insertion order.
    pub fn leaves(&self) -> &[Digest] {
        self.levels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tree height (number of proof steps per leaf).
    pub fn depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Generate the inclusion proof for the leaf at `index`.
    ///
    /// Returns None if index is out of bounds.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut steps = Vec::with_capacity(self.depth());
        let mut current = index;

        for level in &self.levels[..self.depth()] {
            let (sibling_index, side) = if current % 2 == 0 {
                (current + 1, Side::Right)
            } else {
                (current - 1, Side::Left)
            };
            // Last node of an odd level is its own sibling
            let sibling = level.get(sibling_index).unwrap_or(&level[current]);
            steps.push(ProofStep {
                sibling: *sibling,
                side,
            });
            current /= 2;
        }

        Some(MerkleProof {
            leaf_index: index,
            steps,
        })
    }

    /// Proofs for every leaf, in leaf order.
    #[cfg(not(feature = "parallel"))]
    pub fn proofs(&self) -> Vec<MerkleProof> {
        (0..self.leaf_count()).filter_map(|i| self.proof(i)).collect()
    }

    /// Proofs for every leaf, in leaf order.
    #[cfg(feature = "parallel")]
    pub fn proofs(&self) -> Vec<MerkleProof> {
        use rayon::prelude::*;
        (0..self.leaf_count())
            .into_par_iter()
            .filter_map(|i| self.proof(i))
            .collect()
    }
}

/// Combine one level into its parent level.
fn parent_level(level: &[Digest]) -> Vec<Digest> {
    level
        .chunks(2)
        .map(|pair| {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            hash_pair(left, right)
        })
        .collect()
}

/// Compute a root without retaining intermediate levels.
///
/// Returns None for an empty leaf list.
pub fn merkle_root(leaves: &[Digest]) -> Option<Digest> {
    let mut level = match leaves.len() {
        0 => return None,
        1 => return Some(leaves[0]),
        _ => parent_level(leaves),
    };
    while level.len() > 1 {
        level = parent_level(&level);
    }
    level.first().copied()
}

/// Root over hex leaves, returned as hex ([`EMPTY_ROOT`] when empty).
pub fn merkle_root_hex<S: AsRef<str>>(leaves: &[S]) -> Result<String, DigestError> {
    let parsed = leaves
        .iter()
        .map(|leaf| parse_digest(leaf.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(merkle_root(&parsed).map(|r| to_hex(&r)).unwrap_or_default())
}

/// Proofs for every hex leaf, same order as input.
pub fn merkle_proofs<S: AsRef<str>>(leaves: &[S]) -> Result<Vec<MerkleProof>, DigestError> {
    Ok(MerkleTree::from_hex_leaves(leaves)?.proofs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::hash_bytes;
    use proptest::prelude::*;

    fn digests(n: usize) -> Vec<Digest> {
        (0..n).map(|i| hash_bytes(format!("leaf_{}", i).as_bytes())).collect()
    }

    #[test]
    fn test_empty_tree() {
        let tree = MerkleTree::from_leaves(Vec::new());
        assert_eq!(tree.root(), None);
        assert_eq!(tree.root_hex(), EMPTY_ROOT);
        assert_eq!(tree.leaf_count(), 0);
        assert!(tree.proofs().is_empty());
        assert_eq!(merkle_root(&[]), None);
    }

    #[test]
    fn test_single_leaf_is_root() {
        let leaf = hash_bytes(b"only");
        let tree = MerkleTree::from_leaves(vec![leaf]);
        assert_eq!(tree.root(), Some(leaf));
        assert_eq!(merkle_root(&[leaf]), Some(leaf));

        let proof = tree.proof(0).unwrap();
        assert!(proof.steps.is_empty());
        assert!(proof.verify(&leaf, &leaf));
    }

    #[test]
    fn test_two_leaves() {
        let leaves = digests(2);
        let tree = MerkleTree::from_leaves(leaves.clone());
        assert_eq!(tree.root(), Some(hash_pair(&leaves[0], &leaves[1])));
    }

    #[test]
    fn test_odd_level_duplicates_last() {
        let a = [0xaa; 32];
        let b = [0xbb; 32];
        let c = [0xcc; 32];
        let tree = MerkleTree::from_leaves(vec![a, b, c]);

        let expected = hash_pair(&hash_pair(&a, &b), &hash_pair(&c, &c));
        assert_eq!(tree.root(), Some(expected));

        let proof_c = tree.proof(2).unwrap();
        assert_eq!(proof_c.steps[0].sibling, c);
        assert_eq!(proof_c.steps[0].side, Side::Right);
        assert_eq!(proof_c.steps[1].sibling, hash_pair(&a, &b));
        assert_eq!(proof_c.steps[1].side, Side::Left);
        assert!(proof_c.verify(&c, &expected));
    }

    #[test]
    fn test_merkle_root_determinism() {
        let leaves = digests(4);
        let tree1 = MerkleTree::from_leaves(leaves.clone());
        let tree2 = MerkleTree::from_leaves(leaves);
        assert_eq!(tree1.root(), tree2.root());
    }

    #[test]
    fn test_order_matters() {
        let mut leaves = digests(4);
        let root = merkle_root(&leaves);
        leaves.swap(1, 2);
        assert_ne!(merkle_root(&leaves), root);
    }

    #[test]
    fn test_proof_out_of_bounds() {
        let tree = MerkleTree::from_leaves(digests(2));
        assert!(tree.proof(10).is_none());
    }

    #[test]
    fn test_large_tree() {
        let leaves = digests(100);
        let tree = MerkleTree::from_leaves(leaves.clone());
        let root = tree.root().unwrap();
        assert_eq!(tree.depth(), 7);

        for (i, proof) in tree.proofs().iter().enumerate() {
            assert_eq!(proof.leaf_index, i);
            assert_eq!(proof.steps.len(), 7);
            assert!(proof.verify(&leaves[i], &root));
        }
    }

    #[test]
    fn test_hex_api() {
        let hex_leaves: Vec<String> = digests(5).iter().map(to_hex).collect();
        let root = merkle_root_hex(&hex_leaves).unwrap();
        let tree = MerkleTree::from_hex_leaves(&hex_leaves).unwrap();
        assert_eq!(root, tree.root_hex());
        assert_eq!(merkle_proofs(&hex_leaves).unwrap().len(), 5);

        assert_eq!(merkle_root_hex::<&str>(&[]).unwrap(), EMPTY_ROOT);
        assert!(merkle_root_hex(&["not-hex"]).is_err());
    }

    #[test]
    fn test_proof_step_wire_format() {
        let step = ProofStep {
            sibling: [0xcc; 32],
            side: Side::Left,
        };
        let json = serde_json::to_string(&step).unwrap();
        assert_eq!(json, format!("[\"{}\",\"L\"]", "cc".repeat(32)));

        let back: ProofStep = serde_json::from_str(&json).unwrap();
        assert_eq!(back, step);

        assert!(serde_json::from_str::<ProofStep>(r#"["cc","R"]"#).is_err());
        let bad_side = format!("[\"{}\",\"X\"]", "cc".repeat(32));
        assert!(serde_json::from_str::<ProofStep>(&bad_side).is_err());
    }

    proptest! {
        #[test]
        fn prop_every_proof_replays_to_root(n in 1usize..70) {
            let leaves = digests(n);
            let tree = MerkleTree::from_leaves(leaves.clone());
            let root = merkle_root(&leaves).unwrap();
            prop_assert_eq!(tree.root(), Some(root));

            for (i, proof) in tree.proofs().iter().enumerate() {
                prop_assert!(proof.verify(&leaves[i], &root));
            }
        }

        #[test]
        fn prop_proof_rejects_other_leaf(n in 2usize..40, pick in 0usize..40) {
            let leaves = digests(n);
            let tree = MerkleTree::from_leaves(leaves.clone());
            let root = tree.root().unwrap();
            let i = pick % n;
            let j = (i + 1) % n;
            let proof = tree.proof(i).unwrap();
            prop_assert!(!proof.verify(&leaves[j], &root));
        }
    }
}
