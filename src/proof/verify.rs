//! Inclusion Proof Verification
//!
//! Replays a proof from a leaf to a claimed root without the rest of the
//! window. Verification is pure: a well-formed proof that does not reach the
//! root yields `false`; only input that cannot be parsed is an error.

use thiserror::Error;

use crate::core::hash::{parse_digest, Digest, DigestError};
use crate::proof::merkle::{ProofStep, Side, EMPTY_ROOT};

/// Structurally invalid proof input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    /// Leaf digest could not be parsed.
    #[error("malformed leaf digest: {0}")]
    MalformedLeaf(DigestError),

    /// Claimed root could not be parsed.
    #[error("malformed root digest: {0}")]
    MalformedRoot(DigestError),

    /// A sibling digest could not be parsed.
    #[error("malformed sibling at step {index}: {source}")]
    MalformedSibling {
        /// Step position in the proof.
        index: usize,
        /// Parse failure.
        source: DigestError,
    },

    /// A side marker was neither `L` nor `R`.
    #[error("invalid side marker {marker:?} at step {index}")]
    InvalidSide {
        /// Step position in the proof.
        index: usize,
        /// The marker received.
        marker: String,
    },
}

/// Verify `leaf` against `root` by folding `proof` in order.
pub fn verify(leaf: &Digest, proof: &[ProofStep], root: &Digest) -> bool {
    let computed = proof.iter().fold(*leaf, |node, step| step.apply(&node));
    computed == *root
}

/// Verify hex-encoded input as received from an auditor.
///
/// Each proof entry is a `(sibling_hex, side)` pair. Hex is accepted in
/// either case. An empty claimed root ([`EMPTY_ROOT`]) never contains a
/// leaf, so it verifies as `false`.
pub fn verify_hex<S, T>(leaf: &str, proof: &[(S, T)], root: &str) -> Result<bool, ProofError>
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    let leaf = parse_digest(leaf).map_err(ProofError::MalformedLeaf)?;
    let steps = parse_steps(proof)?;

    if root == EMPTY_ROOT {
        return Ok(false);
    }
    let root = parse_digest(root).map_err(ProofError::MalformedRoot)?;

    Ok(verify(&leaf, &steps, &root))
}

/// Parse wire pairs into proof steps.
pub fn parse_steps<S, T>(proof: &[(S, T)]) -> Result<Vec<ProofStep>, ProofError>
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    proof
        .iter()
        .enumerate()
        .map(|(index, (sibling, side))| {
            let sibling = parse_digest(sibling.as_ref())
                .map_err(|source| ProofError::MalformedSibling { index, source })?;
            let side = Side::parse(side.as_ref()).ok_or_else(|| ProofError::InvalidSide {
                index,
                marker: side.as_ref().to_string(),
            })?;
            Ok(ProofStep { sibling, side })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::{hash_bytes, to_hex};
    use crate::proof::merkle::MerkleTree;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn wire_tree(n: usize) -> (Vec<String>, Vec<Vec<(String, &'static str)>>, String) {
        let leaves: Vec<Digest> = (0..n).map(|i| hash_bytes(&[i as u8])).collect();
        let tree = MerkleTree::from_leaves(leaves.clone());
        let proofs = tree
            .proofs()
            .iter()
            .map(|p| p.steps.iter().map(ProofStep::to_wire).collect())
            .collect();
        (leaves.iter().map(to_hex).collect(), proofs, tree.root_hex())
    }

    #[test]
    fn test_verify_hex_all_leaves() {
        let (leaves, proofs, root) = wire_tree(7);
        for (leaf, proof) in leaves.iter().zip(&proofs) {
            assert_eq!(verify_hex(leaf, proof, &root), Ok(true));
        }
    }

    #[test]
    fn test_uppercase_input_accepted() {
        let (leaves, proofs, root) = wire_tree(4);
        let upper: Vec<(String, &str)> = proofs[1]
            .iter()
            .map(|(s, side)| (s.to_uppercase(), *side))
            .collect();
        assert_eq!(
            verify_hex(&leaves[1].to_uppercase(), &upper, &root.to_uppercase()),
            Ok(true)
        );
    }

    #[test]
    fn test_flipped_sibling_byte_is_false() {
        let (leaves, proofs, root) = wire_tree(5);
        let mut tampered = proofs[0].clone();
        let mut bytes = hex::decode(&tampered[0].0).unwrap();
        bytes[0] ^= 0x01;
        tampered[0].0 = hex::encode(bytes);

        assert_eq!(verify_hex(&leaves[0], &tampered, &root), Ok(false));
    }

    #[test]
    fn test_wrong_root_is_false() {
        let (leaves, proofs, _) = wire_tree(3);
        let other = to_hex(&hash_bytes(b"other"));
        assert_eq!(verify_hex(&leaves[0], &proofs[0], &other), Ok(false));
    }

    #[test]
    fn test_swapped_side_is_false() {
        let (leaves, proofs, root) = wire_tree(4);
        let mut swapped = proofs[0].clone();
        swapped[0].1 = "L";
        assert_eq!(verify_hex(&leaves[0], &swapped, &root), Ok(false));
    }

    #[test]
    fn test_empty_root_is_false() {
        let (leaves, _, _) = wire_tree(1);
        let none: [(&str, &str); 0] = [];
        assert_eq!(verify_hex(&leaves[0], &none, EMPTY_ROOT), Ok(false));
    }

    #[test]
    fn test_random_tamper_is_detected() {
        let mut rng = StdRng::seed_from_u64(0xfa1);
        for _ in 0..50 {
            let n = rng.gen_range(2..64);
            let leaves: Vec<Digest> = (0..n).map(|_| rng.gen::<[u8; 32]>()).collect();
            let tree = MerkleTree::from_leaves(leaves.clone());
            let root = tree.root().unwrap();

            let i = rng.gen_range(0..n);
            let mut steps = tree.proof(i).unwrap().steps;
            assert!(verify(&leaves[i], &steps, &root));

            let step = rng.gen_range(0..steps.len());
            let byte = rng.gen_range(0..32);
            steps[step].sibling[byte] ^= 1 << rng.gen_range(0..8);
            assert!(!verify(&leaves[i], &steps, &root));
        }
    }

    #[test]
    fn test_malformed_input_is_error() {
        let (leaves, proofs, root) = wire_tree(2);

        assert!(matches!(
            verify_hex("xyz", &proofs[0], &root),
            Err(ProofError::MalformedLeaf(_))
        ));
        assert!(matches!(
            verify_hex(&leaves[0], &proofs[0], "abcd"),
            Err(ProofError::MalformedRoot(DigestError::WrongLength { .. }))
        ));
        assert!(matches!(
            verify_hex(&leaves[0], &[("aa", "R")], &root),
            Err(ProofError::MalformedSibling { index: 0, .. })
        ));
        let bad_side = [(leaves[1].as_str(), "right")];
        assert_eq!(
            verify_hex(&leaves[0], &bad_side, &root),
            Err(ProofError::InvalidSide { index: 0, marker: "right".to_string() })
        );
    }
}
