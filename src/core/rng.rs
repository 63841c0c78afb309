//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ for fast, reproducible permutation sampling.
//! Given the same seed, produces an identical sequence on all platforms, so an
//! allocation run can be replayed exactly by an auditor.

use serde::{Deserialize, Serialize};

use super::hash::{Digest, DigestHasher};

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use fairsplit::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // State must never be all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create an RNG seeded from a published window root.
    pub fn for_settlement(window: &str, root: &Digest, label: &str) -> Self {
        Self::new(derive_settlement_seed(window, root, label))
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a uniform index in `[0, bound)`.
    ///
    /// Uses rejection sampling so small bounds carry no modulo bias.
    #[inline]
    pub fn next_index(&mut self, bound: usize) -> usize {
        if bound <= 1 {
            return 0;
        }
        let bound = bound as u64;
        let zone = u64::MAX - (u64::MAX % bound);
        loop {
            let value = self.next_u64();
            if value < zone {
                return (value % bound) as usize;
            }
        }
    }

    /// Shuffle a slice in place using Fisher-Yates.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.next_index(i + 1);
            slice.swap(i, j);
        }
    }

    /// Split off `count` independent child generators.
    ///
    /// Consumes exactly `count` values from this generator.
    pub fn fork(&mut self, count: usize) -> Vec<DeterministicRng> {
        (0..count).map(|_| Self::new(self.next_u64())).collect()
    }

    /// Get current state (for checkpointing/debugging).
    pub fn state(&self) -> [u64; 2] {
        self.state
    }

    /// Restore from saved state.
    pub fn set_state(&mut self, state: [u64; 2]) {
        self.state = state;
    }
}

/// SplitMix64 for seed initialization.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive an allocation seed from a published window.
///
/// Anyone holding the window label and its published root can reproduce
/// the permutation sequence used for a settlement.
pub fn derive_settlement_seed(window: &str, root: &Digest, label: &str) -> u64 {
    let mut hasher = DigestHasher::with_domain(b"FAIRSPLIT_SETTLEMENT_SEED_V1");

    // Length prefixes keep (window, label) splits unambiguous
    hasher.update_u64(window.len() as u64);
    hasher.update_str(window);
    hasher.update_bytes(root);
    hasher.update_u64(label.len() as u64);
    hasher.update_str(label);

    let hash = hasher.finalize();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================
