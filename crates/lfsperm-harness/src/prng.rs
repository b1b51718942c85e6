//! Deterministic pseudo-random generator for define values and test bodies.
//!
//! The transition is a pure function of a single `u32` state: a Weyl step
//! followed by the murmur3 finalizer. The finalizer is a bijection on `u32`
//! and the Weyl step has full period, so every output value is reachable and
//! state `0` is as good as any other.
//!
//! # Determinism
//!
//! Seeds come from the stable test id (`case:permutation`), never from time
//! or OS entropy. Re-running one permutation reproduces its random stream.

use xxhash_rust::xxh3::xxh3_64;

const WEYL_INCREMENT: u32 = 0x9E37_79B9;

/// Advance `state`, returning `(value, next_state)`.
#[inline]
#[must_use]
pub const fn prng_next(state: u32) -> (u32, u32) {
    let next = state.wrapping_add(WEYL_INCREMENT);
    let mut z = next;
    z = (z ^ (z >> 16)).wrapping_mul(0x85EB_CA6B);
    z = (z ^ (z >> 13)).wrapping_mul(0xC2B2_AE35);
    z ^= z >> 16;
    (z, next)
}

/// Seed for one `(case, permutation)` pair.
#[must_use]
pub fn permutation_seed(case: &str, permutation: usize) -> u32 {
    let hash = xxh3_64(format!("{case}:{permutation}").as_bytes());
    // fold both halves so no bits are discarded
    (hash ^ (hash >> 32)) as u32
}

/// Stateful wrapper over [`prng_next`] owned by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPrng {
    state: u32,
}

impl TestPrng {
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Generator for one `(case, permutation)` pair.
    #[must_use]
    pub fn for_permutation(case: &str, permutation: usize) -> Self {
        Self::new(permutation_seed(case, permutation))
    }

    /// Current state, for checkpointing a stream.
    #[must_use]
    pub const fn state(&self) -> u32 {
        self.state
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let (value, next) = prng_next(self.state);
        self.state = next;
        value
    }

    /// Uniform value in `[0, bound)`. Uses rejection sampling to avoid modulo bias.
    ///
    /// # Panics
    ///
    /// Panics if `bound` is zero.
    pub fn next_below(&mut self, bound: u32) -> u32 {
        assert!(bound > 0, "bound must be non-zero");
        let threshold = u32::MAX - (u32::MAX % bound);
        loop {
            let value = self.next_u32();
            if value < threshold {
                return value % bound;
            }
        }
    }

    pub fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_is_pure() {
        for state in [0_u32, 1, 42, 0xDEAD_BEEF, u32::MAX] {
            assert_eq!(prng_next(state), prng_next(state));
        }
    }

    #[test]
    fn zero_state_is_usable() {
        let mut prng = TestPrng::new(0);
        let first = prng.next_u32();
        let second = prng.next_u32();
        assert_ne!(first, second);
        assert_ne!(prng.state(), 0);
    }

    #[test]
    fn consecutive_outputs_are_not_trivially_correlated() {
        let mut prng = TestPrng::new(1);
        let values: Vec<u32> = (0..256).map(|_| prng.next_u32()).collect();
        let deltas: std::collections::BTreeSet<u32> = values
            .windows(2)
            .map(|pair| pair[1].wrapping_sub(pair[0]))
            .collect();
        assert!(deltas.len() > 250, "outputs look like a constant-step sequence");
        let high_bits = values.iter().filter(|value| **value >> 31 == 1).count();
        assert!((64..=192).contains(&high_bits), "high bit set {high_bits}/256 times");
    }

    #[test]
    fn same_permutation_same_stream() {
        let mut a = TestPrng::for_permutation("test_dirs_many", 42);
        let mut b = TestPrng::for_permutation("test_dirs_many", 42);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn different_permutations_differ() {
        assert_ne!(
            permutation_seed("test_dirs_many", 0),
            permutation_seed("test_dirs_many", 1)
        );
        assert_ne!(
            permutation_seed("test_dirs_many", 0),
            permutation_seed("test_files_many", 0)
        );
    }

    #[test]
    fn next_below_stays_in_bound() {
        let mut prng = TestPrng::new(7);
        for bound in [1_u32, 2, 3, 10, 1000] {
            for _ in 0..200 {
                assert!(prng.next_below(bound) < bound);
            }
        }
    }

    #[test]
    fn fill_bytes_handles_tail() {
        let mut a = TestPrng::new(9);
        let mut b = TestPrng::new(9);
        let mut short = [0_u8; 7];
        let mut long = [0_u8; 8];
        a.fill_bytes(&mut short);
        b.fill_bytes(&mut long);
        assert_eq!(short, long[..7]);
    }
}
