// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Message sizes visited by a sweep.
//!
//! The base size grows by an increment that doubles every other step, which
//! gives a roughly logarithmic walk with two points per octave. Once the
//! increment is large enough, each base size is also probed `perturbation`
//! bytes below and above, to expose throughput cliffs around alignment and
//! power-of-two boundaries.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::SizeRange;

/// Seed shared by both roles so they draw identical random sizes without
/// exchanging them.
pub const RANDOM_SEED: u64 = 0xdead_beef;

/// All message sizes of a sweep over `range`, strictly increasing.
pub fn sweep(range: SizeRange, perturbation: usize) -> Vec<usize> {
    let lower = range.lower();
    let upper = range.upper();

    let mut sizes: Vec<usize> = Vec::new();
    let mut inc = if lower > 1 { lower / 2 } else { 1 };
    let mut step = if lower > 1 { 1 } else { 0 };
    let mut len = lower;

    while len <= upper {
        if step > 2 && step % 2 == 1 {
            inc += inc;
        }

        let perturbed = perturbation > 0 && inc > perturbation + 1;
        let candidates = if perturbed {
            [len.checked_sub(perturbation), Some(len), len.checked_add(perturbation)]
        } else {
            [None, Some(len), None]
        };

        for size in candidates.into_iter().flatten() {
            if range.contains(size) && sizes.last().map_or(true, |&last| size > last) {
                sizes.push(size);
            }
        }

        len = match len.checked_add(inc) {
            Some(next) => next,
            None => break,
        };
        step += 1;
    }

    sizes
}

/// Deterministic per-repetition sizes for randomized runs.
pub struct RandomSizes {
    range: SizeRange,
    rng: StdRng,
}

impl RandomSizes {
    pub fn new(range: SizeRange) -> Self {
        Self {
            range,
            rng: StdRng::seed_from_u64(RANDOM_SEED),
        }
    }

    /// Restart the sequence. Called at the start of every trial so each
    /// trial, and each role, sees the same sizes.
    pub fn reseed(&mut self) {
        self.rng = StdRng::seed_from_u64(RANDOM_SEED);
    }

    pub fn next_size(&mut self) -> usize {
        self.rng.gen_range(self.range.lower()..=self.range.upper())
    }

    pub fn range(&self) -> SizeRange {
        self.range
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_without_perturbation() {
        let range = SizeRange::new(1, 64).unwrap();
        assert_eq!(
            sweep(range, 0),
            vec![1, 2, 3, 4, 6, 8, 12, 16, 24, 32, 48, 64]
        );
    }

    #[test]
    fn test_sweep_with_perturbation() {
        let range = SizeRange::new(1, 100).unwrap();
        let sizes = sweep(range, 3);
        // Small increments are never perturbed.
        assert_eq!(&sizes[..7], &[1, 2, 3, 4, 6, 8, 12]);
        // From an increment of 8 onwards each base size gets neighbours.
        assert!(sizes.contains(&13));
        assert!(sizes.contains(&16));
        assert!(sizes.contains(&19));
        assert!(sizes.contains(&61));
        assert!(sizes.contains(&67));
    }

    #[test]
    fn test_sweep_strictly_increasing_within_range() {
        for (lower, upper, pert) in [(1, 1 << 20, 3), (7, 100_000, 1), (1000, 1000, 3)] {
            let range = SizeRange::new(lower, upper).unwrap();
            let sizes = sweep(range, pert);
            assert!(!sizes.is_empty());
            assert!(sizes.windows(2).all(|w| w[0] < w[1]));
            assert!(sizes.iter().all(|&s| range.contains(s)));
            assert_eq!(sizes[0], lower);
        }
    }

    #[test]
    fn test_sweep_from_larger_start() {
        let range = SizeRange::new(1024, 4096).unwrap();
        assert_eq!(
            sweep(range, 0),
            vec![1024, 1536, 2048, 3072, 4096]
        );
    }

    #[test]
    fn test_random_sizes_reproducible() {
        let range = SizeRange::new(64, 1500).unwrap();
        let mut a = RandomSizes::new(range);
        let mut b = RandomSizes::new(range);
        let first: Vec<usize> = (0..32).map(|_| a.next_size()).collect();
        let second: Vec<usize> = (0..32).map(|_| b.next_size()).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|&s| range.contains(s)));

        a.reseed();
        let again: Vec<usize> = (0..32).map(|_| a.next_size()).collect();
        assert_eq!(first, again);
    }
}
