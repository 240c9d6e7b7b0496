// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Cache eviction through a large scratch region.

use std::hint::black_box;

use crate::error::BufferError;

/// Scratch size, well beyond the last-level cache of current CPUs.
pub const DEFAULT_SCRATCH_BYTES: usize = 64 * 1024 * 1024;

/// Walks a scratch region before each uncached trial so the benchmark
/// buffers are evicted and transfers start from main memory.
pub struct CacheFlusher {
    scratch: Vec<usize>,
    /// Alternates between calls: decrement first, then increment.
    decrement_next: bool,
}

impl CacheFlusher {
    /// Allocate a zeroed scratch region of roughly `bytes` bytes.
    pub fn new(bytes: usize) -> Result<Self, BufferError> {
        let words = bytes / std::mem::size_of::<usize>();
        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(words)
            .map_err(|_| BufferError::AllocationFailed {
                bytes,
                region: "cache scratch",
            })?;
        scratch.resize(words, 0);

        tracing::debug!(bytes = bytes, words = words, "Allocated cache scratch region");

        Ok(Self {
            scratch,
            decrement_next: true,
        })
    }

    pub fn word_count(&self) -> usize {
        self.scratch.len()
    }

    /// Read-modify-write every word of the scratch region.
    pub fn flush(&mut self) {
        if self.decrement_next {
            for word in self.scratch.iter_mut() {
                *word = word.wrapping_sub(1);
            }
        } else {
            for word in self.scratch.iter_mut() {
                *word = word.wrapping_add(1);
            }
        }
        self.decrement_next = !self.decrement_next;
        black_box(&mut self.scratch);
    }

    pub fn words(&self) -> &[usize] {
        &self.scratch
    }
}
