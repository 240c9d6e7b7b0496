// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark memory: aligned send/receive pools and the cache flusher.

mod flush;
mod pool;

pub use flush::{CacheFlusher, DEFAULT_SCRATCH_BYTES};
pub use pool::{
    align_offset, aligned_block_len, BufferPool, Region, RESTING_FILL, SEND_FILL,
    UNCACHED_POOL_BYTES,
};
