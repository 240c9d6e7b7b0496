// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Send/receive memory pools with aligned, wrapping working positions.
//!
//! A pool owns one region (cached mode) or two distinct regions (uncached
//! mode). Working positions are byte indices into those regions rather than
//! raw pointers; the allocation itself never moves, so the origin address a
//! region was allocated at stays valid until the region is dropped.

use crate::error::BufferError;
use crate::types::{BufferOffsets, CacheMode, Role};

/// Fill byte of a resting receive region.
pub const RESTING_FILL: u8 = b'a';

/// Fill byte of a distinct send region.
pub const SEND_FILL: u8 = b'b';

/// Smallest pool used in uncached mode, so consecutive repetitions land on
/// different cache lines even for small messages.
pub const UNCACHED_POOL_BYTES: usize = 10_000_000;

/// Index of the first address at or after `addr` that is a multiple of
/// `boundary`. A zero boundary means no alignment.
pub fn align_offset(addr: *const u8, boundary: usize) -> usize {
    if boundary == 0 {
        return 0;
    }
    match addr as usize % boundary {
        0 => 0,
        rem => boundary - rem,
    }
}

/// Size of a block including trailing padding up to the next boundary.
pub fn aligned_block_len(len: usize, boundary: usize) -> usize {
    if boundary == 0 {
        len
    } else {
        len.div_ceil(boundary) * boundary
    }
}

/// One contiguous allocation plus its aligned start.
pub struct Region {
    name: &'static str,
    storage: Vec<u8>,
    start: usize,
}

impl Region {
    /// Allocate a zeroed region of `bytes` bytes.
    ///
    /// # Errors
    /// Returns `BufferError::AllocationFailed` if the allocator refuses the
    /// request.
    pub fn allocate(name: &'static str, bytes: usize) -> Result<Self, BufferError> {
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(bytes)
            .map_err(|_| BufferError::AllocationFailed {
                bytes,
                region: name,
            })?;
        storage.resize(bytes, 0);

        tracing::debug!(region = name, bytes = bytes, "Allocated buffer region");

        Ok(Self {
            name,
            storage,
            start: 0,
        })
    }

    /// Address the allocation was made at. Never changes for the lifetime
    /// of the region, whatever alignment is applied.
    pub fn origin(&self) -> *const u8 {
        self.storage.as_ptr()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Index of the aligned start.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Move the aligned start to the first `boundary`-aligned address.
    pub fn align(&mut self, boundary: usize) -> usize {
        self.start = align_offset(self.origin(), boundary).min(self.storage.len());
        self.start
    }

    pub fn fill(&mut self, byte: u8) {
        self.storage.fill(byte);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.storage
    }

    fn block(&self, at: usize, len: usize) -> &[u8] {
        &self.storage[at..at + len]
    }

    fn block_mut(&mut self, at: usize, len: usize) -> &mut [u8] {
        &mut self.storage[at..at + len]
    }
}

/// Working position inside a region.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    /// Aligned start plus the configured offset.
    home: usize,
    pos: usize,
}

impl Cursor {
    fn new(home: usize) -> Self {
        Self { home, pos: home }
    }

    /// Step forward by `block` if another block still fits behind the next
    /// one, otherwise wrap back home.
    fn advance(&mut self, block: usize, end: usize) {
        if self.pos + block < end.saturating_sub(block) {
            self.pos += block;
        } else {
            self.pos = self.home;
        }
    }

    fn reset(&mut self) {
        self.pos = self.home;
    }
}

/// Send and receive memory of one role.
pub struct BufferPool {
    mode: CacheMode,
    alignment: usize,
    offsets: BufferOffsets,
    pool_bytes: usize,
    recv: Region,
    /// Distinct send region; `None` in cached mode where `recv` serves both.
    send: Option<Region>,
    send_cursor: Cursor,
    recv_cursor: Cursor,
}

impl BufferPool {
    /// Allocate the regions for `mode`, each large enough for `pool_bytes`
    /// plus the larger offset plus alignment padding, and align them.
    ///
    /// # Errors
    /// Returns `BufferError::AllocationFailed` if either region cannot be
    /// allocated.
    pub fn allocate(
        pool_bytes: usize,
        alignment: usize,
        offsets: BufferOffsets,
        mode: CacheMode,
    ) -> Result<Self, BufferError> {
        let region_bytes = pool_bytes
            .checked_add(offsets.max())
            .and_then(|bytes| bytes.checked_add(alignment))
            .ok_or(BufferError::AllocationFailed {
                bytes: usize::MAX,
                region: "receive",
            })?;

        let mut recv = Region::allocate("receive", region_bytes)?;
        let recv_start = recv.align(alignment);

        let (send, send_start) = match mode {
            CacheMode::Cached => (None, recv_start),
            CacheMode::Uncached => {
                let mut send = Region::allocate("send", region_bytes)?;
                let start = send.align(alignment);
                (Some(send), start)
            }
        };

        Ok(Self {
            mode,
            alignment,
            offsets,
            pool_bytes,
            recv,
            send,
            send_cursor: Cursor::new(send_start + offsets.send),
            recv_cursor: Cursor::new(recv_start + offsets.recv),
        })
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    pub fn pool_bytes(&self) -> usize {
        self.pool_bytes
    }

    pub fn recv_region(&self) -> &Region {
        &self.recv
    }

    /// The send region; aliases the receive region in cached mode.
    pub fn send_region(&self) -> &Region {
        self.send.as_ref().unwrap_or(&self.recv)
    }

    /// Make sure a block of `block` bytes fits at the working positions.
    ///
    /// Uncached pools need room for two blocks so advancing can cycle; they
    /// are reallocated larger when a new size outgrows them. Cached pools
    /// are sized once for the largest message and only checked.
    ///
    /// # Errors
    /// `BlockTooLarge` for a cached pool that cannot hold the block, or
    /// `AllocationFailed` if growing an uncached pool fails.
    pub fn ensure_block(&mut self, block: usize) -> Result<(), BufferError> {
        let needed = match self.mode {
            CacheMode::Cached => block,
            CacheMode::Uncached => block.checked_mul(2).ok_or(BufferError::BlockTooLarge {
                block,
                capacity: self.recv.len(),
                region: self.recv.name(),
            })?,
        };

        let fits = |cursor: &Cursor, region: &Region| {
            cursor
                .home
                .checked_add(needed)
                .is_some_and(|end| end <= region.len())
        };
        if fits(&self.recv_cursor, &self.recv)
            && fits(&self.send_cursor, self.send_region())
        {
            return Ok(());
        }

        if self.mode.is_cached() {
            return Err(BufferError::BlockTooLarge {
                block,
                capacity: self.recv.len(),
                region: self.recv.name(),
            });
        }

        let pool_bytes = self.pool_bytes.saturating_mul(2).max(needed);
        tracing::debug!(
            old_bytes = self.pool_bytes,
            new_bytes = pool_bytes,
            block = block,
            "Growing uncached buffer pool"
        );
        *self = Self::allocate(pool_bytes, self.alignment, self.offsets, self.mode)?;
        Ok(())
    }

    /// Seed buffer contents before a size is measured.
    ///
    /// Cached: the single region rests on `RESTING_FILL` with its trailing
    /// byte set to a role-specific value, so a receiver polling on content
    /// can tell an arrived message from a resting buffer. Uncached: the two
    /// regions start with different fill bytes.
    pub fn init_data(&mut self, role: Role) {
        self.recv.fill(RESTING_FILL);
        match self.send.as_mut() {
            None => {
                if let Some(last) = self.recv.storage.last_mut() {
                    *last = RESTING_FILL + role.tag();
                }
            }
            Some(send) => send.fill(SEND_FILL),
        }
    }

    /// Move both working positions back to the start of their pools.
    pub fn reset_cursors(&mut self) {
        self.send_cursor.reset();
        self.recv_cursor.reset();
    }

    pub fn send_position(&self) -> usize {
        self.send_cursor.pos
    }

    pub fn recv_position(&self) -> usize {
        self.recv_cursor.pos
    }

    pub fn send_block(&self, len: usize) -> &[u8] {
        self.send_region().block(self.send_cursor.pos, len)
    }

    pub fn send_block_mut(&mut self, len: usize) -> &mut [u8] {
        let at = self.send_cursor.pos;
        match self.send.as_mut() {
            Some(send) => send.block_mut(at, len),
            None => self.recv.block_mut(at, len),
        }
    }

    pub fn recv_block(&self, len: usize) -> &[u8] {
        self.recv.block(self.recv_cursor.pos, len)
    }

    pub fn recv_block_mut(&mut self, len: usize) -> &mut [u8] {
        self.recv.block_mut(self.recv_cursor.pos, len)
    }

    pub fn advance_send(&mut self, block: usize) {
        let end = self.send_region().len();
        self.send_cursor.advance(block, end);
    }

    pub fn advance_recv(&mut self, block: usize) {
        let end = self.recv.len();
        self.recv_cursor.advance(block, end);
    }

    /// Release both regions. Deallocation always goes through the original
    /// allocation, never through a working position.
    pub fn release(self) {
        tracing::debug!(
            mode = %self.mode,
            recv_origin = ?self.recv.origin(),
            send_origin = ?self.send.as_ref().map(Region::origin),
            "Releasing buffer pool"
        );
    }
}
