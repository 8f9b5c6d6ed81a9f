//! Tiered pool of reusable byte buffers.
//!
//! A capture session creates one [`BufferPool`] and shares it through an `Arc` with every
//! pipe it opens. Buffers are grouped by capacity into 5 KiB, 2 KiB, 1 KiB and small
//! tiers. A request is served from its own tier or any larger one; when none holds a
//! big enough buffer a fresh one is allocated. Buffers that grew past
//! [`MAX_POOLED_CAPACITY`] are freed on return instead of being kept.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::BytesMut;
use tracing::{debug, trace};

const TIER_SIZES: [usize; 3] = [5 * 1024, 2 * 1024, 1024];

/// Capacity of a buffer allocated for the small tier.
pub const DEFAULT_BUFFER_SIZE: usize = 512;

/// Maximum number of idle buffers kept per tier.
pub const MAX_IDLE_PER_TIER: usize = 64;

/// Returned buffers with a larger capacity are dropped.
pub const MAX_POOLED_CAPACITY: usize = 64 * 1024;

/// Buffers taken, returned and allocated over the life of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub gets: u64,
    pub puts: u64,
    pub allocations: u64,
}

#[derive(Debug, Default)]
pub struct BufferPool {
    // index 0..3 follow TIER_SIZES, index 3 is the small tier
    tiers: [Mutex<Vec<BytesMut>>; 4],
    gets: AtomicU64,
    puts: AtomicU64,
    allocations: AtomicU64,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a cleared buffer with at least `size` bytes of capacity.
    pub fn get(&self, size: usize) -> BytesMut {
        self.gets.fetch_add(1, Ordering::Relaxed);

        let tier = tier_of(size);
        // own tier first, then the larger ones
        let reused = (0..=tier).rev().find_map(|candidate| {
            let mut idle = self.lock_tier(candidate)?;
            let position = idle.iter().rposition(|buf| buf.capacity() >= size)?;
            Some((candidate, idle.swap_remove(position)))
        });

        if let Some((from_tier, buf)) = reused {
            trace!(size, tier, from_tier, "reuse pooled buffer");
            return buf;
        }

        self.allocations.fetch_add(1, Ordering::Relaxed);
        BytesMut::with_capacity(size.max(tier_capacity(tier)))
    }

    /// Returns a buffer to the tier matching its capacity.
    ///
    /// Buffers above [`MAX_POOLED_CAPACITY`] and buffers beyond [`MAX_IDLE_PER_TIER`] are
    /// dropped; they still count as returned.
    pub fn put(&self, mut buf: BytesMut) {
        if buf.capacity() == 0 {
            return;
        }
        self.puts.fetch_add(1, Ordering::Relaxed);

        if buf.capacity() > MAX_POOLED_CAPACITY {
            trace!(capacity = buf.capacity(), "drop oversized buffer");
            return;
        }

        buf.clear();
        let tier = tier_of(buf.capacity());
        if let Some(mut idle) = self.lock_tier(tier)
            && idle.len() < MAX_IDLE_PER_TIER
        {
            idle.push(buf);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            gets: self.gets.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
        }
    }

    /// Number of idle buffers currently held.
    pub fn idle(&self) -> usize {
        (0..self.tiers.len()).filter_map(|tier| self.lock_tier(tier)).map(|idle| idle.len()).sum()
    }

    /// Frees every idle buffer. Called when a capture session ends.
    pub fn drain(&self) {
        let mut freed = 0;
        for tier in 0..self.tiers.len() {
            if let Some(mut idle) = self.lock_tier(tier) {
                freed += idle.len();
                idle.clear();
            }
        }
        debug!(freed, stats = ?self.stats(), "drained buffer pool");
    }

    // a poisoned tier is treated as empty, the caller allocates instead
    fn lock_tier(&self, tier: usize) -> Option<std::sync::MutexGuard<'_, Vec<BytesMut>>> {
        self.tiers[tier].lock().ok()
    }
}

fn tier_of(size: usize) -> usize {
    TIER_SIZES.iter().position(|tier_size| size >= *tier_size).unwrap_or(TIER_SIZES.len())
}

fn tier_capacity(tier: usize) -> usize {
    TIER_SIZES.get(tier).copied().unwrap_or(DEFAULT_BUFFER_SIZE)
}
