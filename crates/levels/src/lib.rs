//! Pool of per-level arrays, bucketed by height.
//!
//! Every node of a skip list owns a few arrays whose length equals the node's
//! height: one slot per level it participates in. Heights are small (at most a
//! few dozen) and nodes are created and destroyed in large parallel batches,
//! so arrays are recycled through one free list per height instead of going
//! back to the global allocator each time.
//!
//! # Contract
//!
//! - `allocate(height)` returns an array of exactly `height` slots.
//! - `free(block)` returns an array to the bucket for `block.len()`. An
//!   array of a length no bucket serves is dropped.
//! - Both may be called concurrently from any number of threads.
//! - The contents of a recycled array are whatever the previous owner left
//!   there. Callers initialize every slot they read.
//!
//! A pool may be bounded. Once `capacity` arrays are outstanding, further
//! allocations fail with [`PoolError::Exhausted`].
//!
//! ```
//! use levels::LevelPool;
//!
//! let pool: LevelPool<u64> = LevelPool::new(16);
//! let block = pool.allocate(3).unwrap();
//! assert_eq!(block.len(), 3);
//! pool.free(block);
//!
//! // The next array of height 3 comes from the free list.
//! let again = pool.allocate(3).unwrap();
//! assert_eq!(pool.stats().reused, 1);
//! pool.free(again);
//! ```

use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;

/// Error returned when the pool cannot hand out an array.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The pool is bounded and every permitted array is in use.
    #[error("level pool exhausted: {capacity} arrays outstanding, requested height {height}")]
    Exhausted { height: usize, capacity: usize },
    /// The requested height is zero or above the pool's maximum.
    #[error("height {height} outside 1..={max}")]
    HeightOutOfRange { height: usize, max: usize },
}

/// Allocation counters, for tests and tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Arrays currently handed out and not yet freed.
    pub outstanding: usize,
    /// Arrays built from scratch.
    pub fresh: u64,
    /// Arrays served from a free list.
    pub reused: u64,
}

/// A thread-safe pool of `height`-length arrays.
pub struct LevelPool<T> {
    /// `buckets[h]` holds freed arrays of length `h`. Index 0 is unused.
    buckets: Box<[Mutex<Vec<Box<[T]>>>]>,
    capacity: Option<usize>,
    outstanding: AtomicUsize,
    fresh: AtomicU64,
    reused: AtomicU64,
}

impl<T: Default> LevelPool<T> {
    /// Create an unbounded pool for heights `1..=max_height`.
    pub fn new(max_height: usize) -> LevelPool<T> {
        let buckets = (0..=max_height).map(|_| Mutex::new(Vec::new())).collect();
        return LevelPool {
            buckets,
            capacity: None,
            outstanding: AtomicUsize::new(0),
            fresh: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        };
    }

    /// Create a pool that allows at most `capacity` outstanding arrays.
    pub fn bounded(max_height: usize, capacity: usize) -> LevelPool<T> {
        let mut pool = Self::new(max_height);
        pool.capacity = Some(capacity);
        return pool;
    }

    /// Largest height this pool serves.
    pub fn max_height(&self) -> usize {
        return self.buckets.len() - 1;
    }

    /// Outstanding-array limit, if any.
    pub fn capacity(&self) -> Option<usize> {
        return self.capacity;
    }

    /// Hand out an array of exactly `height` slots.
    pub fn allocate(&self, height: usize) -> Result<Box<[T]>, PoolError> {
        if height == 0 || height > self.max_height() {
            return Err(PoolError::HeightOutOfRange {
                height,
                max: self.max_height(),
            });
        }
        self.reserve(height)?;

        if let Some(block) = self.buckets[height].lock().pop() {
            self.reused.fetch_add(1, Ordering::Relaxed);
            return Ok(block);
        }

        self.fresh.fetch_add(1, Ordering::Relaxed);
        let block: Box<[T]> = (0..height).map(|_| T::default()).collect();
        return Ok(block);
    }

    /// Return an array to the bucket matching its length.
    ///
    /// An array no bucket fits is dropped and not counted. The outstanding
    /// count never goes below zero, so freeing arrays from elsewhere cannot
    /// make room past the capacity bound.
    pub fn free(&self, block: Box<[T]>) {
        let height = block.len();
        if height == 0 || height > self.max_height() {
            return;
        }
        self.buckets[height].lock().push(block);
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Snapshot of the allocation counters.
    pub fn stats(&self) -> PoolStats {
        return PoolStats {
            outstanding: self.outstanding.load(Ordering::Acquire),
            fresh: self.fresh.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
        };
    }

    /// Count one more outstanding array, failing if the bound is reached.
    fn reserve(&self, height: usize) -> Result<(), PoolError> {
        let Some(capacity) = self.capacity else {
            self.outstanding.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        };
        return self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n < capacity { Some(n + 1) } else { None }
            })
            .map(|_| ())
            .map_err(|_| PoolError::Exhausted { height, capacity });
    }
}

impl<T> std::fmt::Debug for LevelPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("LevelPool")
            .field("max_height", &(self.buckets.len() - 1))
            .field("capacity", &self.capacity)
            .field("outstanding", &self.outstanding.load(Ordering::Relaxed))
            .finish();
    }
}
