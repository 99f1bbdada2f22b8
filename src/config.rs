//! Tuning knobs shared by both skip list kinds.

use std::sync::Arc;

use levels::LevelPool;

use crate::error::Error;
use crate::tower::MAX_HEIGHT;

/// Default level at or below which augmented values are recomputed without
/// forking. Forking a task costs more than summing a short run at the bottom
/// of the tower.
pub const DEFAULT_SEQUENTIAL_CUTOVER: usize = 6;

/// Construction-time configuration.
///
/// ```
/// use tandem::Config;
///
/// let config = Config::default()
///     .with_sequential_cutover(4)
///     .with_pool_capacity(1 << 20);
/// assert_eq!(config.sequential_cutover(), 4);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    sequential_cutover: usize,
    pool_capacity: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        return Config {
            sequential_cutover: DEFAULT_SEQUENTIAL_CUTOVER,
            pool_capacity: None,
        };
    }
}

impl Config {
    /// Levels `<= cutover` are maintained sequentially; higher levels fork
    /// one task per child with pending work.
    pub fn with_sequential_cutover(mut self, cutover: usize) -> Config {
        self.sequential_cutover = cutover;
        return self;
    }

    /// Bound the number of outstanding per-level arrays in each pool built
    /// from this configuration.
    pub fn with_pool_capacity(mut self, capacity: usize) -> Config {
        self.pool_capacity = Some(capacity);
        return self;
    }

    pub fn sequential_cutover(&self) -> usize {
        return self.sequential_cutover;
    }

    pub fn pool_capacity(&self) -> Option<usize> {
        return self.pool_capacity;
    }

    /// Reject configurations that could never build a list.
    pub fn validate(&self) -> Result<(), Error> {
        if self.pool_capacity == Some(0) {
            return Err(Error::InvalidConfig("pool capacity must be positive"));
        }
        return Ok(());
    }

    /// Build a pool sized for towers, honoring the capacity bound.
    pub fn build_pool<T: Default>(&self) -> Arc<LevelPool<T>> {
        let pool = match self.pool_capacity {
            Some(capacity) => LevelPool::bounded(MAX_HEIGHT, capacity),
            None => LevelPool::new(MAX_HEIGHT),
        };
        return Arc::new(pool);
    }
}
