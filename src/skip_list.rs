//! Unaugmented batch-parallel skip list.
//!
//! A `SkipList` is an arena of towers, not a single list: it holds any number
//! of disjoint sequences, open or circular, over the same set of elements.
//! Every element starts as its own singleton list. `join` concatenates two
//! lists and `split` cuts one; both touch `O(height)` links and may run
//! concurrently as long as their inputs are disjoint.
//!
//! ```
//! use tandem::{ElemId, SkipList};
//!
//! let list = SkipList::new(&[3, 0, 1, 6]).unwrap();
//! let ids: Vec<ElemId> = list.ids().collect();
//!
//! // Chain all four elements together.
//! list.batch_join(&[(ids[0], ids[1]), (ids[1], ids[2]), (ids[2], ids[3])]);
//! let rep = list.find_representative(ids[0]);
//! assert!(ids.iter().all(|&v| list.find_representative(v) == rep));
//!
//! // Cut after the second element.
//! list.split(ids[1]);
//! assert_ne!(list.find_representative(ids[1]), list.find_representative(ids[2]));
//! ```
//!
//! # Join
//!
//! `join(left, right)` links the two towers at level 0, then climbs: the next
//! level is linked between `left`'s left parent and `right`'s right parent,
//! and so on until either side runs out of taller towers. The successor slot
//! is claimed with a compare-and-swap, so when two concurrent joins climb to
//! the same pair of towers exactly one of them links it and the other stops.
//!
//! # Split
//!
//! `split(v)` cuts `v`'s successor link at level 0, then climbs through `v`'s
//! left parents cutting the link that crosses the same boundary at every
//! level. The same compare-and-swap makes overlapping splits cut each link
//! once.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use levels::LevelPool;
use rayon::prelude::*;

use crate::config::Config;
use crate::error::Error;
use crate::profiling;
use crate::tower::ElemId;
use crate::tower::Idx;
use crate::tower::Link;
use crate::tower::NULL;
use crate::tower::Tower;
use crate::tower::height_for;

/// Arena of skip list elements with index-based links.
pub struct SkipList {
    pub(crate) towers: Vec<Tower>,
    pool: Arc<LevelPool<Link>>,
}

impl SkipList {
    /// Build one singleton element per random integer, with a private
    /// unbounded pool.
    pub fn new(randoms: &[u64]) -> Result<SkipList, Error> {
        return Self::with_config(&Config::default(), randoms);
    }

    /// Build elements with a pool shaped by `config`.
    pub fn with_config(config: &Config, randoms: &[u64]) -> Result<SkipList, Error> {
        config.validate()?;
        return Self::with_pool(config.build_pool(), randoms);
    }

    /// Build elements whose link arrays come from a shared pool.
    pub fn with_pool(pool: Arc<LevelPool<Link>>, randoms: &[u64]) -> Result<SkipList, Error> {
        if randoms.len() >= NULL as usize {
            return Err(Error::TooManyElements(randoms.len()));
        }
        let heights: Vec<usize> = randoms.iter().map(|&r| height_for(r)).collect();
        let links = allocate_all(&pool, &heights)?;
        let towers = links.into_par_iter().map(Tower::new).collect();
        return Ok(SkipList { towers, pool });
    }

    /// Build `len` elements with heights drawn from `rng`.
    #[cfg(feature = "rand")]
    pub fn from_rng<R: rand::RngCore>(len: usize, rng: &mut R) -> Result<SkipList, Error> {
        let randoms: Vec<u64> = (0..len).map(|_| rng.next_u64()).collect();
        return Self::new(&randoms);
    }

    /// Number of elements in the arena (across all lists).
    pub fn len(&self) -> usize {
        return self.towers.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.towers.is_empty();
    }

    /// Every element id, in construction order.
    pub fn ids(&self) -> impl Iterator<Item = ElemId> + '_ {
        return (0..self.towers.len()).map(ElemId::new);
    }

    /// Number of levels `v` participates in.
    pub fn height(&self, v: ElemId) -> usize {
        return self.tower(v.0).height();
    }

    /// The pool link arrays are drawn from.
    pub fn pool(&self) -> &Arc<LevelPool<Link>> {
        return &self.pool;
    }

    // --- Node access helpers ---

    #[inline]
    pub(crate) fn tower(&self, idx: Idx) -> &Tower {
        return &self.towers[idx as usize];
    }

    #[inline]
    pub(crate) fn height_of(&self, idx: Idx) -> usize {
        return self.tower(idx).height();
    }

    #[inline]
    pub(crate) fn next_at(&self, idx: Idx, level: usize) -> Idx {
        return self.tower(idx).next(level);
    }

    #[inline]
    pub(crate) fn prev_at(&self, idx: Idx, level: usize) -> Idx {
        return self.tower(idx).prev(level);
    }

    // --- Structural operations ---

    /// Concatenate the list ending at `left` with the list starting at
    /// `right`.
    ///
    /// `left` must be the last element of its list and `right` the first of
    /// its list. If they are the two ends of the same list, the list becomes
    /// circular. Concurrent joins must use distinct `left`s and distinct
    /// `right`s.
    pub fn join(&self, left: ElemId, right: ElemId) {
        debug_assert_eq!(
            self.next_at(left.0, 0),
            NULL,
            "join: {:?} is not the last element of its list",
            left
        );
        debug_assert_eq!(
            self.prev_at(right.0, 0),
            NULL,
            "join: {:?} is not the first element of its list",
            right
        );

        let mut left = left.0;
        let mut right = right.0;
        let mut level = 0;
        loop {
            let link = &self.tower(left).links[level];
            if link
                .next
                .compare_exchange(NULL, right, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                // Another join already linked this level.
                return;
            }
            self.tower(right).links[level].prev.store(left, Ordering::SeqCst);
            profiling::link_spliced();

            left = self.left_parent(left, level);
            right = self.right_parent(right, level);
            if left == NULL || right == NULL {
                return;
            }
            level += 1;
        }
    }

    /// Cut `v`'s list immediately after `v`.
    ///
    /// An open list becomes two lists; a circular list becomes one open list
    /// ending at `v`. Splitting an element that is already a list tail does
    /// nothing.
    pub fn split(&self, v: ElemId) {
        let mut current = v.0;
        let mut level = 0;
        loop {
            let link = &self.tower(current).links[level];
            let successor = link.next.load(Ordering::SeqCst);
            if successor == NULL
                || link
                    .next
                    .compare_exchange(successor, NULL, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
            {
                return;
            }
            self.tower(successor).links[level].prev.store(NULL, Ordering::SeqCst);
            profiling::link_cut();

            current = self.left_parent(current, level);
            if current == NULL {
                return;
            }
            level += 1;
        }
    }

    /// Apply every join in parallel.
    ///
    /// Each `left` must be unique within the batch, and so must each `right`.
    pub fn batch_join(&self, joins: &[(ElemId, ElemId)]) {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("batch_join", len = joins.len()).entered();

        joins.par_iter().for_each(|&(left, right)| self.join(left, right));
    }

    /// Apply every split in parallel. Duplicates are harmless.
    pub fn batch_split(&self, splits: &[ElemId]) {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("batch_split", len = splits.len()).entered();

        splits.par_iter().for_each(|&v| self.split(v));
    }
}

impl Drop for SkipList {
    fn drop(&mut self) {
        for tower in self.towers.drain(..) {
            self.pool.free(tower.into_links());
        }
    }
}

impl std::fmt::Debug for SkipList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("SkipList")
            .field("len", &self.towers.len())
            .field("pool", &self.pool)
            .finish();
    }
}

/// Allocate one array per height, all or nothing.
pub(crate) fn allocate_all<T: Default + Send>(
    pool: &LevelPool<T>,
    heights: &[usize],
) -> Result<Vec<Box<[T]>>, Error> {
    let results: Vec<_> = heights.par_iter().map(|&h| pool.allocate(h)).collect();

    let mut blocks = Vec::with_capacity(results.len());
    let mut first_error = None;
    for result in results {
        match result {
            Ok(block) => blocks.push(block),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    let Some(err) = first_error else {
        return Ok(blocks);
    };
    for block in blocks {
        pool.free(block);
    }
    return Err(err.into());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tower::randoms_for;

    fn chain(list: &SkipList) {
        for i in 0..list.len() - 1 {
            list.join(ElemId::new(i), ElemId::new(i + 1));
        }
    }

    #[cfg(feature = "rand")]
    #[test]
    fn from_rng_draws_halving_heights() {
        use rand::SeedableRng;

        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let list = SkipList::from_rng(4096, &mut rng).unwrap();
        assert_eq!(list.len(), 4096);

        let mut counts = [0usize; crate::tower::MAX_HEIGHT + 1];
        for v in list.ids() {
            counts[list.height(v)] += 1;
        }
        assert!((1800..2300).contains(&counts[1]), "height 1: {}", counts[1]);
        assert!((850..1200).contains(&counts[2]), "height 2: {}", counts[2]);
        assert!(counts[1] > counts[2] && counts[2] > counts[3]);
        for v in list.ids() {
            assert_eq!(list.next(v), None);
        }
    }

    #[cfg(feature = "rand")]
    #[test]
    fn from_rng_of_nothing_is_empty() {
        use rand::SeedableRng;

        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let list = SkipList::from_rng(0, &mut rng).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn new_elements_are_singletons() {
        let list = SkipList::new(&randoms_for(&[1, 3, 2])).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.height(ElemId::new(1)), 3);
        for v in list.ids() {
            assert_eq!(list.next(v), None);
            assert_eq!(list.prev(v), None);
            assert_eq!(list.find_representative(v), v);
        }
    }

    #[test]
    fn join_links_every_shared_level() {
        //   level 2: 1 ------------> 4
        //   level 1: 1 ------> 3 --> 4
        //   level 0: 0 -> 1 -> 2 -> 3 -> 4
        let list = SkipList::new(&randoms_for(&[1, 3, 1, 2, 3])).unwrap();
        chain(&list);

        assert_eq!(list.next_at(0, 0), 1);
        assert_eq!(list.next_at(1, 1), 3);
        assert_eq!(list.next_at(3, 1), 4);
        assert_eq!(list.next_at(1, 2), 4);
        assert_eq!(list.prev_at(4, 2), 1);
        assert_eq!(list.prev_at(3, 1), 1);
        assert_eq!(list.next_at(4, 2), NULL);
    }

    #[test]
    fn join_into_cycle() {
        let list = SkipList::new(&randoms_for(&[2, 1, 3, 1])).unwrap();
        chain(&list);
        list.join(ElemId::new(3), ElemId::new(0));

        assert_eq!(list.next_at(3, 0), 0);
        assert_eq!(list.prev_at(0, 0), 3);
        // Level 1 wraps between the two towers of height >= 2.
        assert_eq!(list.next_at(2, 1), 0);
        assert_eq!(list.next_at(0, 1), 2);
        // The tallest tower links to itself at the top.
        assert_eq!(list.next_at(2, 2), 2);
        assert_eq!(list.prev_at(2, 2), 2);
    }

    #[test]
    fn single_element_cycle() {
        let list = SkipList::new(&randoms_for(&[2])).unwrap();
        let v = ElemId::new(0);
        list.join(v, v);
        assert_eq!(list.next(v), Some(v));
        assert_eq!(list.prev(v), Some(v));
        assert_eq!(list.find_representative(v), v);

        list.split(v);
        assert_eq!(list.next(v), None);
        assert_eq!(list.next_at(0, 1), NULL);
    }

    #[test]
    fn split_cuts_every_crossing_level() {
        let list = SkipList::new(&randoms_for(&[3, 1, 2, 1, 3])).unwrap();
        chain(&list);
        list.split(ElemId::new(2));

        assert_eq!(list.next_at(2, 0), NULL);
        assert_eq!(list.prev_at(3, 0), NULL);
        assert_eq!(list.next_at(2, 1), NULL);
        assert_eq!(list.next_at(0, 2), NULL);
        assert_eq!(list.prev_at(4, 2), NULL);
        // Links inside the left half survive.
        assert_eq!(list.next_at(0, 1), 2);
    }

    #[test]
    fn split_tail_is_noop() {
        let list = SkipList::new(&randoms_for(&[1, 2])).unwrap();
        chain(&list);
        list.split(ElemId::new(1));
        assert_eq!(list.next(ElemId::new(0)), Some(ElemId::new(1)));
    }

    #[test]
    fn batch_join_then_batch_split() {
        let heights: Vec<usize> = (0..200).map(|i| (i * 7 % 5) + 1).collect();
        let list = SkipList::new(&randoms_for(&heights)).unwrap();
        let joins: Vec<_> = (0..199).map(|i| (ElemId::new(i), ElemId::new(i + 1))).collect();
        list.batch_join(&joins);

        let rep = list.find_representative(ElemId::new(0));
        assert!(list.ids().all(|v| list.find_representative(v) == rep));

        let splits: Vec<_> = (0..199).step_by(10).map(ElemId::new).collect();
        list.batch_split(&splits);
        // Lists are {0}, {1..=10}, {11..=20}, ..., {191..=199}.
        for i in 0..200 {
            let last = ((i + 9) / 10 * 10).min(199);
            let expected = list.find_representative(ElemId::new(last));
            assert_eq!(list.find_representative(ElemId::new(i)), expected);
        }
    }

    #[test]
    fn drop_returns_arrays() {
        let pool: Arc<LevelPool<Link>> = Config::default().build_pool();
        {
            let list = SkipList::with_pool(Arc::clone(&pool), &[0, 1, 3, 7]).unwrap();
            chain(&list);
            assert_eq!(pool.stats().outstanding, 4);
        }
        assert_eq!(pool.stats().outstanding, 0);

        let again = SkipList::with_pool(Arc::clone(&pool), &[0, 1]).unwrap();
        assert_eq!(pool.stats().reused, 2);
        // Recycled arrays come back clean.
        assert_eq!(again.next(ElemId::new(1)), None);
    }

    #[test]
    fn exhausted_pool_fails_cleanly() {
        let config = Config::default().with_pool_capacity(3);
        let pool: Arc<LevelPool<Link>> = config.build_pool();
        let err = SkipList::with_pool(Arc::clone(&pool), &[0; 5]).unwrap_err();
        assert!(matches!(err, Error::Pool(levels::PoolError::Exhausted { .. })));
        assert_eq!(pool.stats().outstanding, 0);
    }
}
