//! Augmented batch-parallel skip list.
//!
//! Every element carries a value (1 unless changed with `batch_update`) and
//! every tower caches, per level, the sum over the run of elements it spans:
//!
//! - `values[0]` is the element's own value.
//! - `values[level]` is the sum of `values[level - 1]` over this element and
//!   its successors at `level - 1`, up to but excluding the next element
//!   whose tower is taller than `level`.
//!
//! ```text
//! Level 2: A [5] ---------------------------------> F
//! Level 1: A [2] ------> C [3] ------------------> F [1]
//! Level 0: A [1] -> B [1] -> C [1] -> D [1] -> E [1] -> F [1]
//! ```
//!
//! With every value 1, `get_sum` is the length of an element's list.
//!
//! Mutations come in batches. A batch first applies its structural changes
//! in parallel, then repairs the cached sums: the coordination pass finds the
//! towers whose sums are stale and the top nodes above them, and the
//! maintenance pass recomputes each top node's subtree, forking below the
//! configured cutover level.
//!
//! ```
//! use tandem::{AugmentedSkipList, ElemId};
//!
//! let list = AugmentedSkipList::new(&[0, 1, 3, 0, 7]).unwrap();
//! let joins: Vec<_> = (0..4).map(|i| (ElemId::new(i), ElemId::new(i + 1))).collect();
//! list.batch_join(&joins);
//! assert_eq!(list.get_sum(ElemId::new(2)), 5);
//!
//! list.batch_split(&[ElemId::new(1)]);
//! assert_eq!(list.get_sum(ElemId::new(0)), 2);
//! assert_eq!(list.get_sum(ElemId::new(4)), 3);
//!
//! list.batch_update(&[ElemId::new(3)], Some(&[10]));
//! assert_eq!(list.get_sum(ElemId::new(4)), 12);
//! ```

use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use levels::LevelPool;
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::config::Config;
use crate::error::Error;
use crate::profiling;
use crate::skip_list::SkipList;
use crate::skip_list::allocate_all;
use crate::tower::ElemId;
use crate::tower::Idx;
use crate::tower::Link;
use crate::tower::NULL;

/// Value every element starts with.
pub const UNIT_VALUE: i64 = 1;

/// Skip list whose towers cache per-level sums of element values.
pub struct AugmentedSkipList {
    pub(crate) list: SkipList,
    /// `values[i][level]`, one array per element, same length as its tower.
    pub(crate) values: Vec<Box<[AtomicI64]>>,
    value_pool: Arc<LevelPool<AtomicI64>>,
    sequential_cutover: usize,
}

impl AugmentedSkipList {
    /// Build one singleton element per random integer, with private pools.
    pub fn new(randoms: &[u64]) -> Result<AugmentedSkipList, Error> {
        return Self::with_config(&Config::default(), randoms);
    }

    pub fn with_config(config: &Config, randoms: &[u64]) -> Result<AugmentedSkipList, Error> {
        config.validate()?;
        return Self::with_pools(config, config.build_pool(), config.build_pool(), randoms);
    }

    /// Build elements whose link and value arrays come from shared pools.
    pub fn with_pools(
        config: &Config,
        link_pool: Arc<LevelPool<Link>>,
        value_pool: Arc<LevelPool<AtomicI64>>,
        randoms: &[u64],
    ) -> Result<AugmentedSkipList, Error> {
        config.validate()?;
        let list = SkipList::with_pool(link_pool, randoms)?;
        let heights: Vec<usize> = list.towers.iter().map(|t| t.height()).collect();
        // On failure `list` drops here and returns its link arrays.
        let mut values = allocate_all(&value_pool, &heights)?;
        values.par_iter_mut().for_each(|block| {
            for slot in block.iter() {
                slot.store(UNIT_VALUE, Ordering::Relaxed);
            }
        });
        return Ok(AugmentedSkipList {
            list,
            values,
            value_pool,
            sequential_cutover: config.sequential_cutover(),
        });
    }

    #[cfg(feature = "rand")]
    pub fn from_rng<R: rand::RngCore>(len: usize, rng: &mut R) -> Result<AugmentedSkipList, Error> {
        let randoms: Vec<u64> = (0..len).map(|_| rng.next_u64()).collect();
        return Self::new(&randoms);
    }

    /// The underlying unaugmented structure.
    ///
    /// Use it for walks and checks. Its `join`, `split`, `batch_join` and
    /// `batch_split` relink towers without touching the cached sums, so any
    /// call to them through this reference leaves `get_sum` and
    /// `get_subsequence_sum` wrong until every affected span is recomputed.
    /// Mutate through the methods on `AugmentedSkipList` instead.
    pub fn skip_list(&self) -> &SkipList {
        return &self.list;
    }

    pub fn len(&self) -> usize {
        return self.list.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.list.is_empty();
    }

    pub fn ids(&self) -> impl Iterator<Item = ElemId> + '_ {
        return self.list.ids();
    }

    pub fn height(&self, v: ElemId) -> usize {
        return self.list.height(v);
    }

    pub fn find_representative(&self, v: ElemId) -> ElemId {
        return self.list.find_representative(v);
    }

    pub fn next(&self, v: ElemId) -> Option<ElemId> {
        return self.list.next(v);
    }

    pub fn prev(&self, v: ElemId) -> Option<ElemId> {
        return self.list.prev(v);
    }

    /// The element's own value.
    pub fn value(&self, v: ElemId) -> i64 {
        return self.value_at(v.0, 0);
    }

    /// Whether every claim taken by past batches has been released.
    pub fn coordination_is_clear(&self) -> bool {
        return self.list.coordination_is_clear();
    }

    // --- Value access helpers ---

    #[inline]
    pub(crate) fn value_at(&self, idx: Idx, level: usize) -> i64 {
        return self.values[idx as usize][level].load(Ordering::Relaxed);
    }

    #[inline]
    fn set_value_at(&self, idx: Idx, level: usize, value: i64) {
        self.values[idx as usize][level].store(value, Ordering::Relaxed);
    }

    // --- Batch mutations ---

    /// For each `(left, right)`, concatenate `left`'s list with `right`'s.
    ///
    /// Each `left` must be the last element of its list and unique within the
    /// batch; each `right` must be the first element of its list and unique
    /// within the batch.
    pub fn batch_join(&self, joins: &[(ElemId, ElemId)]) {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("augmented_batch_join", len = joins.len()).entered();

        let lefts: Vec<ElemId> = joins
            .par_iter()
            .map(|&(left, right)| {
                self.list.join(left, right);
                return left;
            })
            .collect();

        // Only sums spanning the new links are stale, and those belong to
        // ancestors of the left endpoints.
        self.batch_update(&lefts, None);
    }

    /// For each `v`, split `v`'s list right after `v`.
    pub fn batch_split(&self, splits: &[ElemId]) {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("augmented_batch_split", len = splits.len()).entered();

        splits.par_iter().for_each(|&v| self.list.split(v));

        // Every split element is now a list tail, so its ancestors are the
        // towers on its rightmost path and their sums run to the end of the
        // list. Walk that path once per distinct element.
        splits.par_iter().for_each(|&v| {
            if self.list.tower(v.0).claim(0).is_ok() {
                profiling::claim_won();
                self.resum_rightmost_path(v.0);
            } else {
                profiling::claim_lost();
            }
        });

        splits.par_iter().for_each(|&v| self.list.tower(v.0).release());
    }

    /// Assign `new_values[i]` to `elements[i]` and repair every sum above
    /// them.
    ///
    /// With `new_values == None` only the repair runs. That is how joins
    /// bring sums up to date after the structure changed under them.
    ///
    /// # Panics
    ///
    /// If `new_values` is given with a length different from `elements`.
    pub fn batch_update(&self, elements: &[ElemId], new_values: Option<&[i64]>) {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "batch_update",
            len = elements.len(),
            assign = new_values.is_some()
        )
        .entered();

        if let Some(new_values) = new_values {
            assert_eq!(
                elements.len(),
                new_values.len(),
                "batch_update: {} elements but {} values",
                elements.len(),
                new_values.len()
            );
            elements
                .par_iter()
                .zip(new_values.par_iter())
                .for_each(|(&v, &value)| self.set_value_at(v.0, 0, value));
        }

        let top_nodes = self.list.claim_top_nodes(elements);
        top_nodes
            .par_iter()
            .for_each(|&top| self.update_top_down(top, self.list.height_of(top) - 1));

        debug_assert!(
            elements.iter().all(|&v| self.list.tower(v.0).is_unset()),
            "batch_update left a claim behind"
        );
    }

    /// Join as a batch of one.
    pub fn join(&self, left: ElemId, right: ElemId) {
        self.batch_join(&[(left, right)]);
    }

    /// Split as a batch of one.
    pub fn split(&self, v: ElemId) {
        self.batch_split(&[v]);
    }

    /// Update as a batch of one.
    pub fn update(&self, v: ElemId, value: i64) {
        self.batch_update(&[v], Some(&[value]));
    }

    // --- Maintenance ---

    /// Recompute sums along the path from a fresh list tail up through its
    /// left ancestors, carrying the running total from the tail leftwards.
    fn resum_rightmost_path(&self, tail: Idx) {
        let mut current = tail;
        let mut level = 0;
        let mut sum = self.value_at(tail, 0);
        loop {
            if level + 1 < self.list.height_of(current) {
                level += 1;
                self.set_value_at(current, level, sum);
            } else {
                current = self.list.prev_at(current, level);
                if current == NULL {
                    return;
                }
                sum += self.value_at(current, level);
            }
        }
    }

    /// Recompute `values[1..=level]` of `node`'s subtree, descending into
    /// every tower whose claim says it has stale levels. Releases each
    /// tower's claim once its top level is recomputed.
    pub(crate) fn update_top_down(&self, node: Idx, level: usize) {
        if level <= self.sequential_cutover {
            self.update_top_down_sequential(node, level);
            return;
        }

        // Children are the towers in this node's run at `level - 1`,
        // starting with the node itself.
        let mut stale: SmallVec<[Idx; 8]> = SmallVec::new();
        let mut current = node;
        loop {
            if self.list.tower(current).pending_below(level) {
                stale.push(current);
            }
            current = self.list.next_at(current, level - 1);
            if current == NULL || self.list.height_of(current) > level {
                break;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(node, level, children = stale.len(), "forking update");

        rayon::scope(|s| {
            for &child in stale.iter() {
                profiling::fork();
                s.spawn(move |_| self.update_top_down(child, level - 1));
            }
        });

        self.resum_level(node, level);
    }

    fn update_top_down_sequential(&self, node: Idx, level: usize) {
        if level == 0 {
            if self.list.height_of(node) == 1 {
                self.list.tower(node).release();
            }
            return;
        }

        if self.list.tower(node).pending_below(level) {
            self.update_top_down_sequential(node, level - 1);
        }
        let mut sum = self.value_at(node, level - 1);
        let mut current = self.list.next_at(node, level - 1);
        while current != NULL && self.list.height_of(current) <= level {
            if self.list.tower(current).pending_below(level) {
                self.update_top_down_sequential(current, level - 1);
            }
            sum += self.value_at(current, level - 1);
            current = self.list.next_at(current, level - 1);
        }
        self.set_value_at(node, level, sum);

        if self.list.height_of(node) == level + 1 {
            self.list.tower(node).release();
        }
    }

    /// Set `values[level]` of `node` from its run at `level - 1`, whose
    /// values are already current.
    fn resum_level(&self, node: Idx, level: usize) {
        let mut sum = self.value_at(node, level - 1);
        let mut current = self.list.next_at(node, level - 1);
        while current != NULL && self.list.height_of(current) <= level {
            sum += self.value_at(current, level - 1);
            current = self.list.next_at(current, level - 1);
        }
        self.set_value_at(node, level, sum);

        if self.list.height_of(node) == level + 1 {
            self.list.tower(node).release();
        }
    }
}

impl Drop for AugmentedSkipList {
    fn drop(&mut self) {
        for block in self.values.drain(..) {
            self.value_pool.free(block);
        }
    }
}

impl std::fmt::Debug for AugmentedSkipList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("AugmentedSkipList")
            .field("list", &self.list)
            .field("value_pool", &self.value_pool)
            .field("sequential_cutover", &self.sequential_cutover)
            .finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tower::randoms_for;

    fn chain_joins(len: usize) -> Vec<(ElemId, ElemId)> {
        return (0..len - 1).map(|i| (ElemId::new(i), ElemId::new(i + 1))).collect();
    }

    fn values_of(list: &AugmentedSkipList, idx: usize) -> Vec<i64> {
        return list.values[idx].iter().map(|v| v.load(Ordering::Relaxed)).collect();
    }

    #[cfg(feature = "rand")]
    #[test]
    fn from_rng_builds_unit_singletons() {
        use rand::SeedableRng;

        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let list = AugmentedSkipList::from_rng(2048, &mut rng).unwrap();
        assert_eq!(list.len(), 2048);

        let short = list.ids().filter(|&v| list.height(v) == 1).count();
        assert!((850..1200).contains(&short), "height 1: {}", short);
        for v in list.ids() {
            assert_eq!(list.get_sum(v), 1);
            assert_eq!(values_of(&list, v.index()), vec![UNIT_VALUE; list.height(v)]);
        }

        let joins = chain_joins(list.len());
        list.batch_join(&joins);
        assert_eq!(list.get_sum(ElemId::new(0)), 2048);
    }

    #[test]
    fn singletons_sum_to_one() {
        let list = AugmentedSkipList::new(&randoms_for(&[1, 4, 2])).unwrap();
        for v in list.ids() {
            assert_eq!(list.value(v), UNIT_VALUE);
            assert_eq!(list.get_sum(v), 1);
        }
        assert_eq!(values_of(&list, 1), vec![1, 1, 1, 1]);
    }

    #[test]
    fn join_sets_span_sums() {
        //   level 2: 0 [5] ----------------------------->
        //   level 1: 0 [2] ------> 2 [3] --------------->
        //   level 0: 0 -> 1 -> 2 -> 3 -> 4
        let list = AugmentedSkipList::new(&randoms_for(&[3, 1, 2, 1, 1])).unwrap();
        list.batch_join(&chain_joins(5));

        assert_eq!(values_of(&list, 0), vec![1, 2, 5]);
        assert_eq!(values_of(&list, 2), vec![1, 3]);
        assert!(list.coordination_is_clear());
    }

    #[test]
    fn split_truncates_spans() {
        let list = AugmentedSkipList::new(&randoms_for(&[3, 1, 2, 1, 1])).unwrap();
        list.batch_join(&chain_joins(5));
        list.batch_split(&[ElemId::new(2)]);

        assert_eq!(values_of(&list, 0), vec![1, 2, 3]);
        assert_eq!(values_of(&list, 2), vec![1, 1]);
        assert_eq!(list.get_sum(ElemId::new(0)), 3);
        assert_eq!(list.get_sum(ElemId::new(4)), 2);
        assert!(list.coordination_is_clear());
    }

    #[test]
    fn duplicate_splits_walk_once() {
        let list = AugmentedSkipList::new(&randoms_for(&[2, 1, 3, 1, 2, 1])).unwrap();
        list.batch_join(&chain_joins(6));
        list.batch_split(&[ElemId::new(3), ElemId::new(3), ElemId::new(3)]);
        assert_eq!(list.get_sum(ElemId::new(0)), 4);
        assert_eq!(list.get_sum(ElemId::new(5)), 2);
        assert!(list.coordination_is_clear());
    }

    #[test]
    fn update_changes_sums() {
        let list = AugmentedSkipList::new(&randoms_for(&[2, 1, 3, 1])).unwrap();
        list.batch_join(&chain_joins(4));
        list.batch_update(&[ElemId::new(1), ElemId::new(3)], Some(&[5, -2]));

        assert_eq!(list.value(ElemId::new(1)), 5);
        assert_eq!(list.get_sum(ElemId::new(0)), 1 + 5 + 1 - 2);
        assert!(list.coordination_is_clear());
    }

    #[test]
    #[should_panic(expected = "batch_update")]
    fn update_length_mismatch_panics() {
        let list = AugmentedSkipList::new(&randoms_for(&[1, 1])).unwrap();
        list.batch_update(&[ElemId::new(0), ElemId::new(1)], Some(&[3]));
    }

    #[test]
    fn parallel_path_matches_sequential() {
        // A zero cutover forces forking at every level above 0.
        let heights: Vec<usize> = (0..300).map(|i| (i * 13 % 7) + 1).collect();
        let randoms = randoms_for(&heights);
        let forked = AugmentedSkipList::with_config(
            &Config::default().with_sequential_cutover(0),
            &randoms,
        )
        .unwrap();
        let sequential = AugmentedSkipList::with_config(
            &Config::default().with_sequential_cutover(usize::MAX),
            &randoms,
        )
        .unwrap();

        forked.batch_join(&chain_joins(300));
        sequential.batch_join(&chain_joins(300));
        for i in 0..300 {
            assert_eq!(values_of(&forked, i), values_of(&sequential, i), "tower {}", i);
        }
        assert_eq!(forked.get_sum(ElemId::new(150)), 300);
        assert!(forked.coordination_is_clear());
    }

    #[test]
    fn single_item_wrappers() {
        let list = AugmentedSkipList::new(&randoms_for(&[2, 1, 1])).unwrap();
        list.join(ElemId::new(0), ElemId::new(1));
        list.join(ElemId::new(1), ElemId::new(2));
        assert_eq!(list.get_sum(ElemId::new(2)), 3);

        list.update(ElemId::new(2), 4);
        assert_eq!(list.get_sum(ElemId::new(0)), 6);

        list.split(ElemId::new(0));
        assert_eq!(list.get_sum(ElemId::new(0)), 1);
        assert_eq!(list.get_sum(ElemId::new(1)), 5);
    }

    #[test]
    fn drop_returns_value_arrays() {
        let config = Config::default();
        let links: Arc<LevelPool<Link>> = config.build_pool();
        let values: Arc<LevelPool<AtomicI64>> = config.build_pool();
        {
            let list = AugmentedSkipList::with_pools(
                &config,
                Arc::clone(&links),
                Arc::clone(&values),
                &[0, 3, 1],
            )
            .unwrap();
            list.batch_join(&chain_joins(3));
            assert_eq!(values.stats().outstanding, 3);
        }
        assert_eq!(values.stats().outstanding, 0);
        assert_eq!(links.stats().outstanding, 0);
    }

    #[test]
    fn value_pool_exhaustion_releases_links() {
        let config = Config::default();
        let links: Arc<LevelPool<Link>> = config.build_pool();
        let values: Arc<LevelPool<AtomicI64>> = Arc::new(LevelPool::bounded(crate::MAX_HEIGHT, 2));
        let err = AugmentedSkipList::with_pools(&config, Arc::clone(&links), values, &[0; 4]).unwrap_err();
        assert!(matches!(err, Error::Pool(_)));
        assert_eq!(links.stats().outstanding, 0);
    }
}
