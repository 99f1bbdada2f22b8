//! Batch coordination: deciding who recomputes which ancestors.
//!
//! After a batch of joins or value updates, the augmented values that are
//! stale are those of the touched elements' ancestors: the element itself,
//! its left parent at its top level, that element's left parent, and so on.
//! Touched elements close together share most of these ancestors. Walking up
//! from every element independently would recompute shared towers many times
//! and have several threads write the same values.
//!
//! Each tower's `update_level` is used as a claim:
//!
//! 1. A batch item climbing through a tower tries to swap `update_level` from
//!    `UNSET` to the level it needs recomputed from.
//! 2. The winner keeps climbing. If the tower has no left parent it is a top
//!    node: the root of a subtree that will be recomputed top-down.
//! 3. A loser stops. If it needs a lower level than the winner recorded, it
//!    lowers the claim with `fetch_min`. The winner's walk covers the rest.
//!
//! Every tower is therefore climbed through by exactly one item, and every
//! top node is reported once. Claims are released during the top-down pass,
//! when each tower's highest level has been recomputed.

use std::sync::atomic::Ordering;

use rayon::prelude::*;

use crate::profiling;
use crate::skip_list::SkipList;
use crate::tower::ElemId;
use crate::tower::Idx;
use crate::tower::NULL;
use crate::tower::Tower;
use crate::tower::UNSET;

impl Tower {
    /// Try to become the single owner of this tower's recomputation,
    /// starting at `level`. On failure returns the level already recorded.
    #[inline]
    pub(crate) fn claim(&self, level: u32) -> Result<(), u32> {
        let current = self.update_level.load(Ordering::Acquire);
        if current != UNSET {
            return Err(current);
        }
        return self
            .update_level
            .compare_exchange(UNSET, level, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ());
    }

    /// Lower the recorded level to `level` if it is higher.
    #[inline]
    pub(crate) fn lower_claim(&self, level: u32) {
        self.update_level.fetch_min(level, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn release(&self) {
        self.update_level.store(UNSET, Ordering::Release);
    }

    /// Whether values strictly below `level` still need recomputing.
    #[inline]
    pub(crate) fn pending_below(&self, level: usize) -> bool {
        let claimed = self.update_level.load(Ordering::Acquire);
        return claimed != UNSET && (claimed as usize) < level;
    }

    pub(crate) fn is_unset(&self) -> bool {
        return self.update_level.load(Ordering::Acquire) == UNSET;
    }
}

impl SkipList {
    /// Claim the ancestors of every element and return the top nodes, each
    /// exactly once.
    pub(crate) fn claim_top_nodes(&self, elements: &[ElemId]) -> Vec<Idx> {
        return elements
            .par_iter()
            .filter_map(|&v| self.climb_and_claim(v.0))
            .collect();
    }

    /// Walk up from `start` claiming towers. Returns the top node if this
    /// walk reached one, `None` if it stopped at another item's claim.
    fn climb_and_claim(&self, start: Idx) -> Option<Idx> {
        let mut current = start;
        let mut level: u32 = 0;
        loop {
            let tower = self.tower(current);
            match tower.claim(level) {
                Ok(()) => {
                    profiling::claim_won();
                    let top = tower.height() - 1;
                    let parent = self.left_parent(current, top);
                    if parent == NULL {
                        profiling::top_node();
                        #[cfg(feature = "tracing")]
                        tracing::trace!(top_node = current, height = top + 1, "claimed top node");
                        return Some(current);
                    }
                    current = parent;
                    level = top as u32 + 1;
                }
                Err(claimed) => {
                    profiling::claim_lost();
                    if claimed > level {
                        tower.lower_claim(level);
                        profiling::write_min();
                    }
                    return None;
                }
            }
        }
    }

    /// Whether no tower has a claim outstanding. Every batch operation ends
    /// in this state.
    pub fn coordination_is_clear(&self) -> bool {
        return self.towers.par_iter().all(|tower| tower.is_unset());
    }
}
