//! Read-only walks over a `SkipList`.
//!
//! None of these write to the structure, so any number of them may run in
//! parallel with each other. They must not overlap a batch that mutates the
//! same list.

use crate::skip_list::SkipList;
use crate::tower::ElemId;
use crate::tower::Idx;
use crate::tower::NULL;

impl SkipList {
    /// Level-0 successor of `v`, or `None` at the open end of a list.
    pub fn next(&self, v: ElemId) -> Option<ElemId> {
        return ElemId::from_raw(self.next_at(v.0, 0));
    }

    /// Level-0 predecessor of `v`, or `None` at the open start of a list.
    pub fn prev(&self, v: ElemId) -> Option<ElemId> {
        return ElemId::from_raw(self.prev_at(v.0, 0));
    }

    /// Nearest element at or before `v` that continues upward from `level`
    /// to `level + 1`, i.e. whose height exceeds `level + 1`.
    ///
    /// The walk follows `prev` links at `level`, so `v` must participate in
    /// `level`. Returns `None` when the walk falls off the start of an open
    /// list or comes back around a circular one.
    pub fn find_left_parent(&self, v: ElemId, level: usize) -> Option<ElemId> {
        return ElemId::from_raw(self.left_parent(v.0, level));
    }

    /// Mirror of `find_left_parent`, walking `next` links.
    pub fn find_right_parent(&self, v: ElemId, level: usize) -> Option<ElemId> {
        return ElemId::from_raw(self.right_parent(v.0, level));
    }

    /// Canonical element of `v`'s list.
    ///
    /// Two elements are in the same list iff their representatives are equal.
    /// For an open list this is the leftmost of the tallest towers. For a
    /// circular list it is the lowest-numbered tower on the top level.
    pub fn find_representative(&self, v: ElemId) -> ElemId {
        let mut current = v.0;
        let mut level = self.height_of(current) - 1;
        // Lowest id seen since reaching the current level. Coming back to it
        // means the level is a full cycle.
        let mut lowest: Idx = NULL;

        // Climb while walking right.
        loop {
            let next = self.next_at(current, level);
            if next == NULL {
                break;
            }
            lowest = lowest.min(current);
            current = next;

            let top = self.height_of(current) - 1;
            if top > level {
                level = top;
                lowest = NULL;
            } else if current == lowest {
                return ElemId(current);
            }
        }

        // The list is open. Climb while walking left to the first tallest
        // tower.
        loop {
            let prev = self.prev_at(current, level);
            if prev == NULL {
                return ElemId(current);
            }
            current = prev;
            level = level.max(self.height_of(current) - 1);
        }
    }

    // --- Raw-index walks shared with the batch algorithms ---

    pub(crate) fn left_parent(&self, start: Idx, level: usize) -> Idx {
        let mut current = start;
        loop {
            if self.height_of(current) > level + 1 {
                return current;
            }
            current = self.prev_at(current, level);
            if current == NULL || current == start {
                return NULL;
            }
        }
    }

    pub(crate) fn right_parent(&self, start: Idx, level: usize) -> Idx {
        let mut current = start;
        loop {
            if self.height_of(current) > level + 1 {
                return current;
            }
            current = self.next_at(current, level);
            if current == NULL || current == start {
                return NULL;
            }
        }
    }
}
