//! Sum queries over an `AugmentedSkipList`.
//!
//! Both queries read the cached per-level sums, so they cost a number of
//! steps proportional to the number of level changes along the way rather
//! than to the number of elements covered. Like the traversals, they may run
//! alongside each other but not alongside a batch mutating the same list.

use crate::augmented::AugmentedSkipList;
use crate::tower::ElemId;
use crate::tower::NULL;

impl AugmentedSkipList {
    /// Sum of values from `left` to `right`, both inclusive.
    ///
    /// `left` and `right` must be in the same list with `left` at or before
    /// `right`. `get_subsequence_sum(v, v)` is `v`'s own value.
    pub fn get_subsequence_sum(&self, left: ElemId, right: ElemId) -> i64 {
        let mut left = left.0;
        let mut right = right.0;
        let mut sum = self.value_at(right, 0);

        // Move the shorter side toward the other at the shorter height. A
        // tower's top-level sum covers exactly the elements up to the next
        // tower at least as tall, so neither side can overshoot.
        while left != right {
            let left_top = self.list.height_of(left) - 1;
            let right_top = self.list.height_of(right) - 1;
            if left_top <= right_top {
                sum += self.value_at(left, left_top);
                left = self.list.next_at(left, left_top);
            } else {
                right = self.list.prev_at(right, right_top);
                sum += self.value_at(right, right_top);
            }
            debug_assert!(
                left != NULL && right != NULL,
                "get_subsequence_sum: endpoints are not in order in one list"
            );
        }
        return sum;
    }

    /// Sum of values over `v`'s whole list. With unit values this is the
    /// list's length.
    pub fn get_sum(&self, v: ElemId) -> i64 {
        let root = self.list.find_representative(v).0;
        let mut level = self.list.height_of(root) - 1;

        // Forward along the top level. A circular list comes back to the
        // representative and is complete.
        let mut sum = self.value_at(root, level);
        let mut current = self.list.next_at(root, level);
        while current != NULL {
            if current == root {
                return sum;
            }
            sum += self.value_at(current, level);
            current = self.list.next_at(current, level);
        }

        // Open list: the representative is the leftmost tallest tower, so
        // everything before it is shorter. Step down a level at a time,
        // sweeping left over the towers whose top is that level.
        current = root;
        loop {
            loop {
                let prev = self.list.prev_at(current, level);
                if prev == NULL {
                    break;
                }
                current = prev;
                sum += self.value_at(current, level);
            }
            if level == 0 {
                return sum;
            }
            level -= 1;
        }
    }
}
