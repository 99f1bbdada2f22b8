//! Invariant checks for tests and debugging.
//!
//! These walk the whole arena and are far slower than any batch operation.
//! They must not run concurrently with a batch mutating the list.

use rustc_hash::FxHashSet;

use crate::augmented::AugmentedSkipList;
use crate::skip_list::SkipList;
use crate::tower::ElemId;
use crate::tower::Idx;
use crate::tower::NULL;
use crate::tower::UNSET;

/// A broken structural invariant, naming the element and level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("element {node} level {level}: next is {next} but its prev is {back}")]
    NextPrevMismatch { node: u32, level: usize, next: u32, back: u32 },
    #[error("element {node} level {level}: prev is {prev} but its next is {forward}")]
    PrevNextMismatch { node: u32, level: usize, prev: u32, forward: u32 },
    #[error("element {node} level {level}: linked to {target} of height {height}")]
    LinkTooShort { node: u32, level: usize, target: u32, height: usize },
    #[error("element {node} level {level}: next is {next}, expected {expected} from the level below")]
    SkippedTower { node: u32, level: usize, next: u32, expected: u32 },
    #[error("element {node}: coordination claim {claimed} left behind")]
    ClaimLeft { node: u32, claimed: u32 },
    #[error("element {node} level {level}: cached sum {cached}, span sums to {actual}")]
    StaleSum { node: u32, level: usize, cached: i64, actual: i64 },
}

/// Links agree in both directions and every level skips exactly the towers
/// too short for it.
pub fn check_links(list: &SkipList) -> Result<(), Violation> {
    for node in 0..list.len() as Idx {
        for level in 0..list.height_of(node) {
            let next = list.next_at(node, level);
            if next != NULL {
                let height = list.height_of(next);
                if height <= level {
                    return Err(Violation::LinkTooShort { node, level, target: next, height });
                }
                let back = list.prev_at(next, level);
                if back != node {
                    return Err(Violation::NextPrevMismatch { node, level, next, back });
                }
            }

            let prev = list.prev_at(node, level);
            if prev != NULL {
                let height = list.height_of(prev);
                if height <= level {
                    return Err(Violation::LinkTooShort { node, level, target: prev, height });
                }
                let forward = list.next_at(prev, level);
                if forward != node {
                    return Err(Violation::PrevNextMismatch { node, level, prev, forward });
                }
            }

            if level > 0 {
                let expected = span_end(list, node, level);
                if next != expected {
                    return Err(Violation::SkippedTower { node, level, next, expected });
                }
            }
        }
    }
    return Ok(());
}

/// No batch left a coordination claim behind.
pub fn check_unset(list: &SkipList) -> Result<(), Violation> {
    for node in 0..list.len() as Idx {
        let claimed = list.tower(node).update_level.load(std::sync::atomic::Ordering::Acquire);
        if claimed != UNSET {
            return Err(Violation::ClaimLeft { node, claimed });
        }
    }
    return Ok(());
}

/// Every cached sum matches its span recomputed from the level below.
pub fn check_values(list: &AugmentedSkipList) -> Result<(), Violation> {
    let skip = list.skip_list();
    for node in 0..skip.len() as Idx {
        for level in 1..skip.height_of(node) {
            let mut actual = list.value_at(node, level - 1);
            let mut current = skip.next_at(node, level - 1);
            while current != NULL && skip.height_of(current) <= level {
                actual += list.value_at(current, level - 1);
                current = skip.next_at(current, level - 1);
            }
            let cached = list.value_at(node, level);
            if cached != actual {
                return Err(Violation::StaleSum { node, level, cached, actual });
            }
        }
    }
    return Ok(());
}

/// Number of elements in `v`'s list, counted one link at a time.
pub fn naive_size(list: &SkipList, v: ElemId) -> usize {
    let mut size = 1;
    let mut current = list.next_at(v.0, 0);
    while current != NULL {
        if current == v.0 {
            return size;
        }
        size += 1;
        current = list.next_at(current, 0);
    }
    current = list.prev_at(v.0, 0);
    while current != NULL {
        size += 1;
        current = list.prev_at(current, 0);
    }
    return size;
}

/// Number of distinct lists in the arena.
pub fn count_lists(list: &SkipList) -> usize {
    let mut representatives = FxHashSet::default();
    for v in list.ids() {
        representatives.insert(list.find_representative(v));
    }
    return representatives.len();
}

/// Where `node`'s link at `level` should point: the first tower taller than
/// `level` reached along `level - 1`.
fn span_end(list: &SkipList, node: Idx, level: usize) -> Idx {
    let mut current = list.next_at(node, level - 1);
    while current != NULL && list.height_of(current) <= level {
        current = list.next_at(current, level - 1);
    }
    return current;
}
