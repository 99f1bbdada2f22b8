//! Tower nodes: the per-element record every list is built from.
//!
//! An element participates in `height` levels. At each level it has a
//! predecessor and a successor link; level 0 is the full sequence and each
//! level above skips over the shorter towers below it.
//!
//! ```text
//! Level 2: A ------------------------> E
//! Level 1: A ---------> C -----------> E ----> F
//! Level 0: A -> B ----> C -> D ------> E ----> F
//! ```
//!
//! Links are element ids into the owning arena, with `NULL` marking the open
//! end of a list. A circular list simply wraps: following `next` eventually
//! returns to the start, at every level the list reaches.
//!
//! All fields are atomics so that disjoint joins and splits can run from many
//! threads against a shared `&SkipList`.

use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

/// Tallest tower. Heights come from trailing one bits of a random integer, so
/// reaching this needs 31 consecutive ones.
pub const MAX_HEIGHT: usize = 32;

/// Raw element index. `u32` keeps links small.
pub(crate) type Idx = u32;

/// Null link marker.
pub(crate) const NULL: Idx = Idx::MAX;

/// `update_level` value meaning no recomputation is pending. Using the
/// largest value lets contention lower a pending level with one `fetch_min`.
pub(crate) const UNSET: u32 = u32::MAX;

/// Stable handle to an element of a skip list.
///
/// Elements are numbered `0..len` in construction order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElemId(pub(crate) Idx);

impl ElemId {
    /// Handle for the `index`-th element.
    pub fn new(index: usize) -> ElemId {
        assert!(index < NULL as usize, "element index {} out of range", index);
        return ElemId(index as Idx);
    }

    pub fn index(self) -> usize {
        return self.0 as usize;
    }

    #[inline]
    pub(crate) fn from_raw(idx: Idx) -> Option<ElemId> {
        if idx == NULL { None } else { Some(ElemId(idx)) }
    }
}

impl From<usize> for ElemId {
    fn from(index: usize) -> ElemId {
        return ElemId::new(index);
    }
}

/// Height drawn from a caller-supplied random integer: one plus the number of
/// trailing one bits, capped at `MAX_HEIGHT`. Each extra level therefore
/// exists with probability 1/2 for uniform input.
pub fn height_for(random: u64) -> usize {
    let height = random.trailing_ones() as usize + 1;
    return height.min(MAX_HEIGHT);
}

/// Predecessor and successor at one level.
#[derive(Debug)]
pub struct Link {
    pub(crate) prev: AtomicU32,
    pub(crate) next: AtomicU32,
}

impl Default for Link {
    fn default() -> Self {
        return Link {
            prev: AtomicU32::new(NULL),
            next: AtomicU32::new(NULL),
        };
    }
}

impl Link {
    fn clear(&self) {
        self.prev.store(NULL, Ordering::Relaxed);
        self.next.store(NULL, Ordering::Relaxed);
    }
}

/// One element's tower.
#[derive(Debug)]
pub(crate) struct Tower {
    /// One link per level; the length is the tower height.
    pub(crate) links: Box<[Link]>,
    /// Lowest level whose augmented value must be recomputed, or `UNSET`.
    /// Claimed by at most one batch item at a time.
    pub(crate) update_level: AtomicU32,
}

impl Tower {
    /// Wrap a freshly allocated (possibly recycled) link array as a singleton
    /// list element.
    pub(crate) fn new(links: Box<[Link]>) -> Tower {
        for link in links.iter() {
            link.clear();
        }
        return Tower {
            links,
            update_level: AtomicU32::new(UNSET),
        };
    }

    #[inline]
    pub(crate) fn height(&self) -> usize {
        return self.links.len();
    }

    #[inline]
    pub(crate) fn next(&self, level: usize) -> Idx {
        return self.links[level].next.load(Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn prev(&self, level: usize) -> Idx {
        return self.links[level].prev.load(Ordering::SeqCst);
    }

    /// Give the array back for recycling.
    pub(crate) fn into_links(self) -> Box<[Link]> {
        return self.links;
    }
}

/// Random integers that `height_for` turns into exactly `heights`.
#[cfg(test)]
pub(crate) fn randoms_for(heights: &[usize]) -> Vec<u64> {
    return heights.iter().map(|&h| (1u64 << (h - 1)) - 1).collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_counts_trailing_ones() {
        assert_eq!(height_for(0), 1);
        assert_eq!(height_for(0b10), 1);
        assert_eq!(height_for(0b1), 2);
        assert_eq!(height_for(0b0111), 4);
        assert_eq!(height_for(0b1011), 3);
        assert_eq!(height_for(u64::MAX), MAX_HEIGHT);
    }

    #[test]
    fn height_is_deterministic() {
        for random in [0u64, 7, 12345, 0xdead_beef, u64::MAX - 1] {
            assert_eq!(height_for(random), height_for(random));
        }
    }

    #[test]
    fn heights_roughly_halve() {
        // Counting 0..2^16 covers every low-bit pattern exactly once.
        let mut counts = [0usize; MAX_HEIGHT + 1];
        for random in 0..(1u64 << 16) {
            counts[height_for(random)] += 1;
        }
        assert_eq!(counts[1], 1 << 15);
        assert_eq!(counts[2], 1 << 14);
        assert_eq!(counts[3], 1 << 13);
    }

    #[test]
    fn new_tower_is_a_singleton() {
        let links: Box<[Link]> = (0..3).map(|_| Link::default()).collect();
        links[1].next.store(42, Ordering::Relaxed);
        let tower = Tower::new(links);
        assert_eq!(tower.height(), 3);
        for level in 0..3 {
            assert_eq!(tower.next(level), NULL);
            assert_eq!(tower.prev(level), NULL);
        }
        assert_eq!(tower.update_level.load(Ordering::Relaxed), UNSET);
    }

    #[test]
    fn elem_id_round_trips_null() {
        assert_eq!(ElemId::from_raw(NULL), None);
        assert_eq!(ElemId::from_raw(5), Some(ElemId::new(5)));
        assert_eq!(ElemId::from(9).index(), 9);
    }

    #[test]
    fn randoms_for_gives_requested_heights() {
        let heights = [1, 2, 5, 1, MAX_HEIGHT];
        let randoms = randoms_for(&heights);
        let drawn: Vec<usize> = randoms.iter().map(|&r| height_for(r)).collect();
        assert_eq!(drawn, heights);
    }

    #[test]
    fn largest_index_fits() {
        assert_eq!(ElemId::new(NULL as usize - 1).index(), NULL as usize - 1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn index_at_null_is_rejected() {
        ElemId::new(NULL as usize);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn index_past_u32_is_rejected() {
        ElemId::new(usize::MAX);
    }
}
