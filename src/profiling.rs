//! Simple profiling counters for understanding batch coordination.
//!
//! Counters are process-wide and relaxed: concurrent batches on different
//! lists all add into the same totals. Use `reset()` before a measured run.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

pub static LINKS_SPLICED: AtomicU64 = AtomicU64::new(0);
pub static LINKS_CUT: AtomicU64 = AtomicU64::new(0);
pub static CLAIMS_WON: AtomicU64 = AtomicU64::new(0);
pub static CLAIMS_LOST: AtomicU64 = AtomicU64::new(0);
pub static WRITE_MINS: AtomicU64 = AtomicU64::new(0);
pub static TOP_NODES: AtomicU64 = AtomicU64::new(0);
pub static FORKS: AtomicU64 = AtomicU64::new(0);

#[inline]
pub fn link_spliced() {
    LINKS_SPLICED.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub fn link_cut() {
    LINKS_CUT.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub fn claim_won() {
    CLAIMS_WON.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub fn claim_lost() {
    CLAIMS_LOST.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub fn write_min() {
    WRITE_MINS.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub fn top_node() {
    TOP_NODES.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub fn fork() {
    FORKS.fetch_add(1, Ordering::Relaxed);
}

/// Point-in-time copy of every counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub links_spliced: u64,
    pub links_cut: u64,
    pub claims_won: u64,
    pub claims_lost: u64,
    pub write_mins: u64,
    pub top_nodes: u64,
    pub forks: u64,
}

pub fn snapshot() -> Counters {
    return Counters {
        links_spliced: LINKS_SPLICED.load(Ordering::Relaxed),
        links_cut: LINKS_CUT.load(Ordering::Relaxed),
        claims_won: CLAIMS_WON.load(Ordering::Relaxed),
        claims_lost: CLAIMS_LOST.load(Ordering::Relaxed),
        write_mins: WRITE_MINS.load(Ordering::Relaxed),
        top_nodes: TOP_NODES.load(Ordering::Relaxed),
        forks: FORKS.load(Ordering::Relaxed),
    };
}

pub fn reset() {
    LINKS_SPLICED.store(0, Ordering::Relaxed);
    LINKS_CUT.store(0, Ordering::Relaxed);
    CLAIMS_WON.store(0, Ordering::Relaxed);
    CLAIMS_LOST.store(0, Ordering::Relaxed);
    WRITE_MINS.store(0, Ordering::Relaxed);
    TOP_NODES.store(0, Ordering::Relaxed);
    FORKS.store(0, Ordering::Relaxed);
}

pub fn report() -> String {
    let c = snapshot();
    let claims = c.claims_won + c.claims_lost;
    let win_rate = if claims > 0 { c.claims_won as f64 / claims as f64 * 100.0 } else { 0.0 };

    format!(
        "Links: +{} -{}, Claims: {}/{} ({:.1}% won), WriteMin: {}, Tops: {}, Forks: {}",
        c.links_spliced, c.links_cut, c.claims_won, claims, win_rate, c.write_mins, c.top_nodes, c.forks
    )
}
