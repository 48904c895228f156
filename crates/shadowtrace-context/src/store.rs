//! Hash-interned execution context store.
//!
//! A fixed-size bucket-list hash table (size 4093, a prime chosen to
//! spread addresses well), linear element-wise comparison within a
//! bucket, and stats counters tracking search/comparison volume and
//! resolution-level equality hits.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::fingerprint::{hash_frames, Fingerprint};

/// Number of hash buckets. Matches the original's fixed table size.
pub const BUCKET_COUNT: usize = 4093;

/// Depth at which two fingerprints are compared for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Low,
    Med,
    High,
}

/// Opaque handle to an interned fingerprint. Two handles compare equal
/// iff they were produced by interning identical frame vectors, at zero
/// cost (an index comparison standing in for the original's pointer
/// comparison).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextHandle(usize);

/// Stats snapshot exposed for verbose/diagnostic output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub searches: u64,
    pub comparisons: u64,
    pub interned_total: u64,
    pub equal_at_low: u64,
    pub equal_at_med: u64,
    pub equal_at_high: u64,
}

#[derive(Default)]
struct AtomicStats {
    searches: AtomicU64,
    comparisons: AtomicU64,
    interned_total: AtomicU64,
    equal_at_low: AtomicU64,
    equal_at_med: AtomicU64,
    equal_at_high: AtomicU64,
}

/// Process-wide execution context store. Fingerprints persist for the
/// life of the run; they are never evicted.
pub struct ContextStore {
    buckets: Vec<Mutex<Vec<usize>>>,
    arena: RwLock<Vec<Fingerprint>>,
    stats: AtomicStats,
}

impl ContextStore {
    pub fn new() -> Self {
        Self {
            buckets: (0..BUCKET_COUNT).map(|_| Mutex::new(Vec::new())).collect(),
            arena: RwLock::new(Vec::new()),
            stats: AtomicStats::default(),
        }
    }

    /// Intern a fingerprint, returning a handle. Identical frame vectors
    /// (by value) always return the same handle.
    pub fn intern(&self, fp: Fingerprint) -> ContextHandle {
        self.stats.searches.fetch_add(1, Ordering::Relaxed);
        let hash = hash_frames(&fp.frames);
        let bucket_idx = (hash as usize) % BUCKET_COUNT;

        {
            let bucket = self.buckets[bucket_idx].lock();
            let arena = self.arena.read();
            for &idx in bucket.iter() {
                self.stats.comparisons.fetch_add(1, Ordering::Relaxed);
                if arena[idx].frames == fp.frames {
                    return ContextHandle(idx);
                }
            }
        }

        let idx = {
            let mut arena = self.arena.write();
            let idx = arena.len();
            arena.push(fp);
            idx
        };
        self.buckets[bucket_idx].lock().push(idx);
        self.stats.interned_total.fetch_add(1, Ordering::Relaxed);
        ContextHandle(idx)
    }

    /// Compare two handles at the given resolution. Equal handles are
    /// trivially equal at any resolution without touching the arena.
    pub fn equal(&self, a: ContextHandle, b: ContextHandle, resolution: Resolution) -> bool {
        if a == b {
            return true;
        }
        let arena = self.arena.read();
        let fa = &arena[a.0].frames;
        let fb = &arena[b.0].frames;
        let depth = match resolution {
            Resolution::Low => 2,
            Resolution::Med => 4,
            Resolution::High => fa.len().max(fb.len()),
        };
        let result = fa.iter().take(depth).eq(fb.iter().take(depth));
        match resolution {
            Resolution::Low => self.stats.equal_at_low.fetch_add(1, Ordering::Relaxed),
            Resolution::Med => self.stats.equal_at_med.fetch_add(1, Ordering::Relaxed),
            Resolution::High => self.stats.equal_at_high.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    /// Fetch the frames backing a handle, e.g. for printing a context.
    pub fn frames_of(&self, handle: ContextHandle) -> Vec<u32> {
        self.arena.read()[handle.0].frames.clone()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            searches: self.stats.searches.load(Ordering::Relaxed),
            comparisons: self.stats.comparisons.load(Ordering::Relaxed),
            interned_total: self.stats.interned_total.load(Ordering::Relaxed),
            equal_at_low: self.stats.equal_at_low.load(Ordering::Relaxed),
            equal_at_med: self.stats.equal_at_med.load(Ordering::Relaxed),
            equal_at_high: self.stats.equal_at_high.load(Ordering::Relaxed),
        }
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_stack_yields_pointer_equal_handles() {
        let store = ContextStore::new();
        let h1 = store.intern(Fingerprint::capture([1, 2, 3, 4], 4));
        let h2 = store.intern(Fingerprint::capture([1, 2, 3, 4], 4));
        assert_eq!(h1, h2);
        assert_eq!(store.stats().interned_total, 1);
    }

    #[test]
    fn distinct_stacks_get_distinct_handles() {
        let store = ContextStore::new();
        let h1 = store.intern(Fingerprint::capture([1, 2, 3, 4], 4));
        let h2 = store.intern(Fingerprint::capture([1, 2, 3, 5], 4));
        assert_ne!(h1, h2);
        assert_eq!(store.stats().interned_total, 2);
    }

    #[test]
    fn equal_at_low_resolution_ignores_deep_frame_differences() {
        let store = ContextStore::new();
        let h1 = store.intern(Fingerprint::capture([1, 2, 3, 4], 4));
        let h2 = store.intern(Fingerprint::capture([1, 2, 9, 9], 4));
        assert!(store.equal(h1, h2, Resolution::Low));
        assert!(!store.equal(h1, h2, Resolution::Med));
    }

    #[test]
    fn equal_at_high_resolution_requires_full_match() {
        let store = ContextStore::new();
        let h1 = store.intern(Fingerprint::capture([1, 2, 3, 4], 4));
        let h2 = store.intern(Fingerprint::capture([1, 2, 3, 4], 4));
        assert!(store.equal(h1, h2, Resolution::High));
    }

    #[test]
    fn frames_of_roundtrips_through_interning() {
        let store = ContextStore::new();
        let h = store.intern(Fingerprint::capture([7, 8], 2));
        assert_eq!(store.frames_of(h), vec![7, 8]);
    }
}
