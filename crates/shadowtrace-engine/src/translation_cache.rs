//! Coarse translation-cache invalidation for self-modifying or remapped
//! code.
//!
//! Models invalidation as a small range set with linear-scan membership
//! rather than a per-byte inverse index, since the number of live
//! translation ranges at any moment is small in practice (one per loaded
//! code region).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Range {
    start: u32,
    end: u32,
}

impl Range {
    fn intersects(&self, start: u32, end: u32) -> bool {
        self.start < end && start < self.end
    }
}

/// Tracks which guest address ranges currently have cached translations.
/// `discard` both removes matching ranges here and tells the caller which
/// ones to drop from its own translation table.
#[derive(Default)]
pub struct TranslationCache {
    ranges: Vec<Range>,
}

impl TranslationCache {
    pub fn new() -> Self {
        TranslationCache::default()
    }

    /// Record that `[addr, addr+len)` now has a cached translation.
    pub fn note_translated(&mut self, addr: u32, len: u32) {
        self.ranges.push(Range { start: addr, end: addr.wrapping_add(len) });
    }

    /// Discard every cached range intersecting `[addr, addr+len)` (a
    /// client-requested discard, or a permission change / munmap),
    /// returning the ranges that were invalidated.
    pub fn discard(&mut self, addr: u32, len: u32) -> Vec<(u32, u32)> {
        let end = addr.wrapping_add(len);
        let mut removed = Vec::new();
        self.ranges.retain(|r| {
            if r.intersects(addr, end) {
                removed.push((r.start, r.end));
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discard_removes_only_intersecting_ranges() {
        let mut cache = TranslationCache::new();
        cache.note_translated(0x1000, 0x100);
        cache.note_translated(0x2000, 0x100);
        let removed = cache.discard(0x1050, 0x10);
        assert_eq!(removed, vec![(0x1000, 0x1100)]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn mmap_then_munmap_then_remap_starts_fresh() {
        let mut cache = TranslationCache::new();
        cache.note_translated(0x4000_0000, 0x1000);
        let removed = cache.discard(0x4000_0000, 0x1000);
        assert_eq!(removed.len(), 1);
        assert!(cache.is_empty());
        cache.note_translated(0x4000_0000, 0x1000);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn non_overlapping_discard_leaves_cache_untouched() {
        let mut cache = TranslationCache::new();
        cache.note_translated(0x1000, 0x100);
        let removed = cache.discard(0x5000, 0x100);
        assert!(removed.is_empty());
        assert_eq!(cache.len(), 1);
    }
}
