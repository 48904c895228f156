//! Two-level shadow map: primary table of secondary windows, with lazy
//! allocation of secondaries on first touch.
//!
//! The primary is sized 4x the natural `2^16` entries so that the
//! rotate-based index used by the 4-byte access helper (`shadowtrace-access`)
//! folds misalignment into the same dispatch the distinguished secondary
//! already serves for unmapped memory — see [`extended_index`].

use std::sync::Arc;

use parking_lot::RwLock;

use crate::secondary::Secondary;

/// Bits of guest address used to index the primary map.
pub const PRIMARY_BITS: u32 = 16;

/// Natural primary size: one slot per 64 KiB window across a 32-bit space.
pub const PRIMARY_SIZE: usize = 1 << PRIMARY_BITS;

/// Extended primary size (4x), see module docs.
pub const PRIMARY_EXTENDED_SIZE: usize = PRIMARY_SIZE * 4;

/// Addressability classification of a guest byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ABit {
    Valid,
    Invalid,
}

impl ABit {
    #[inline]
    pub fn is_valid(self) -> bool {
        matches!(self, ABit::Valid)
    }

    #[inline]
    fn from_inaccessible_bit(inaccessible: bool) -> Self {
        if inaccessible { ABit::Invalid } else { ABit::Valid }
    }
}

/// Rotate the address right by 16 bits, putting the low 2 bits of a
/// 4-byte-aligned check directly above the high 16 bits used as the
/// ordinary secondary index. A misaligned address therefore always lands
/// outside the first quarter of the extended primary.
#[inline]
pub fn rotate_right_16(addr: u32) -> u32 {
    addr.rotate_right(16)
}

/// Index into the extended (4x) primary for a (possibly misaligned)
/// 4-byte access at `addr`.
#[inline]
pub fn extended_index(addr: u32) -> usize {
    (rotate_right_16(addr) as usize) & (PRIMARY_EXTENDED_SIZE - 1)
}

/// Ordinary primary index for single/double-byte accesses: no alignment
/// dispatch trick, just the high 16 bits.
#[inline]
pub fn primary_index(addr: u32) -> usize {
    (addr >> PRIMARY_BITS) as usize
}

/// Two-level shadow map over a 32-bit guest address space.
pub struct ShadowMap {
    primary: RwLock<Vec<Arc<Secondary>>>,
    distinguished: Arc<Secondary>,
    track_validity: bool,
}

impl ShadowMap {
    /// Create a shadow map with everything initially inaccessible, as at
    /// process startup before any segment is mapped.
    pub fn new(track_validity: bool) -> Self {
        let distinguished = Arc::new(Secondary::new_invalid(track_validity));
        // The first quarter covers real 64 KiB windows; the upper 3/4 is
        // permanently the distinguished secondary and only ever reached via
        // `extended_index` for misaligned 4-byte accesses.
        let primary = vec![Arc::clone(&distinguished); PRIMARY_EXTENDED_SIZE];
        Self {
            primary: RwLock::new(primary),
            distinguished,
            track_validity,
        }
    }

    #[inline]
    pub fn tracks_validity(&self) -> bool {
        self.track_validity
    }

    #[inline]
    fn window_offset(addr: u32) -> u32 {
        addr & 0xFFFF
    }

    #[inline]
    fn secondary_for(&self, addr: u32) -> Arc<Secondary> {
        Arc::clone(&self.primary.read()[primary_index(addr)])
    }

    /// Secondary reached through the rotate-based extended index; used by
    /// the 4-byte access helper's fast path. Always the distinguished
    /// secondary when `addr` is not 4-byte aligned.
    #[inline]
    pub fn secondary_for_extended(&self, addr: u32) -> Arc<Secondary> {
        Arc::clone(&self.primary.read()[extended_index(addr)])
    }

    /// Ensure the 64 KiB window containing `addr` owns a private secondary
    /// (cloning the distinguished one if it is still shared), then return
    /// it. This is the only operation that allocates.
    fn ensure_private(&self, addr: u32) -> Arc<Secondary> {
        let idx = primary_index(addr);
        {
            let primary = self.primary.read();
            if !Arc::ptr_eq(&primary[idx], &self.distinguished) {
                return Arc::clone(&primary[idx]);
            }
        }
        let mut primary = self.primary.write();
        if Arc::ptr_eq(&primary[idx], &self.distinguished) {
            primary[idx] = Arc::new(self.distinguished.clone_private());
        }
        Arc::clone(&primary[idx])
    }

    /// Read the A-bit for a single guest byte. Constant time.
    #[inline]
    pub fn get_addressable(&self, addr: u32) -> ABit {
        let sec = self.secondary_for(addr);
        ABit::from_inaccessible_bit(sec.get_abit(Self::window_offset(addr)))
    }

    /// Read the V-byte for a single guest byte, if validity is tracked.
    #[inline]
    pub fn get_defined_byte(&self, addr: u32) -> Option<u8> {
        let sec = self.secondary_for(addr);
        sec.get_vbyte(Self::window_offset(addr))
    }

    /// Set the A-bit for a single guest byte, allocating a private
    /// secondary for its window if necessary.
    pub fn set_addressable(&self, addr: u32, state: ABit) {
        let sec = self.ensure_private(addr);
        sec.set_abit(Self::window_offset(addr), matches!(state, ABit::Invalid));
    }

    /// Set the V-byte for a single guest byte, allocating a private
    /// secondary for its window if necessary. No-op when validity is not
    /// tracked.
    pub fn set_defined_byte(&self, addr: u32, byte: u8) {
        if !self.track_validity {
            return;
        }
        let sec = self.ensure_private(addr);
        sec.set_vbyte(Self::window_offset(addr), byte);
    }

    /// Addressability of a 4-byte-aligned word as a packed nibble (bit i =
    /// A-bit of byte `addr+i`). `addr` must be 4-byte aligned.
    ///
    /// Because the A-byte spans 8 guest bytes, the nibble is extracted by
    /// shifting down by `(addr & 4)` and masking, exactly mirroring the
    /// fast-path shift in the original access-helper scheme.
    pub fn get_addressable_word_aligned(&self, addr: u32) -> u8 {
        debug_assert_eq!(addr & 3, 0, "word-aligned read requires 4-byte alignment");
        let sec = self.secondary_for(addr);
        let abyte = sec.abyte(Self::window_offset(addr));
        (abyte >> (addr & 4)) & 0x0F
    }

    /// Four V-bytes of a 4-byte-aligned word. `addr` must be 4-byte aligned.
    pub fn get_defined_word_aligned(&self, addr: u32) -> Option<[u8; 4]> {
        debug_assert_eq!(addr & 3, 0, "word-aligned read requires 4-byte alignment");
        if !self.track_validity {
            return None;
        }
        let sec = self.secondary_for(addr);
        let base = Self::window_offset(addr);
        Some([
            sec.get_vbyte(base)?,
            sec.get_vbyte(base + 1)?,
            sec.get_vbyte(base + 2)?,
            sec.get_vbyte(base + 3)?,
        ])
    }

    /// Bytewise copy of (A,V) state from `src` to `dst` for `len` bytes.
    /// Used by `realloc`-style moves and `mremap`-style remappings.
    pub fn copy_state(&self, src: u32, dst: u32, len: u32) {
        for i in 0..len {
            let a = self.get_addressable(src.wrapping_add(i));
            self.set_addressable(dst.wrapping_add(i), a);
            if self.track_validity
                && let Some(v) = self.get_defined_byte(src.wrapping_add(i))
            {
                self.set_defined_byte(dst.wrapping_add(i), v);
            }
        }
    }

    /// Cheap sanity check: verifies the lowest and highest 64 KiB windows
    /// remain unmapped (still the distinguished secondary). O(1).
    pub fn cheap_sanity_check(&self) -> bool {
        let primary = self.primary.read();
        Arc::ptr_eq(&primary[0], &self.distinguished)
            && Arc::ptr_eq(&primary[PRIMARY_SIZE - 1], &self.distinguished)
    }

    /// Expensive sanity check: walks the whole primary verifying that the
    /// upper 3/4 (the alignment-dispatch region) is untouched and that the
    /// distinguished secondary itself was never mutated in place.
    pub fn expensive_sanity_check(&self) -> bool {
        let primary = self.primary.read();
        let upper_ok = primary[PRIMARY_SIZE..]
            .iter()
            .all(|s| Arc::ptr_eq(s, &self.distinguished));
        let distinguished_ok = self.distinguished.count_inaccessible() == crate::secondary::WINDOW_BYTES;
        upper_ok && distinguished_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_map_is_fully_inaccessible() {
        let sm = ShadowMap::new(true);
        assert_eq!(sm.get_addressable(0), ABit::Invalid);
        assert_eq!(sm.get_addressable(0xFFFF_FFFF), ABit::Invalid);
        assert!(sm.cheap_sanity_check());
        assert!(sm.expensive_sanity_check());
    }

    #[test]
    fn set_addressable_allocates_private_window() {
        let sm = ShadowMap::new(false);
        sm.set_addressable(0x1000, ABit::Valid);
        assert_eq!(sm.get_addressable(0x1000), ABit::Valid);
        // Neighbouring byte in the same window is untouched.
        assert_eq!(sm.get_addressable(0x1001), ABit::Invalid);
        // A different window is entirely unaffected.
        assert_eq!(sm.get_addressable(0x2_0000), ABit::Invalid);
    }

    #[test]
    fn word_aligned_nibble_all_valid_iff_all_bytes_valid() {
        let sm = ShadowMap::new(false);
        let base = 0x4000u32;
        for i in 0..4 {
            sm.set_addressable(base + i, ABit::Valid);
        }
        let nibble = sm.get_addressable_word_aligned(base);
        assert_eq!(nibble, 0, "all-valid nibble should be zero (0 = accessible)");

        sm.set_addressable(base + 2, ABit::Invalid);
        let nibble = sm.get_addressable_word_aligned(base);
        assert_ne!(nibble, 0);
    }

    #[test]
    fn extended_index_dispatches_misaligned_to_distinguished_region() {
        let aligned = 0x1000u32;
        let misaligned = 0x1001u32;
        assert!(extended_index(aligned) < PRIMARY_SIZE);
        assert!(extended_index(misaligned) >= PRIMARY_SIZE);
    }

    #[test]
    fn copy_state_mirrors_source_bytes() {
        let sm = ShadowMap::new(true);
        sm.set_addressable(0x100, ABit::Valid);
        sm.set_defined_byte(0x100, 0x42);
        sm.copy_state(0x100, 0x200, 1);
        assert_eq!(sm.get_addressable(0x200), ABit::Valid);
        assert_eq!(sm.get_defined_byte(0x200), Some(0x42));
    }

    #[test]
    fn distinguished_secondary_shared_until_first_write() {
        let sm = ShadowMap::new(false);
        // Two far-apart unmapped windows should share the same Arc.
        let a = sm.secondary_for(0x1000);
        let b = sm.secondary_for(0x9_0000);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn validity_disabled_is_a_noop_for_vbytes() {
        let sm = ShadowMap::new(false);
        sm.set_defined_byte(0x10, 0xAA);
        assert_eq!(sm.get_defined_byte(0x10), None);
    }
}
