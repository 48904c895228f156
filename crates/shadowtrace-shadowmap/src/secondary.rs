//! A single 64 KiB shadow window: A-bits and optional V-bytes.
//!
//! Mirrors the `SecMap` layout from the original engine: one bit of
//! addressability per guest byte (8 KiB), plus one byte of validity per
//! guest byte (64 KiB) when the owning map tracks definedness.

use std::sync::atomic::{AtomicU8, Ordering};

/// Number of guest bytes a secondary map covers.
pub const WINDOW_BYTES: usize = 65_536;

/// A-bits packed 8 per byte.
const ABITS_BYTES: usize = WINDOW_BYTES / 8;

/// A-byte value meaning "all 8 guest bytes inaccessible".
pub const ABYTE_ALL_INVALID: u8 = 0xFF;

/// A-byte value meaning "all 8 guest bytes accessible".
pub const ABYTE_ALL_VALID: u8 = 0x00;

/// V-byte value meaning "all 8 bits of this guest byte undefined".
pub const VBYTE_UNDEFINED: u8 = 0xFF;

/// V-byte value meaning "all 8 bits of this guest byte defined".
pub const VBYTE_DEFINED: u8 = 0x00;

/// One 64 KiB shadow window.
///
/// `abits[i]` holds the addressability of guest bytes `8*i .. 8*i+8`, one
/// bit per byte, 1 = inaccessible. `vbits`, when present, holds one byte of
/// per-bit definedness for every guest byte in the window.
pub struct Secondary {
    abits: Box<[AtomicU8; ABITS_BYTES]>,
    vbits: Option<Box<[AtomicU8]>>,
}

impl Secondary {
    /// Build a window with every byte inaccessible (and undefined, if tracked).
    pub fn new_invalid(track_validity: bool) -> Self {
        Self::new_filled(ABYTE_ALL_INVALID, VBYTE_UNDEFINED, track_validity)
    }

    /// Build a window with every byte accessible and defined.
    pub fn new_valid(track_validity: bool) -> Self {
        Self::new_filled(ABYTE_ALL_VALID, VBYTE_DEFINED, track_validity)
    }

    fn new_filled(abyte: u8, vbyte: u8, track_validity: bool) -> Self {
        let abits: Vec<AtomicU8> = (0..ABITS_BYTES).map(|_| AtomicU8::new(abyte)).collect();
        let abits: Box<[AtomicU8; ABITS_BYTES]> =
            abits.into_boxed_slice().try_into().unwrap_or_else(|_| {
                unreachable!("ABITS_BYTES is a compile-time constant matching the Vec length")
            });
        let vbits = track_validity.then(|| {
            (0..WINDOW_BYTES)
                .map(|_| AtomicU8::new(vbyte))
                .collect::<Vec<_>>()
                .into_boxed_slice()
        });
        Self { abits, vbits }
    }

    /// Deep-copy this window into a freshly allocated, independently owned one.
    pub fn clone_private(&self) -> Self {
        let abits: Vec<AtomicU8> = self
            .abits
            .iter()
            .map(|b| AtomicU8::new(b.load(Ordering::Relaxed)))
            .collect();
        let abits = abits.into_boxed_slice().try_into().unwrap_or_else(|_| {
            unreachable!("ABITS_BYTES is a compile-time constant matching the Vec length")
        });
        let vbits = self.vbits.as_ref().map(|v| {
            v.iter()
                .map(|b| AtomicU8::new(b.load(Ordering::Relaxed)))
                .collect::<Vec<_>>()
                .into_boxed_slice()
        });
        Self { abits, vbits }
    }

    #[inline]
    pub fn tracks_validity(&self) -> bool {
        self.vbits.is_some()
    }

    #[inline]
    pub fn get_abit(&self, offset: u32) -> bool {
        let byte = self.abits[(offset >> 3) as usize].load(Ordering::Relaxed);
        (byte >> (offset & 7)) & 1 != 0
    }

    #[inline]
    pub fn set_abit(&self, offset: u32, inaccessible: bool) {
        let idx = (offset >> 3) as usize;
        let mask = 1u8 << (offset & 7);
        if inaccessible {
            self.abits[idx].fetch_or(mask, Ordering::Relaxed);
        } else {
            self.abits[idx].fetch_and(!mask, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn get_vbyte(&self, offset: u32) -> Option<u8> {
        self.vbits
            .as_ref()
            .map(|v| v[offset as usize].load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_vbyte(&self, offset: u32, value: u8) {
        if let Some(v) = &self.vbits {
            v[offset as usize].store(value, Ordering::Relaxed);
        }
    }

    /// Fetch the raw A-byte (8 guest bytes' worth of bits) covering `offset`.
    #[inline]
    pub fn abyte(&self, offset: u32) -> u8 {
        self.abits[(offset >> 3) as usize].load(Ordering::Relaxed)
    }

    /// Overwrite a whole A-byte (8 bytes aligned on an 8-byte boundary).
    #[inline]
    pub fn set_abyte(&self, offset: u32, value: u8) {
        self.abits[(offset >> 3) as usize].store(value, Ordering::Relaxed);
    }

    /// Number of guest bytes in this window whose A-bit is "inaccessible".
    /// Used only by the expensive sanity check; not on any hot path.
    pub fn count_inaccessible(&self) -> usize {
        self.abits
            .iter()
            .map(|b| b.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_invalid_window_is_all_inaccessible() {
        let sm = Secondary::new_invalid(true);
        for off in [0u32, 1, 255, 65535] {
            assert!(sm.get_abit(off));
            assert_eq!(sm.get_vbyte(off), Some(VBYTE_UNDEFINED));
        }
        assert_eq!(sm.count_inaccessible(), WINDOW_BYTES);
    }

    #[test]
    fn fresh_valid_window_is_all_accessible() {
        let sm = Secondary::new_valid(false);
        for off in [0u32, 1, 255, 65535] {
            assert!(!sm.get_abit(off));
            assert_eq!(sm.get_vbyte(off), None);
        }
    }

    #[test]
    fn set_and_get_abit_roundtrip() {
        let sm = Secondary::new_invalid(false);
        sm.set_abit(42, false);
        assert!(!sm.get_abit(42));
        assert!(sm.get_abit(41));
        assert!(sm.get_abit(43));
    }

    #[test]
    fn clone_private_is_independent() {
        let sm = Secondary::new_invalid(true);
        let clone = sm.clone_private();
        clone.set_abit(10, false);
        assert!(sm.get_abit(10));
        assert!(!clone.get_abit(10));
    }
}
