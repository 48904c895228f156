//! Classification of a memory access against the shadow map.
//!
//! Three-way read outcome (fully valid / fully invalid / partial), checked
//! with a cheap fast-path test that falls through to an exhaustive
//! per-byte pass only when the fast path can't decide.

use shadowtrace_shadowmap::{ABit, ShadowMap};

/// Outcome of classifying an access against the shadow map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Every byte in range is addressable.
    FullyValid,
    /// Every byte in range is inaccessible.
    FullyInvalid,
    /// Some bytes addressable, some not, and the access does not qualify
    /// for the "partial loads OK" exception (either it's a write, the
    /// address is unaligned, or the tool has not opted in).
    PartialDisallowed,
    /// Some bytes addressable, some not, but the tool opted into
    /// `--partial-loads-ok=yes` and the address is aligned to `len`: no
    /// error, per-byte V-word composition proceeds.
    PartialAllowed,
}

impl Classification {
    #[inline]
    pub fn is_error(self) -> bool {
        matches!(self, Classification::FullyInvalid | Classification::PartialDisallowed)
    }
}

/// Slow-path per-byte classification. Always correct; the fast paths in
/// [`crate::helpers`] exist only to skip this loop in the common case.
///
/// Writes never take the partial-allowed branch, matching the documented
/// (if ambiguous) behaviour of `--partial-loads-ok` mirrored from the
/// original: "writes always require full addressability".
pub fn classify(map: &ShadowMap, addr: u32, len: u32, is_write: bool, partial_loads_ok: bool) -> Classification {
    if len == 0 {
        return Classification::FullyValid;
    }
    let mut valid = 0u32;
    for i in 0..len {
        if map.get_addressable(addr.wrapping_add(i)) == ABit::Valid {
            valid += 1;
        }
    }
    if valid == len {
        return Classification::FullyValid;
    }
    if valid == 0 {
        return Classification::FullyInvalid;
    }
    let aligned = len.is_power_of_two() && addr % len == 0;
    if !is_write && partial_loads_ok && aligned {
        Classification::PartialAllowed
    } else {
        Classification::PartialDisallowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadowtrace_shadowmap::ShadowMap;

    #[test]
    fn fully_invalid_by_default() {
        let map = ShadowMap::new(false);
        assert_eq!(classify(&map, 0x1000, 4, false, false), Classification::FullyInvalid);
    }

    #[test]
    fn fully_valid_after_marking() {
        let map = ShadowMap::new(false);
        for i in 0..4 {
            map.set_addressable(0x1000 + i, ABit::Valid);
        }
        assert_eq!(classify(&map, 0x1000, 4, false, false), Classification::FullyValid);
    }

    #[test]
    fn partial_disallowed_without_opt_in() {
        let map = ShadowMap::new(false);
        map.set_addressable(0x1000, ABit::Valid);
        map.set_addressable(0x1001, ABit::Valid);
        assert_eq!(classify(&map, 0x1000, 4, false, false), Classification::PartialDisallowed);
    }

    #[test]
    fn partial_allowed_when_aligned_and_opted_in() {
        let map = ShadowMap::new(false);
        map.set_addressable(0x1000, ABit::Valid);
        map.set_addressable(0x1001, ABit::Valid);
        assert_eq!(classify(&map, 0x1000, 4, false, true), Classification::PartialAllowed);
    }

    #[test]
    fn partial_never_allowed_for_writes() {
        let map = ShadowMap::new(false);
        map.set_addressable(0x1000, ABit::Valid);
        assert_eq!(classify(&map, 0x1000, 4, true, true), Classification::PartialDisallowed);
    }

    #[test]
    fn unaligned_partial_is_disallowed_even_with_opt_in() {
        let map = ShadowMap::new(false);
        map.set_addressable(0x1001, ABit::Valid);
        map.set_addressable(0x1002, ABit::Valid);
        assert_eq!(classify(&map, 0x1001, 4, false, true), Classification::PartialDisallowed);
    }

    #[test]
    fn zero_length_is_fully_valid() {
        let map = ShadowMap::new(false);
        assert_eq!(classify(&map, 0x1000, 0, false, false), Classification::FullyValid);
    }
}
