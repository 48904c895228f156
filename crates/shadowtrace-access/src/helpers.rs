//! Per-size read/write/value-check helpers callable from instrumented code.
//!
//! The size-4 fast path uses the `rotate_right_16`-folded alignment check
//! exposed through
//! [`shadowtrace_shadowmap::ShadowMap::get_addressable_word_aligned`]; the
//! rest of the 1/2/4/8-plus-FPU family follows the same fast/slow shape.
//!
//! These helpers do not record errors themselves — they return an
//! [`AccessOutcome`] classifying the access, and the caller (normally the
//! event dispatcher's error-reporting glue) decides whether to invoke the
//! error recorder. This keeps the dependency graph acyclic: the recorder
//! needs the context store and suppression matcher, neither of which this
//! crate should need to know about.

use shadowtrace_shadowmap::{ShadowMap, VBYTE_DEFINED, VBYTE_UNDEFINED};

use crate::check::{classify, Classification};

/// Result of a read helper: whether the access is an address error, and
/// the V-word to hand back to the guest (per spec: on error, return
/// all-defined to avoid cascading value errors downstream).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    pub error: bool,
    pub vbytes: Vec<u8>,
}

/// Result of a write helper: whether the access is an address error. On
/// error the caller must not commit the write's data to guest memory, only
/// report; on success the caller commits and this helper has already
/// updated the V-plane to "defined" for every byte written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub error: bool,
}

fn all_defined(len: u32) -> Vec<u8> {
    vec![VBYTE_DEFINED; len as usize]
}

fn compose_partial_vbytes(map: &ShadowMap, addr: u32, len: u32) -> Vec<u8> {
    (0..len)
        .map(|i| map.get_defined_byte(addr.wrapping_add(i)).unwrap_or(VBYTE_UNDEFINED))
        .collect()
}

/// Fast path for a 4-byte-aligned, 4-byte access: a single nibble check.
/// Returns `Some` when the fast path fully resolves the access (i.e. the
/// address is aligned and every byte is addressable); `None` means the
/// caller must fall through to the general slow path.
fn fast_read4(map: &ShadowMap, addr: u32) -> Option<ReadOutcome> {
    if addr & 3 != 0 {
        return None;
    }
    let nibble = map.get_addressable_word_aligned(addr);
    if nibble != 0 {
        return None;
    }
    let vbytes = map
        .get_defined_word_aligned(addr)
        .map(|v| v.to_vec())
        .unwrap_or_else(|| all_defined(4));
    Some(ReadOutcome { error: false, vbytes })
}

/// Generic per-byte read helper for any size, used directly by sizes 1
/// and 2 (no alignment-dispatch trick, per spec) and as the slow path for
/// 4, 8, and FPU/vector sizes.
fn slow_read(map: &ShadowMap, addr: u32, len: u32, partial_loads_ok: bool) -> ReadOutcome {
    match classify(map, addr, len, false, partial_loads_ok) {
        Classification::FullyValid => ReadOutcome {
            error: false,
            vbytes: compose_partial_vbytes(map, addr, len),
        },
        Classification::PartialAllowed => ReadOutcome {
            error: false,
            vbytes: compose_partial_vbytes(map, addr, len),
        },
        Classification::FullyInvalid | Classification::PartialDisallowed => ReadOutcome {
            error: true,
            vbytes: all_defined(len),
        },
    }
}

fn slow_write(map: &ShadowMap, addr: u32, len: u32) -> WriteOutcome {
    match classify(map, addr, len, true, false) {
        Classification::FullyValid => {
            for i in 0..len {
                map.set_defined_byte(addr.wrapping_add(i), VBYTE_DEFINED);
            }
            WriteOutcome { error: false }
        }
        _ => WriteOutcome { error: true },
    }
}

/// 1-byte read helper. No alignment-dispatch trick; the primary index is
/// simply `addr >> 16`.
pub fn read1(map: &ShadowMap, addr: u32) -> ReadOutcome {
    slow_read(map, addr, 1, false)
}

/// 2-byte read helper.
pub fn read2(map: &ShadowMap, addr: u32) -> ReadOutcome {
    slow_read(map, addr, 2, false)
}

/// 4-byte read helper: inlined fast path, slow path on miss.
pub fn read4(map: &ShadowMap, addr: u32, partial_loads_ok: bool) -> ReadOutcome {
    fast_read4(map, addr).unwrap_or_else(|| slow_read(map, addr, 4, partial_loads_ok))
}

/// 8-byte read helper: inlined fast path covering both constituent words
/// when 8-byte aligned, slow path otherwise.
pub fn read8(map: &ShadowMap, addr: u32, partial_loads_ok: bool) -> ReadOutcome {
    if addr & 7 == 0
        && let (Some(lo), Some(hi)) = (fast_read4(map, addr), fast_read4(map, addr + 4))
    {
        let mut vbytes = lo.vbytes;
        vbytes.extend(hi.vbytes);
        return ReadOutcome { error: false, vbytes };
    }
    slow_read(map, addr, 8, partial_loads_ok)
}

/// Write helper for any of the four core sizes; writes never take the
/// partial-allowed branch, so there is no benefit to a specialised fast
/// path beyond the word-aligned nibble check itself.
pub fn write1(map: &ShadowMap, addr: u32) -> WriteOutcome {
    slow_write(map, addr, 1)
}

pub fn write2(map: &ShadowMap, addr: u32) -> WriteOutcome {
    slow_write(map, addr, 2)
}

pub fn write4(map: &ShadowMap, addr: u32) -> WriteOutcome {
    slow_write(map, addr, 4)
}

pub fn write8(map: &ShadowMap, addr: u32) -> WriteOutcome {
    slow_write(map, addr, 8)
}

/// FPU/vector memory read check for non-power-of-two or oversized widths
/// (8, 10, 16, 28, 108, 512 bytes covering x87/MMX/SSE/FXSAVE areas).
/// Always the general per-byte loop; these sizes never qualify for the
/// word-aligned fast path.
pub fn fpu_read_check(map: &ShadowMap, addr: u32, size: u32) -> ReadOutcome {
    slow_read(map, addr, size, false)
}

/// FPU/vector memory write check, mirroring [`fpu_read_check`].
pub fn fpu_write_check(map: &ShadowMap, addr: u32, size: u32) -> WriteOutcome {
    slow_write(map, addr, size)
}

/// Value-check-failure helper: invoked by instrumented conditional
/// branches and similar "consume a value" points. Returns `true` (a value
/// error should be reported) if any byte of `vbytes` is undefined.
pub fn value_check(vbytes: &[u8]) -> bool {
    vbytes.iter().any(|&b| b != VBYTE_DEFINED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadowtrace_shadowmap::ABit;

    fn mark_valid(map: &ShadowMap, addr: u32, len: u32) {
        for i in 0..len {
            map.set_addressable(addr + i, ABit::Valid);
        }
    }

    #[test]
    fn read4_fast_path_on_valid_aligned_word() {
        let map = ShadowMap::new(true);
        mark_valid(&map, 0x1000, 4);
        let out = read4(&map, 0x1000, false);
        assert!(!out.error);
        assert_eq!(out.vbytes.len(), 4);
    }

    #[test]
    fn read4_slow_path_on_misaligned_address() {
        let map = ShadowMap::new(false);
        mark_valid(&map, 0x1001, 4);
        let out = read4(&map, 0x1001, false);
        assert!(!out.error);
    }

    #[test]
    fn read4_reports_error_when_fully_invalid() {
        let map = ShadowMap::new(false);
        let out = read4(&map, 0x2000, false);
        assert!(out.error);
        assert!(out.vbytes.iter().all(|&b| b == VBYTE_DEFINED));
    }

    #[test]
    fn write_never_takes_partial_branch() {
        let map = ShadowMap::new(false);
        map.set_addressable(0x3000, ABit::Valid);
        let out = write4(&map, 0x3000);
        assert!(out.error);
    }

    #[test]
    fn write_commits_definedness_on_success() {
        let map = ShadowMap::new(true);
        mark_valid(&map, 0x4000, 4);
        let out = write4(&map, 0x4000);
        assert!(!out.error);
        for i in 0..4 {
            assert_eq!(map.get_defined_byte(0x4000 + i), Some(VBYTE_DEFINED));
        }
    }

    #[test]
    fn value_check_flags_any_undefined_byte() {
        assert!(!value_check(&[VBYTE_DEFINED, VBYTE_DEFINED]));
        assert!(value_check(&[VBYTE_DEFINED, VBYTE_UNDEFINED]));
    }

    #[test]
    fn fpu_sizes_use_general_loop() {
        let map = ShadowMap::new(false);
        mark_valid(&map, 0x5000, 16);
        let out = fpu_read_check(&map, 0x5000, 16);
        assert!(!out.error);
        assert_eq!(out.vbytes.len(), 16);
    }
}
