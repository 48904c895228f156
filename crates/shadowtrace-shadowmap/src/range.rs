//! Bulk range operators over a [`ShadowMap`].
//!
//! These are the operations the engine calls when a whole segment changes
//! state at once: a page gets mapped, a heap chunk is carved out of a
//! pool, or a redzone needs to revert to undefined. All share the same
//! "warn once, never fail" policy for implausibly large ranges.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::map::{ABit, ShadowMap};

/// Ranges above this size are plausible only for a handful of legitimate
/// cases (e.g. mapping a large anonymous region); beyond it we still do
/// the work but emit a one-time warning, mirroring the original's
/// behaviour of never refusing the operation outright.
pub const LARGE_RANGE_WARN_THRESHOLD: u32 = 256 * 1024 * 1024;

static WARNED_ONCE: AtomicBool = AtomicBool::new(false);

/// Returns `true` the first time it is called with a range past the
/// warn threshold, and `false` on every subsequent call (regardless of
/// range), matching the "warn-once" cap policy used elsewhere in the
/// error-reporting path.
fn should_warn(len: u32) -> bool {
    len >= LARGE_RANGE_WARN_THRESHOLD && !WARNED_ONCE.swap(true, Ordering::Relaxed)
}

/// Mark `[addr, addr+len)` entirely inaccessible and, if validity is
/// tracked, undefined. Used when memory is unmapped or a heap chunk is
/// freed.
pub fn make_inaccessible(map: &ShadowMap, addr: u32, len: u32) -> bool {
    let warned = should_warn(len);
    for i in 0..len {
        let a = addr.wrapping_add(i);
        map.set_addressable(a, ABit::Invalid);
        map.set_defined_byte(a, crate::secondary::VBYTE_UNDEFINED);
    }
    warned
}

/// Mark `[addr, addr+len)` accessible and defined. Used for freshly
/// initialised memory (e.g. `.bss`, `calloc`).
pub fn make_defined(map: &ShadowMap, addr: u32, len: u32) -> bool {
    let warned = should_warn(len);
    for i in 0..len {
        let a = addr.wrapping_add(i);
        map.set_addressable(a, ABit::Valid);
        map.set_defined_byte(a, crate::secondary::VBYTE_DEFINED);
    }
    warned
}

/// Mark `[addr, addr+len)` accessible but undefined. Used for freshly
/// allocated, uninitialised memory (e.g. `malloc`, stack growth).
pub fn make_writable_undefined(map: &ShadowMap, addr: u32, len: u32) -> bool {
    let warned = should_warn(len);
    for i in 0..len {
        let a = addr.wrapping_add(i);
        map.set_addressable(a, ABit::Valid);
        map.set_defined_byte(a, crate::secondary::VBYTE_UNDEFINED);
    }
    warned
}
