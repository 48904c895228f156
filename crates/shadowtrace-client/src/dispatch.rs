//! Client-request dispatch: applies a decoded [`ClientRequest`] against the
//! shadow map and fires the matching lifecycle event.
//!
//! Deliberately thin: it reuses `shadowtrace-shadowmap::range` rather than
//! duplicating its logic.

use std::sync::atomic::{AtomicU32, Ordering};

use shadowtrace_events::TrackEvents;
use shadowtrace_shadowmap::{make_defined, make_inaccessible, make_writable_undefined, ABit, ShadowMap};

use crate::request::ClientRequest;

/// Sentinel returned for an unrecognised request code, matching the
/// original's convention of returning `0` (success-shaped, since most
/// tools ignore the return value of unhandled requests) while still
/// recording that the request was ignored.
pub const UNKNOWN_REQUEST_SENTINEL: u32 = 0;

/// How many times a warning about unknown requests will be printed before
/// falling silent (but still counting).
pub const MAX_UNKNOWN_WARNINGS: u32 = 3;

/// Tracks how many client requests went unrecognised, and how many of
/// those the caller has already been told to warn about.
#[derive(Default)]
pub struct IgnoredRequests {
    count: AtomicU32,
    warned: AtomicU32,
}

impl IgnoredRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Record one more ignored request; returns `true` the caller should
    /// print a warning for this occurrence (capped at
    /// [`MAX_UNKNOWN_WARNINGS`]).
    fn record(&self) -> bool {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.warned
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |w| (w < MAX_UNKNOWN_WARNINGS).then_some(w + 1))
            .is_ok()
    }
}

/// Result of dispatching one client request: the value the front-end
/// writes back to the guest's designated return register, plus whether a
/// one-shot warning about an unknown request should be printed now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchResult {
    pub return_value: u32,
    pub should_warn_unknown: bool,
}

/// Apply `req` to `map`, firing the matching event through `events` where
/// one applies. `CheckReadable`/`CheckWritable` return `0` when
/// the whole range is addressable, otherwise `offset + 1` of the first bad
/// byte (so offset 0 is distinguishable from success). Discard-translations
/// is reported back via the `return_value` encoding the range so the
/// engine's translation cache (an external collaborator) can invalidate it;
/// this crate does not own the cache itself.
pub fn dispatch(req: ClientRequest, map: &ShadowMap, events: &mut TrackEvents, ignored: &IgnoredRequests, self_tid: u32) -> DispatchResult {
    let ok = DispatchResult { return_value: 1, should_warn_unknown: false };
    match req {
        ClientRequest::MakeNoAccess { addr, len } => {
            make_inaccessible(map, addr, len);
            events.fire_die_mem_heap(addr, len);
            ok
        }
        ClientRequest::MakeWritable { addr, len } => {
            make_writable_undefined(map, addr, len);
            events.fire_new_mem_heap(addr, len, false);
            ok
        }
        ClientRequest::MakeReadable { addr, len } => {
            make_defined(map, addr, len);
            events.fire_new_mem_heap(addr, len, true);
            ok
        }
        ClientRequest::CheckReadable { addr, len } => DispatchResult {
            return_value: first_unaddressable(map, addr, len).map(|off| off + 1).unwrap_or(0),
            should_warn_unknown: false,
        },
        ClientRequest::CheckWritable { addr, len } => DispatchResult {
            return_value: first_unaddressable(map, addr, len).map(|off| off + 1).unwrap_or(0),
            should_warn_unknown: false,
        },
        ClientRequest::DiscardTranslations { addr, len } => {
            // Translation-cache invalidation is the engine's job; we hand
            // the range back unchanged.
            DispatchResult { return_value: addr.wrapping_add(len), should_warn_unknown: false }
        }
        ClientRequest::MallocLikeBlock { addr, size, redzone, is_zeroed } => {
            events.fire_ban_mem_heap(addr.wrapping_sub(redzone), redzone);
            events.fire_new_mem_heap(addr, size, is_zeroed);
            events.fire_ban_mem_heap(addr.wrapping_add(size), redzone);
            ok
        }
        ClientRequest::FreeLikeBlock { addr, redzone } => {
            events.fire_die_mem_heap(addr.wrapping_sub(redzone), redzone);
            ok
        }
        ClientRequest::CreateMempool { .. } | ClientRequest::DestroyMempool { .. } => ok,
        ClientRequest::MempoolAlloc { addr, size, .. } => {
            events.fire_new_mem_heap(addr, size, false);
            ok
        }
        ClientRequest::MempoolFree { addr, .. } => {
            events.fire_die_mem_heap(addr, 0);
            ok
        }
        ClientRequest::DoLeakCheck => {
            // The leak-detector root-set walker is supplied externally; the
            // core only acknowledges the request.
            let _ = self_tid;
            ok
        }
        ClientRequest::Unknown(_) => {
            let should_warn = ignored.record();
            DispatchResult { return_value: UNKNOWN_REQUEST_SENTINEL, should_warn_unknown: should_warn }
        }
    }
}

/// First byte offset within `[addr, addr+len)` whose A-bit is invalid, or
/// `None` if the whole range is addressable.
fn first_unaddressable(map: &ShadowMap, addr: u32, len: u32) -> Option<u32> {
    (0..len).find(|&i| map.get_addressable(addr.wrapping_add(i)) == ABit::Invalid)
}
