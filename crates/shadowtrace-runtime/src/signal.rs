//! Signal handling state machine.
//!
//! A SIGSEGV/SIGBUS landing in the guest's stack-growth region is turned
//! into a silent stack extension and retried; one landing just past an
//! unallocated shadow-map window is turned into a window allocation and
//! retried; anything else reaches the guest's handler or, absent one,
//! is fatal. The host-side `sigaction`/altstack plumbing itself is an
//! external front-end concern (arch-specific signal-frame marshalling);
//! this module only decides what a raw SIGSEGV/SIGBUS/SIGFPE/SIGILL
//! should turn into.

use crate::thread::{AltStack, ThreadRecord};

/// Signals this core interposes on. Others are passed straight through to
/// the guest's own handler (an external concern).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultSignal {
    Segv,
    Bus,
    Fpe,
    Ill,
}

/// What the core decided to do about one faulting access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    /// Stack was grown to cover the faulting address; retry the access.
    GrewStack { new_limit: u32 },
    /// A shadow-map secondary window was allocated to cover the faulting
    /// address; retry the access.
    AllocatedShadowWindow,
    /// Deliver to the guest's registered handler, if any.
    DeliverToGuest,
    /// No guest handler and not a recoverable case: fatal, coredump.
    Fatal,
}

/// Largest single stack-growth step, mirroring the original's bound on
/// how far a single fault is allowed to extend the stack (it grows by
/// a fixed padding rather than jumping straight to the faulting address,
/// to catch runaway recursion more precisely).
pub const MAX_STACK_GROWTH_STEP: u32 = 1 << 20;

/// A generous slack below the current limit within which a fault is
/// still considered "stack growth", not a genuine segfault.
pub const STACK_GROWTH_SLACK: u32 = 4096;

/// Decide what a fault at `fault_addr` inside `thread` should become.
/// `shadow_window_missing` tells the caller whether `fault_addr` falls in
/// a plausible but currently-unallocated shadow-map secondary window
/// (the shadow map itself decides "plausible"; this function just acts
/// on the verdict it's handed).
pub fn classify_fault(sig: FaultSignal, fault_addr: u32, thread: &ThreadRecord, shadow_window_missing: bool) -> FaultOutcome {
    if sig == FaultSignal::Segv {
        if let Some(new_limit) = stack_growth_target(fault_addr, thread) {
            return FaultOutcome::GrewStack { new_limit };
        }
        if shadow_window_missing {
            return FaultOutcome::AllocatedShadowWindow;
        }
    }
    if has_guest_handler(thread, sig) {
        FaultOutcome::DeliverToGuest
    } else {
        FaultOutcome::Fatal
    }
}

/// If `fault_addr` lies just below the thread's current stack limit
/// (within one growth step, leaving slack), return the new limit to grow
/// to. Otherwise `None` — not a stack-growth fault.
fn stack_growth_target(fault_addr: u32, thread: &ThreadRecord) -> Option<u32> {
    if fault_addr >= thread.stack_limit && fault_addr < thread.stack_base {
        return None;
    }
    let distance_below = thread.stack_limit.checked_sub(fault_addr)?;
    if distance_below <= MAX_STACK_GROWTH_STEP {
        Some(fault_addr.saturating_sub(STACK_GROWTH_SLACK))
    } else {
        None
    }
}

/// Whether the guest has installed a non-default handler for `sig`. The
/// actual handler table is front-end state; here we take the thread's
/// signal mask as a stand-in signal of "this thread cares about signals
/// at all" plus an explicit bit the caller sets — kept simple since the
/// handler table itself lives outside this crate's scope.
fn has_guest_handler(thread: &ThreadRecord, _sig: FaultSignal) -> bool {
    thread.eff_sig_mask != 0
}

/// Whether `sp` is currently on `alt`, as checked when entering a signal
/// frame.
pub fn on_alt_stack(alt: &AltStack, sp: u32) -> bool {
    alt.contains(sp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::ThreadStatus;

    fn thread_with_stack(base: u32, limit: u32) -> ThreadRecord {
        ThreadRecord {
            status: ThreadStatus::Runnable,
            shadow_regs: None,
            sig_mask: 0,
            eff_sig_mask: 0,
            altstack: AltStack::default(),
            stack_base: base,
            stack_limit: limit,
        }
    }

    #[test]
    fn fault_just_below_stack_limit_grows_stack() {
        let thread = thread_with_stack(0x8000_0000, 0x7fff_0000);
        let outcome = classify_fault(FaultSignal::Segv, 0x7ffe_f000, &thread, false);
        assert!(matches!(outcome, FaultOutcome::GrewStack { .. }));
    }

    #[test]
    fn fault_far_below_stack_limit_is_not_growth() {
        let thread = thread_with_stack(0x8000_0000, 0x7fff_0000);
        let outcome = classify_fault(FaultSignal::Segv, 0x1000, &thread, false);
        assert_eq!(outcome, FaultOutcome::Fatal);
    }

    #[test]
    fn fault_in_missing_shadow_window_reallocates() {
        let thread = thread_with_stack(0x8000_0000, 0x7fff_0000);
        let outcome = classify_fault(FaultSignal::Segv, 0x9000_0000, &thread, true);
        assert_eq!(outcome, FaultOutcome::AllocatedShadowWindow);
    }

    #[test]
    fn otherwise_unhandled_fault_with_guest_handler_delivers_to_guest() {
        let mut thread = thread_with_stack(0x8000_0000, 0x7fff_0000);
        thread.eff_sig_mask = 1;
        let outcome = classify_fault(FaultSignal::Ill, 0x9000_0000, &thread, false);
        assert_eq!(outcome, FaultOutcome::DeliverToGuest);
    }

    #[test]
    fn fault_already_within_stack_bounds_is_not_growth() {
        let thread = thread_with_stack(0x8000_0000, 0x7fff_0000);
        let outcome = classify_fault(FaultSignal::Segv, 0x7fff_8000, &thread, false);
        assert_eq!(outcome, FaultOutcome::Fatal);
    }
}
