//! Event dispatcher: a flat struct of per-event callback slots.
//!
//! One slot per event kind, using `Option<Box<dyn FnMut>>` rather than a
//! vtable dispatch: a `None` slot is the safe-by-construction equivalent
//! of "no counterpart", and firing an event is a cheap `Option::as_mut`
//! check.

#![deny(unsafe_code)]

mod types;

pub use types::*;

/// Guest thread identifier.
pub type ThreadId = u32;

/// Guest address.
pub type Addr = u32;

macro_rules! event_slot {
    ($field:ident, $reg:ident, $cb_ty:ty) => {
        pub fn $reg(&mut self, f: $cb_ty) {
            self.$field = Some(f);
        }
    };
}

/// Registry of per-event callbacks. One instance per running tool,
/// owned by the `Engine` and consulted by every other component.
#[derive(Default)]
pub struct TrackEvents {
    new_mem_startup: Option<Box<dyn FnMut(Addr, u32, Perms) + Send>>,
    new_mem_mmap: Option<Box<dyn FnMut(Addr, u32, Perms) + Send>>,
    new_mem_brk: Option<Box<dyn FnMut(Addr, u32) + Send>>,
    new_mem_stack: Option<Box<dyn FnMut(Addr, u32) + Send>>,
    new_mem_stack_4: Option<Box<dyn FnMut(Addr) + Send>>,
    new_mem_stack_8: Option<Box<dyn FnMut(Addr) + Send>>,
    new_mem_stack_12: Option<Box<dyn FnMut(Addr) + Send>>,
    new_mem_stack_16: Option<Box<dyn FnMut(Addr) + Send>>,
    new_mem_stack_32: Option<Box<dyn FnMut(Addr) + Send>>,
    new_mem_stack_signal: Option<Box<dyn FnMut(Addr, u32) + Send>>,
    new_mem_heap: Option<Box<dyn FnMut(Addr, u32, bool) + Send>>,

    die_mem_startup: Option<Box<dyn FnMut(Addr, u32) + Send>>,
    die_mem_mmap: Option<Box<dyn FnMut(Addr, u32) + Send>>,
    die_mem_brk: Option<Box<dyn FnMut(Addr, u32) + Send>>,
    die_mem_stack: Option<Box<dyn FnMut(Addr, u32) + Send>>,
    die_mem_stack_4: Option<Box<dyn FnMut(Addr) + Send>>,
    die_mem_stack_8: Option<Box<dyn FnMut(Addr) + Send>>,
    die_mem_stack_12: Option<Box<dyn FnMut(Addr) + Send>>,
    die_mem_stack_16: Option<Box<dyn FnMut(Addr) + Send>>,
    die_mem_stack_32: Option<Box<dyn FnMut(Addr) + Send>>,
    die_mem_stack_signal: Option<Box<dyn FnMut(Addr, u32) + Send>>,
    die_mem_heap: Option<Box<dyn FnMut(Addr, u32) + Send>>,

    copy_mem_heap: Option<Box<dyn FnMut(Addr, Addr, u32) + Send>>,
    copy_mem_remap: Option<Box<dyn FnMut(Addr, Addr, u32) + Send>>,

    ban_mem_heap: Option<Box<dyn FnMut(Addr, u32) + Send>>,
    ban_mem_stack: Option<Box<dyn FnMut(Addr, u32) + Send>>,

    change_mem_mprotect: Option<Box<dyn FnMut(Addr, u32, Perms) + Send>>,

    pre_mem_read: Option<Box<dyn FnMut(Part, ThreadId, &str, Addr, u32) + Send>>,
    pre_mem_read_asciiz: Option<Box<dyn FnMut(Part, ThreadId, &str, Addr) + Send>>,
    pre_mem_write: Option<Box<dyn FnMut(Part, ThreadId, &str, Addr, u32) + Send>>,
    post_mem_write: Option<Box<dyn FnMut(Part, ThreadId, &str, Addr, u32) + Send>>,

    post_thread_create: Option<Box<dyn FnMut(ThreadId, ThreadId) + Send>>,
    post_thread_join: Option<Box<dyn FnMut(ThreadId, ThreadId) + Send>>,

    pre_mutex_lock: Option<Box<dyn FnMut(ThreadId, u32) + Send>>,
    post_mutex_lock: Option<Box<dyn FnMut(ThreadId, u32) + Send>>,
    post_mutex_unlock: Option<Box<dyn FnMut(ThreadId, u32) + Send>>,

    bad_free: Option<Box<dyn FnMut(ThreadId, Addr) + Send>>,
    mismatched_free: Option<Box<dyn FnMut(ThreadId, Addr) + Send>>,
}

impl TrackEvents {
    pub fn new() -> Self {
        Self::default()
    }

    event_slot!(new_mem_startup, register_new_mem_startup, Box<dyn FnMut(Addr, u32, Perms) + Send>);
    event_slot!(new_mem_mmap, register_new_mem_mmap, Box<dyn FnMut(Addr, u32, Perms) + Send>);
    event_slot!(new_mem_brk, register_new_mem_brk, Box<dyn FnMut(Addr, u32) + Send>);
    event_slot!(new_mem_stack, register_new_mem_stack, Box<dyn FnMut(Addr, u32) + Send>);
    event_slot!(new_mem_stack_4, register_new_mem_stack_4, Box<dyn FnMut(Addr) + Send>);
    event_slot!(new_mem_stack_8, register_new_mem_stack_8, Box<dyn FnMut(Addr) + Send>);
    event_slot!(new_mem_stack_12, register_new_mem_stack_12, Box<dyn FnMut(Addr) + Send>);
    event_slot!(new_mem_stack_16, register_new_mem_stack_16, Box<dyn FnMut(Addr) + Send>);
    event_slot!(new_mem_stack_32, register_new_mem_stack_32, Box<dyn FnMut(Addr) + Send>);
    event_slot!(new_mem_stack_signal, register_new_mem_stack_signal, Box<dyn FnMut(Addr, u32) + Send>);
    event_slot!(new_mem_heap, register_new_mem_heap, Box<dyn FnMut(Addr, u32, bool) + Send>);

    event_slot!(die_mem_startup, register_die_mem_startup, Box<dyn FnMut(Addr, u32) + Send>);
    event_slot!(die_mem_mmap, register_die_mem_mmap, Box<dyn FnMut(Addr, u32) + Send>);
    event_slot!(die_mem_brk, register_die_mem_brk, Box<dyn FnMut(Addr, u32) + Send>);
    event_slot!(die_mem_stack, register_die_mem_stack, Box<dyn FnMut(Addr, u32) + Send>);
    event_slot!(die_mem_stack_4, register_die_mem_stack_4, Box<dyn FnMut(Addr) + Send>);
    event_slot!(die_mem_stack_8, register_die_mem_stack_8, Box<dyn FnMut(Addr) + Send>);
    event_slot!(die_mem_stack_12, register_die_mem_stack_12, Box<dyn FnMut(Addr) + Send>);
    event_slot!(die_mem_stack_16, register_die_mem_stack_16, Box<dyn FnMut(Addr) + Send>);
    event_slot!(die_mem_stack_32, register_die_mem_stack_32, Box<dyn FnMut(Addr) + Send>);
    event_slot!(die_mem_stack_signal, register_die_mem_stack_signal, Box<dyn FnMut(Addr, u32) + Send>);
    event_slot!(die_mem_heap, register_die_mem_heap, Box<dyn FnMut(Addr, u32) + Send>);

    event_slot!(copy_mem_heap, register_copy_mem_heap, Box<dyn FnMut(Addr, Addr, u32) + Send>);
    event_slot!(copy_mem_remap, register_copy_mem_remap, Box<dyn FnMut(Addr, Addr, u32) + Send>);

    event_slot!(ban_mem_heap, register_ban_mem_heap, Box<dyn FnMut(Addr, u32) + Send>);
    event_slot!(ban_mem_stack, register_ban_mem_stack, Box<dyn FnMut(Addr, u32) + Send>);

    event_slot!(change_mem_mprotect, register_change_mem_mprotect, Box<dyn FnMut(Addr, u32, Perms) + Send>);

    event_slot!(pre_mem_read, register_pre_mem_read, Box<dyn FnMut(Part, ThreadId, &str, Addr, u32) + Send>);
    event_slot!(pre_mem_read_asciiz, register_pre_mem_read_asciiz, Box<dyn FnMut(Part, ThreadId, &str, Addr) + Send>);
    event_slot!(pre_mem_write, register_pre_mem_write, Box<dyn FnMut(Part, ThreadId, &str, Addr, u32) + Send>);
    event_slot!(post_mem_write, register_post_mem_write, Box<dyn FnMut(Part, ThreadId, &str, Addr, u32) + Send>);

    event_slot!(post_thread_create, register_post_thread_create, Box<dyn FnMut(ThreadId, ThreadId) + Send>);
    event_slot!(post_thread_join, register_post_thread_join, Box<dyn FnMut(ThreadId, ThreadId) + Send>);

    event_slot!(pre_mutex_lock, register_pre_mutex_lock, Box<dyn FnMut(ThreadId, u32) + Send>);
    event_slot!(post_mutex_lock, register_post_mutex_lock, Box<dyn FnMut(ThreadId, u32) + Send>);
    event_slot!(post_mutex_unlock, register_post_mutex_unlock, Box<dyn FnMut(ThreadId, u32) + Send>);

    event_slot!(bad_free, register_bad_free, Box<dyn FnMut(ThreadId, Addr) + Send>);
    event_slot!(mismatched_free, register_mismatched_free, Box<dyn FnMut(ThreadId, Addr) + Send>);

    // Dispatch wrappers. `pre_*`/new/die/copy/ban/change events fire
    // before the core mutates the affected shadow state; `post_*` events
    // fire after. An unregistered slot is a silent no-op.

    pub fn fire_new_mem_startup(&mut self, addr: Addr, len: u32, perms: Perms) {
        if let Some(cb) = &mut self.new_mem_startup {
            cb(addr, len, perms);
        }
    }

    pub fn fire_new_mem_mmap(&mut self, addr: Addr, len: u32, perms: Perms) {
        if let Some(cb) = &mut self.new_mem_mmap {
            cb(addr, len, perms);
        }
    }

    pub fn fire_new_mem_brk(&mut self, addr: Addr, len: u32) {
        if let Some(cb) = &mut self.new_mem_brk {
            cb(addr, len);
        }
    }

    pub fn fire_new_mem_stack(&mut self, addr: Addr, len: u32) {
        if let Some(cb) = &mut self.new_mem_stack {
            cb(addr, len);
        }
    }

    pub fn fire_new_mem_stack_signal(&mut self, addr: Addr, len: u32) {
        if let Some(cb) = &mut self.new_mem_stack_signal {
            cb(addr, len);
        }
    }

    pub fn fire_new_mem_heap(&mut self, addr: Addr, len: u32, is_inited: bool) {
        if let Some(cb) = &mut self.new_mem_heap {
            cb(addr, len, is_inited);
        }
    }

    pub fn fire_die_mem_startup(&mut self, addr: Addr, len: u32) {
        if let Some(cb) = &mut self.die_mem_startup {
            cb(addr, len);
        }
    }

    pub fn fire_die_mem_mmap(&mut self, addr: Addr, len: u32) {
        if let Some(cb) = &mut self.die_mem_mmap {
            cb(addr, len);
        }
    }

    pub fn fire_die_mem_brk(&mut self, addr: Addr, len: u32) {
        if let Some(cb) = &mut self.die_mem_brk {
            cb(addr, len);
        }
    }

    pub fn fire_die_mem_stack(&mut self, addr: Addr, len: u32) {
        if let Some(cb) = &mut self.die_mem_stack {
            cb(addr, len);
        }
    }

    pub fn fire_die_mem_stack_signal(&mut self, addr: Addr, len: u32) {
        if let Some(cb) = &mut self.die_mem_stack_signal {
            cb(addr, len);
        }
    }

    pub fn fire_die_mem_heap(&mut self, addr: Addr, len: u32) {
        if let Some(cb) = &mut self.die_mem_heap {
            cb(addr, len);
        }
    }

    pub fn fire_copy_mem_heap(&mut self, src: Addr, dst: Addr, len: u32) {
        if let Some(cb) = &mut self.copy_mem_heap {
            cb(src, dst, len);
        }
    }

    pub fn fire_copy_mem_remap(&mut self, src: Addr, dst: Addr, len: u32) {
        if let Some(cb) = &mut self.copy_mem_remap {
            cb(src, dst, len);
        }
    }

    pub fn fire_ban_mem_heap(&mut self, addr: Addr, len: u32) {
        if let Some(cb) = &mut self.ban_mem_heap {
            cb(addr, len);
        }
    }

    pub fn fire_ban_mem_stack(&mut self, addr: Addr, len: u32) {
        if let Some(cb) = &mut self.ban_mem_stack {
            cb(addr, len);
        }
    }

    pub fn fire_change_mem_mprotect(&mut self, addr: Addr, len: u32, perms: Perms) {
        if let Some(cb) = &mut self.change_mem_mprotect {
            cb(addr, len, perms);
        }
    }

    pub fn fire_pre_mem_read(&mut self, part: Part, tid: ThreadId, name: &str, addr: Addr, size: u32) {
        if let Some(cb) = &mut self.pre_mem_read {
            cb(part, tid, name, addr, size);
        }
    }

    pub fn fire_pre_mem_read_asciiz(&mut self, part: Part, tid: ThreadId, name: &str, addr: Addr) {
        if let Some(cb) = &mut self.pre_mem_read_asciiz {
            cb(part, tid, name, addr);
        }
    }

    pub fn fire_pre_mem_write(&mut self, part: Part, tid: ThreadId, name: &str, addr: Addr, size: u32) {
        if let Some(cb) = &mut self.pre_mem_write {
            cb(part, tid, name, addr, size);
        }
    }

    pub fn fire_post_mem_write(&mut self, part: Part, tid: ThreadId, name: &str, addr: Addr, size: u32) {
        if let Some(cb) = &mut self.post_mem_write {
            cb(part, tid, name, addr, size);
        }
    }

    pub fn fire_post_thread_create(&mut self, parent: ThreadId, child: ThreadId) {
        if let Some(cb) = &mut self.post_thread_create {
            cb(parent, child);
        }
    }

    pub fn fire_post_thread_join(&mut self, joiner: ThreadId, joinee: ThreadId) {
        if let Some(cb) = &mut self.post_thread_join {
            cb(joiner, joinee);
        }
    }

    pub fn fire_pre_mutex_lock(&mut self, tid: ThreadId, mutex_id: u32) {
        if let Some(cb) = &mut self.pre_mutex_lock {
            cb(tid, mutex_id);
        }
    }

    pub fn fire_post_mutex_lock(&mut self, tid: ThreadId, mutex_id: u32) {
        if let Some(cb) = &mut self.post_mutex_lock {
            cb(tid, mutex_id);
        }
    }

    pub fn fire_post_mutex_unlock(&mut self, tid: ThreadId, mutex_id: u32) {
        if let Some(cb) = &mut self.post_mutex_unlock {
            cb(tid, mutex_id);
        }
    }

    pub fn fire_bad_free(&mut self, tid: ThreadId, addr: Addr) {
        if let Some(cb) = &mut self.bad_free {
            cb(tid, addr);
        }
    }

    pub fn fire_mismatched_free(&mut self, tid: ThreadId, addr: Addr) {
        if let Some(cb) = &mut self.mismatched_free {
            cb(tid, addr);
        }
    }

    /// Fixed 4/8/12/16/32-byte stack-growth specialisations a tool may
    /// register instead of the general `new_mem_stack`/`die_mem_stack`
    /// pair, for tools that want to skip the generic path's length check.
    pub fn fire_new_mem_stack_fixed(&mut self, addr: Addr, bytes: u8) {
        let cb = match bytes {
            4 => &mut self.new_mem_stack_4,
            8 => &mut self.new_mem_stack_8,
            12 => &mut self.new_mem_stack_12,
            16 => &mut self.new_mem_stack_16,
            32 => &mut self.new_mem_stack_32,
            _ => return,
        };
        if let Some(cb) = cb {
            cb(addr);
        }
    }

    pub fn fire_die_mem_stack_fixed(&mut self, addr: Addr, bytes: u8) {
        let cb = match bytes {
            4 => &mut self.die_mem_stack_4,
            8 => &mut self.die_mem_stack_8,
            12 => &mut self.die_mem_stack_12,
            16 => &mut self.die_mem_stack_16,
            32 => &mut self.die_mem_stack_32,
            _ => return,
        };
        if let Some(cb) = cb {
            cb(addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn unregistered_event_is_a_silent_noop() {
        let mut events = TrackEvents::new();
        events.fire_new_mem_brk(0x1000, 16);
    }

    #[test]
    fn registered_callback_fires_with_correct_args() {
        let seen = Arc::new(AtomicU32::new(0));
        let seen2 = Arc::clone(&seen);
        let mut events = TrackEvents::new();
        events.register_new_mem_brk(Box::new(move |addr, _len| {
            seen2.store(addr, Ordering::Relaxed);
        }));
        events.fire_new_mem_brk(0x4000, 16);
        assert_eq!(seen.load(Ordering::Relaxed), 0x4000);
    }

    #[test]
    fn fixed_stack_growth_dispatches_to_matching_slot() {
        let seen = Arc::new(AtomicU32::new(0));
        let seen2 = Arc::clone(&seen);
        let mut events = TrackEvents::new();
        events.register_new_mem_stack_8(Box::new(move |addr| {
            seen2.store(addr, Ordering::Relaxed);
        }));
        events.fire_new_mem_stack_fixed(0x7FFF_0000, 8);
        assert_eq!(seen.load(Ordering::Relaxed), 0x7FFF_0000);
        // A different fixed size does not fire the size-8 slot.
        events.fire_new_mem_stack_fixed(0x7FFF_1000, 16);
        assert_eq!(seen.load(Ordering::Relaxed), 0x7FFF_0000);
    }
}
