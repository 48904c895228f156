//! Call-site fingerprint capture and hash-interned execution context
//! storage — turns "where did this event originate" into a cheap,
//! pointer-comparable handle.

#![deny(unsafe_code)]

mod fingerprint;
mod store;

pub use fingerprint::{hash_frames, Fingerprint, DEFAULT_MAX_FRAMES};
pub use store::{ContextHandle, ContextStore, Resolution, Stats, BUCKET_COUNT};
