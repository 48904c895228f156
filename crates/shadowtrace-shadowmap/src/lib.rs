//! Two-level shadow memory map: addressability and validity tracking for
//! a 32-bit guest address space, plus the bulk range operators built on
//! top of it.

mod map;
mod range;
mod secondary;

pub use map::{ABit, ShadowMap, PRIMARY_EXTENDED_SIZE, PRIMARY_SIZE};
pub use range::{make_defined, make_inaccessible, make_writable_undefined, LARGE_RANGE_WARN_THRESHOLD};
pub use secondary::{Secondary, VBYTE_DEFINED, VBYTE_UNDEFINED, WINDOW_BYTES};
