//! Per-size addressability/definedness access helpers — the routines
//! generated code calls on every guest memory operation.

mod check;
mod helpers;

pub use check::{classify, Classification};
pub use helpers::{
    fpu_read_check, fpu_write_check, read1, read2, read4, read8, value_check, write1, write2, write4, write8,
    ReadOutcome, WriteOutcome,
};
