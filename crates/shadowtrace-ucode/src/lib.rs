//! IR instrumenter: walks a UCode block and inserts access-helper calls
//! before memory-touching micro-ops.

mod classify;
mod helpers;
mod instrument;
mod liveness;
mod types;

pub use classify::{classify, OpClass};
pub use helpers::{load_helper_name, store_helper_name, FPU_READ_HELPER, FPU_WRITE_HELPER};
pub use instrument::{instrument, InstrumentError};
pub use liveness::analyze as analyze_liveness;
pub use types::{FlagsEffect, MicroOp, Opcode, Operand, UCodeBlock};
