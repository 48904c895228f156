//! Process-level services: thread table, signal state machine, minimal
//! libc substitute, cooperative scheduler, and coredump emission.

pub mod coredump;
pub mod libc;
pub mod scheduler;
pub mod signal;
pub mod thread;

pub use coredump::{build_coredump, coredump_filename, write_coredump, CoredumpError, RegisterNote, Segment};
pub use libc::LibcError;
pub use scheduler::{RunLock, SuspendReason};
pub use signal::{classify_fault, on_alt_stack, FaultOutcome, FaultSignal};
pub use thread::{AltStack, ThreadId, ThreadRecord, ThreadStatus, ThreadTable, MAX_THREADS};
