//! The core-level error taxonomy, extensible by tools.

use serde::{Deserialize, Serialize};

/// Kind of a recorded error. Tools may extend this with their own
/// suppression-scoped kind string (see [`ErrorKind::Tool`]); the core
/// only interprets the eight built-in variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Read/write touches a byte whose A-bit is invalid.
    AddressError,
    /// Control decision (branch, syscall arg) consumes an undefined V-byte.
    ValueError,
    /// Syscall pointer argument is unreadable/unwritable, or a string
    /// argument is not NUL-terminated within mapped memory.
    ParamError,
    /// Core-internal operation (signal-frame push, pthread primitive)
    /// touches bad memory.
    CoreMemError,
    /// Instrumenter asked to translate an unreadable IP.
    JumpError,
    /// Client-request-initiated check fails.
    UserError,
    /// `free` called on an address not handed out by `malloc`.
    FreeError,
    /// `free`/`delete`/`delete[]` inconsistent with the allocating call.
    MismatchedFreeError,
    /// Tool-defined kind, identified by name for suppression matching.
    Tool(String),
}

impl ErrorKind {
    /// The string used to match against a suppression file's kind line.
    pub fn suppression_key(&self) -> &str {
        match self {
            ErrorKind::AddressError => "AddressError",
            ErrorKind::ValueError => "ValueError",
            ErrorKind::ParamError => "ParamError",
            ErrorKind::CoreMemError => "CoreMemError",
            ErrorKind::JumpError => "JumpError",
            ErrorKind::UserError => "UserError",
            ErrorKind::FreeError => "FreeError",
            ErrorKind::MismatchedFreeError => "MismatchedFreeError",
            ErrorKind::Tool(name) => name,
        }
    }
}
