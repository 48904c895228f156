//! UCode micro-instruction representation: an ordered sequence of
//! micro-ops, each with an opcode, a transfer size, three tagged operand
//! slots, a literal payload, a flags-effect triple, and (after liveness
//! analysis) a bitmap of real registers live at that point, expressed as
//! an explicit Rust enum rather than a macro-built array-of-unions.

/// A tagged operand slot. `Unused` fills slots an opcode doesn't need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Virtual temporary register, numbered within the block.
    Temp(u32),
    /// A guest architectural register.
    Reg(u32),
    /// A spill slot in the translation's spill area.
    Spill(u32),
    /// An immediate value.
    Literal(i64),
    Unused,
}

impl Operand {
    pub fn as_temp(self) -> Option<u32> {
        match self {
            Operand::Temp(t) => Some(t),
            _ => None,
        }
    }
}

/// Which condition-code effects this micro-op has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagsEffect {
    pub reads: bool,
    pub writes: bool,
    pub undefined: bool,
}

/// The micro-op opcode space this instrumenter dispatches on. Any opcode
/// not named here is represented as [`Opcode::Other`] and is always copied
/// through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    Nop,
    Lock,
    CallmEntry,
    CallmExit,
    /// Pure compute or control-flow instruction with no memory operand.
    Compute,
    Load,
    Store,
    /// `SSE3ag_MemRd_RegWr`/`MMX2_MemRd`/`FPU_R`/`SSE*a[1]_MemRd`-family:
    /// an FPU or vector instruction that reads guest memory.
    FpuMemRead,
    /// `MMX2_MemWr`/`FPU_W`/`SSE*a_MemWr`-family: writes guest memory.
    FpuMemWrite,
    /// Register-only SSE/MMX/FPU op (`SSE3e_RegRd`/`SSE3g_RegWr`/...):
    /// touches no memory, copied unchanged.
    RegOnlyVector,
    /// A helper call already present in the stream (e.g. one this pass
    /// itself inserted, relevant only for `is_instrumented_access_call`).
    Ccall(String),
    /// Any opcode this dialect doesn't special-case.
    Other(String),
}

/// One micro-instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicroOp {
    pub opcode: Opcode,
    pub size: u32,
    pub operands: [Operand; 3],
    pub literal: Option<i64>,
    pub flags: FlagsEffect,
    /// Bitmap of real registers live immediately after this instruction,
    /// filled in by [`crate::liveness::analyze`]. `None` until analysis runs.
    pub live_after: Option<u64>,
}

impl MicroOp {
    pub fn new(opcode: Opcode, size: u32, operands: [Operand; 3]) -> Self {
        Self { opcode, size, operands, literal: None, flags: FlagsEffect::default(), live_after: None }
    }

    pub fn with_literal(mut self, lit: i64) -> Self {
        self.literal = Some(lit);
        self
    }
}

/// An ordered sequence of micro-ops — the unit the instrumenter consumes
/// and produces.
pub type UCodeBlock = Vec<MicroOp>;
