//! The instrumentation pass itself.
//!
//! Walks an input block in order and, for each instruction, either copies
//! it unchanged or emits a `CCALL` to the matching access helper
//! immediately before it, over an explicit `Vec<MicroOp>` with no manual
//! memory management.

use crate::classify::{classify, OpClass};
use crate::helpers::{load_helper_name, store_helper_name, FPU_READ_HELPER, FPU_WRITE_HELPER};
use crate::types::{MicroOp, Opcode, Operand, UCodeBlock};

/// Allocates fresh virtual temp numbers beyond the highest one already
/// used in the block, so inserted size-literal temps never collide with
/// the original instruction stream's numbering.
struct TempAllocator {
    next: u32,
}

impl TempAllocator {
    fn for_block(block: &[MicroOp]) -> Self {
        let max = block
            .iter()
            .flat_map(|op| op.operands.iter())
            .filter_map(|o| o.as_temp())
            .max()
            .unwrap_or(0);
        Self { next: max + 1 }
    }

    fn fresh(&mut self) -> u32 {
        let t = self.next;
        self.next += 1;
        t
    }
}

/// Build the `CCALL(helper, addr_temp)` micro-op emitted before a plain
/// load/store, mirroring `uInstr1(cb, CCALL, 0, TempReg, ...); uCCall(cb,
/// helper, 1, 1, False)`.
fn ccall1(helper: &str, addr_temp: u32) -> MicroOp {
    MicroOp::new(Opcode::Ccall(helper.to_string()), 0, [Operand::Temp(addr_temp), Operand::Unused, Operand::Unused])
}

/// Build the `MOV Literal->Temp; CCALL(helper, addr_temp, size_temp)` pair
/// emitted before an FPU/vector access, mirroring the `do_Access_ARG*`
/// labels shared by `ac_main.c`'s FPU/MMX/SSE cases.
fn ccall2_with_size_literal(helper: &str, addr_temp: u32, size: u32, temps: &mut TempAllocator) -> [MicroOp; 2] {
    let size_temp = temps.fresh();
    let mov = MicroOp::new(Opcode::Compute, 4, [Operand::Literal(size as i64), Operand::Temp(size_temp), Operand::Unused])
        .with_literal(size as i64);
    let ccall = MicroOp::new(
        Opcode::Ccall(helper.to_string()),
        0,
        [Operand::Temp(addr_temp), Operand::Temp(size_temp), Operand::Unused],
    );
    [mov, ccall]
}

/// Errors the instrumenter can signal instead of silently mis-instrumenting.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InstrumentError {
    #[error("Load/Store of size {0} has no matching access helper")]
    UnsupportedCoreSize(u32),
    #[error("memory-referencing micro-op's address operand is not a Temp")]
    AddressOperandNotTemp,
}

/// Instrument `block` (the micro-ops of a single basic block starting at
/// guest address `_orig_addr`), inserting helper calls before every
/// memory-touching operation while preserving the original instructions.
/// Output length is always >= input length. `_orig_addr` is accepted (and
/// ignored by this component) because the external front-end's contract
/// passes it alongside the block; tools that need it can read it back off
/// their own bookkeeping rather than this pass tracking it.
pub fn instrument(block: &UCodeBlock, _orig_addr: u32) -> Result<UCodeBlock, InstrumentError> {
    let mut temps = TempAllocator::for_block(block);
    let mut out = Vec::with_capacity(block.len());

    for op in block {
        match classify(op) {
            OpClass::PassThrough => out.push(op.clone()),
            OpClass::Load { size, addr_operand } => {
                let addr_temp = op.operands[addr_operand].as_temp().ok_or(InstrumentError::AddressOperandNotTemp)?;
                let helper = load_helper_name(size).ok_or(InstrumentError::UnsupportedCoreSize(size))?;
                out.push(ccall1(helper, addr_temp));
                out.push(op.clone());
            }
            OpClass::Store { size, addr_operand } => {
                let addr_temp = op.operands[addr_operand].as_temp().ok_or(InstrumentError::AddressOperandNotTemp)?;
                let helper = store_helper_name(size).ok_or(InstrumentError::UnsupportedCoreSize(size))?;
                out.push(ccall1(helper, addr_temp));
                out.push(op.clone());
            }
            OpClass::FpuRead { size, addr_operand } => {
                let addr_temp = op.operands[addr_operand].as_temp().ok_or(InstrumentError::AddressOperandNotTemp)?;
                out.extend(ccall2_with_size_literal(FPU_READ_HELPER, addr_temp, size, &mut temps));
                out.push(op.clone());
            }
            OpClass::FpuWrite { size, addr_operand } => {
                let addr_temp = op.operands[addr_operand].as_temp().ok_or(InstrumentError::AddressOperandNotTemp)?;
                out.extend(ccall2_with_size_literal(FPU_WRITE_HELPER, addr_temp, size, &mut temps));
                out.push(op.clone());
            }
        }
    }

    Ok(out)
}
