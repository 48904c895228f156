//! Opcode classification — decides which instrumentation action (if any)
//! a micro-op needs. [`classify`] is a total function returning
//! [`OpClass::PassThrough`] for any opcode not otherwise named.

use crate::types::{MicroOp, Opcode};

/// What the instrumenter should do with a micro-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    /// Copy unchanged: pure compute/control, NOP/LOCK/CALLM, or an opcode
    /// this dialect doesn't recognise.
    PassThrough,
    /// `Load` of `size` bytes through the temp at `addr_operand`.
    Load { size: u32, addr_operand: usize },
    /// `Store` of `size` bytes through the temp at `addr_operand`.
    Store { size: u32, addr_operand: usize },
    /// FPU/vector memory read of `size` bytes through `addr_operand`.
    FpuRead { size: u32, addr_operand: usize },
    /// FPU/vector memory write of `size` bytes through `addr_operand`.
    FpuWrite { size: u32, addr_operand: usize },
}

/// Classify a micro-op. `addr_operand` indices follow the original's
/// `val1`/`val2`/`val3` convention: loads carry the address in slot 0,
/// stores in slot 1 (value is slot 0), and the FPU/vector families use
/// whichever slot the originating opcode variant designates (mirrored here
/// as slot 1, matching `do_Access_ARG2`, the common case for `FPU_R`/`FPU_W`).
pub fn classify(op: &MicroOp) -> OpClass {
    match &op.opcode {
        Opcode::Load => OpClass::Load { size: op.size, addr_operand: 0 },
        Opcode::Store => OpClass::Store { size: op.size, addr_operand: 1 },
        Opcode::FpuMemRead => OpClass::FpuRead { size: op.size, addr_operand: 1 },
        Opcode::FpuMemWrite => OpClass::FpuWrite { size: op.size, addr_operand: 1 },
        Opcode::Nop
        | Opcode::Lock
        | Opcode::CallmEntry
        | Opcode::CallmExit
        | Opcode::Compute
        | Opcode::RegOnlyVector
        | Opcode::Ccall(_)
        | Opcode::Other(_) => OpClass::PassThrough,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Operand;

    #[test]
    fn load_classifies_with_addr_in_slot_zero() {
        let op = MicroOp::new(Opcode::Load, 4, [Operand::Temp(1), Operand::Unused, Operand::Unused]);
        assert_eq!(classify(&op), OpClass::Load { size: 4, addr_operand: 0 });
    }

    #[test]
    fn store_classifies_with_addr_in_slot_one() {
        let op = MicroOp::new(Opcode::Store, 2, [Operand::Temp(3), Operand::Temp(1), Operand::Unused]);
        assert_eq!(classify(&op), OpClass::Store { size: 2, addr_operand: 1 });
    }

    #[test]
    fn unknown_opcode_passes_through() {
        let op = MicroOp::new(Opcode::Other("SSE5".into()), 16, [Operand::Unused; 3]);
        assert_eq!(classify(&op), OpClass::PassThrough);
    }

    #[test]
    fn register_only_vector_passes_through() {
        let op = MicroOp::new(Opcode::RegOnlyVector, 4, [Operand::Temp(0); 3]);
        assert_eq!(classify(&op), OpClass::PassThrough);
    }
}
