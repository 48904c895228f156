//! Backward liveness analysis over real (guest) registers.
//!
//! Computes, for each micro-op, the bitmap of real registers live
//! immediately after it executes. This pass runs once per block before
//! (or after) instrumentation; the instrumenter itself does not need the
//! result to do its job (the `t_addr` temp it reads is always live by
//! construction, since it is used again immediately by the copied
//! original instruction), but tools and the external register allocator
//! consume it.

use crate::types::{MicroOp, Opcode, Operand};

/// Which operand slots of an opcode are reads vs. writes, for the purpose
/// of register-liveness propagation. Conservative convention: slot 0 is
/// always a read (address/value), the last slot of a multi-operand opcode
/// is the write (destination), matching the common two-operand-source,
/// one-operand-dest shape of compute micro-ops; memory ops use the
/// load/store-specific convention from [`crate::classify`].
fn read_write_slots(op: &MicroOp) -> (&'static [usize], &'static [usize]) {
    match op.opcode {
        Opcode::Load => (&[0], &[1]),
        Opcode::Store => (&[0, 1], &[]),
        Opcode::FpuMemRead => (&[1], &[]),
        Opcode::FpuMemWrite => (&[0, 1], &[]),
        Opcode::Compute | Opcode::RegOnlyVector => (&[0, 1], &[2]),
        Opcode::Nop | Opcode::Lock | Opcode::CallmEntry | Opcode::CallmExit => (&[], &[]),
        Opcode::Ccall(_) | Opcode::Other(_) => (&[0, 1, 2], &[]),
    }
}

fn reg_bit(operand: Operand) -> Option<u64> {
    match operand {
        Operand::Reg(r) if r < 64 => Some(1u64 << r),
        _ => None,
    }
}

/// Run backward liveness analysis over `block`, filling in `live_after` on
/// every micro-op in place.
pub fn analyze(block: &mut [MicroOp]) {
    let mut live: u64 = 0;
    for op in block.iter_mut().rev() {
        op.live_after = Some(live);
        let (reads, writes) = read_write_slots(op);
        for &slot in writes {
            if let Some(bit) = reg_bit(op.operands[slot]) {
                live &= !bit;
            }
        }
        for &slot in reads {
            if let Some(bit) = reg_bit(op.operands[slot]) {
                live |= bit;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MicroOp, Opcode, Operand};

    #[test]
    fn register_read_after_last_use_is_not_live() {
        let mut block = vec![
            MicroOp::new(Opcode::Compute, 4, [Operand::Reg(1), Operand::Reg(2), Operand::Reg(3)]),
            MicroOp::new(Opcode::Nop, 0, [Operand::Unused; 3]),
        ];
        analyze(&mut block);
        // Nothing reads r1/r2/r3 after the Compute instruction itself.
        assert_eq!(block[1].live_after.unwrap() & 0b1110, 0);
    }

    #[test]
    fn register_live_across_intervening_instruction() {
        let mut block = vec![
            MicroOp::new(Opcode::Load, 4, [Operand::Reg(5), Operand::Reg(6), Operand::Unused]),
            MicroOp::new(Opcode::Nop, 0, [Operand::Unused; 3]),
            MicroOp::new(Opcode::Store, 4, [Operand::Reg(6), Operand::Reg(7), Operand::Unused]),
        ];
        analyze(&mut block);
        // r6 (the Load's dest) is read by the final Store as its address;
        // it must show live immediately after the Load itself.
        assert_ne!(block[0].live_after.unwrap() & (1 << 6), 0);
    }

    #[test]
    fn write_kills_liveness_of_its_own_destination() {
        let mut block = vec![
            MicroOp::new(Opcode::Compute, 4, [Operand::Reg(1), Operand::Reg(2), Operand::Reg(3)]),
            MicroOp::new(Opcode::Compute, 4, [Operand::Reg(3), Operand::Reg(4), Operand::Reg(3)]),
        ];
        analyze(&mut block);
        // r3 is written by the second Compute before the first reads it as
        // a destination slot, so it is not live between them from the
        // second write's perspective... but r3 IS read by the second op as
        // its first source, so it must be live right after the first op.
        assert_ne!(block[0].live_after.unwrap() & (1 << 3), 0);
    }
}
