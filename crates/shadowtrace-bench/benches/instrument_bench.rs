//! UCode instrumenter throughput over a representative mixed block
//! (loads, stores, an FPU access, and pass-through compute ops), since
//! instrumentation runs on every translated block in the hot path.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shadowtrace_ucode::{instrument, FlagsEffect, MicroOp, Opcode, Operand, UCodeBlock};

fn representative_block() -> UCodeBlock {
    let mut block = Vec::new();
    for i in 0..20u32 {
        block.push(MicroOp::new(Opcode::Compute, 4, [Operand::Temp(i), Operand::Temp(i + 1), Operand::Unused]));
        block.push(MicroOp::new(Opcode::Load, 4, [Operand::Temp(i), Operand::Temp(100 + i), Operand::Unused]));
        block.push(MicroOp::new(Opcode::Store, 4, [Operand::Temp(100 + i), Operand::Temp(i), Operand::Unused]));
    }
    block.push(MicroOp::new(Opcode::FpuMemRead, 8, [Operand::Temp(200), Operand::Temp(201), Operand::Unused]));
    block.push(MicroOp {
        opcode: Opcode::Other("JMP".into()),
        size: 4,
        operands: [Operand::Unused; 3],
        literal: None,
        flags: FlagsEffect::default(),
        live_after: None,
    });
    block
}

fn bench_instrument(c: &mut Criterion) {
    let block = representative_block();
    c.bench_function("ucode_instrument_mixed_block", |b| b.iter(|| instrument(black_box(&block), black_box(0x1000)).unwrap()));
}

criterion_group!(benches, bench_instrument);
criterion_main!(benches);
