//! Per-size access-helper throughput, covering both the fast (fully
//! addressable) and slow (invalid byte present) paths.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shadowtrace_access::{read1, read4, read8, write4};
use shadowtrace_shadowmap::{make_defined, ShadowMap};

fn bench_reads(c: &mut Criterion) {
    let map = ShadowMap::new(true);
    make_defined(&map, 0, 4096);

    c.bench_function("access_read1_fast_path", |b| b.iter(|| read1(&map, black_box(0x100))));
    c.bench_function("access_read4_fast_path", |b| b.iter(|| read4(&map, black_box(0x100), false)));
    c.bench_function("access_read8_fast_path", |b| b.iter(|| read8(&map, black_box(0x100), false)));
    c.bench_function("access_read4_slow_path_unaddressable", |b| b.iter(|| read4(&map, black_box(0x5000), false)));
}

fn bench_writes(c: &mut Criterion) {
    let map = ShadowMap::new(true);
    make_defined(&map, 0, 4096);
    c.bench_function("access_write4_fast_path", |b| b.iter(|| write4(&map, black_box(0x100))));
}

criterion_group!(benches, bench_reads, bench_writes);
criterion_main!(benches);
