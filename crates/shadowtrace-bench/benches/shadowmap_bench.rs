//! Shadow-map access/range-operator throughput: times the hot per-byte
//! paths rather than end-to-end scenarios.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shadowtrace_shadowmap::{make_defined, make_inaccessible, ABit, ShadowMap};

fn bench_get_set_addressable(c: &mut Criterion) {
    let map = ShadowMap::new(false);
    c.bench_function("shadowmap_set_addressable", |b| {
        b.iter(|| {
            for addr in (0u32..4096).step_by(4) {
                map.set_addressable(black_box(addr), ABit::Valid);
            }
        })
    });
    c.bench_function("shadowmap_get_addressable", |b| {
        b.iter(|| {
            let mut acc = 0u32;
            for addr in (0u32..4096).step_by(4) {
                if map.get_addressable(black_box(addr)).is_valid() {
                    acc += 1;
                }
            }
            black_box(acc)
        })
    });
}

fn bench_range_operators(c: &mut Criterion) {
    let map = ShadowMap::new(false);
    c.bench_function("shadowmap_make_inaccessible_4k", |b| {
        b.iter(|| make_inaccessible(&map, black_box(0x1000), black_box(4096)))
    });
    c.bench_function("shadowmap_make_defined_4k", |b| b.iter(|| make_defined(&map, black_box(0x1000), black_box(4096))));
}

criterion_group!(benches, bench_get_set_addressable, bench_range_operators);
criterion_main!(benches);
