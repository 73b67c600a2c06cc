//! Benchmarks for the entity-name similarity kernel.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use graphrag_engine::resolver::similarity::{edit_ratio, name_similarity, token_overlap};

fn bench_similarity(c: &mut Criterion) {
    let pairs = [
        ("Nvidia", "NVIDIA Corporation"),
        ("Taiwan Semiconductor Manufacturing", "TSMC"),
        ("Samsung Electronics", "Samsung Elektronics"),
        ("Advanced Micro Devices", "Applied Materials"),
    ];

    c.bench_function("edit_ratio", |b| {
        b.iter(|| {
            for (a, z) in &pairs {
                black_box(edit_ratio(black_box(a), black_box(z)));
            }
        })
    });

    c.bench_function("token_overlap", |b| {
        b.iter(|| {
            for (a, z) in &pairs {
                black_box(token_overlap(black_box(a), black_box(z)));
            }
        })
    });

    c.bench_function("name_similarity", |b| {
        b.iter(|| {
            for (a, z) in &pairs {
                black_box(name_similarity(black_box(a), black_box(z)));
            }
        })
    });
}

criterion_group!(benches, bench_similarity);
criterion_main!(benches);
