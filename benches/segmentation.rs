//! Benchmarks for visit detection on long tracks.
//!
//! Run with: `cargo bench --bench segmentation --features synthetic`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use geodwell::synthetic::SyntheticScenario;
use geodwell::{VisitConfig, detect_visits, normalize_fixes, refine_boundaries, segment_fixes};

const START: i64 = 1_735_689_600_000;

// ============================================================================
// 1. Scaling with track length
// ============================================================================

fn bench_detect_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_visits");
    let config = VisitConfig::default();

    for rows in [1_000, 10_000, 100_000] {
        let scenario = SyntheticScenario::demo(START, rows, 42);
        let fixes = scenario.generate();
        let Some(fence) = scenario.cluster("shanghai_lab").map(|c| c.fence(300.0)) else {
            continue;
        };

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("fixes", rows), &rows, |b, _| {
            b.iter(|| detect_visits(black_box(&fixes), &fence, &config));
        });
    }

    group.finish();
}

// ============================================================================
// 2. Pipeline stages on one track
// ============================================================================

fn bench_stages(c: &mut Criterion) {
    let scenario = SyntheticScenario::demo(START, 50_000, 7);
    let fixes = scenario.generate();
    let Some(fence) = scenario.cluster("shanghai_home").map(|c| c.fence(300.0)) else {
        return;
    };
    let config = VisitConfig::default();

    c.bench_function("normalize_50k", |b| {
        b.iter(|| normalize_fixes(black_box(fixes.clone())));
    });

    c.bench_function("segment_50k", |b| {
        b.iter(|| segment_fixes(black_box(&fixes), &fence, &config));
    });

    if let Ok(raw) = segment_fixes(&fixes, &fence, &config) {
        c.bench_function("refine_50k", |b| {
            b.iter(|| refine_boundaries(black_box(&raw), &fixes, &config));
        });
    }
}

// ============================================================================
// 3. Parallel fences
// ============================================================================

#[cfg(feature = "parallel")]
fn bench_fences(c: &mut Criterion) {
    use geodwell::detect_visits_for_fences;

    let scenario = SyntheticScenario::demo(START, 50_000, 11);
    let fixes = scenario.generate();
    let fences: Vec<_> = scenario.clusters.iter().map(|c| c.fence(300.0)).collect();
    let config = VisitConfig::default();

    c.bench_function("four_fences_parallel", |b| {
        b.iter(|| detect_visits_for_fences(black_box(&fixes), &fences, &config));
    });
}

#[cfg(not(feature = "parallel"))]
fn bench_fences(_c: &mut Criterion) {}

criterion_group!(benches, bench_detect_scaling, bench_stages, bench_fences);
criterion_main!(benches);
