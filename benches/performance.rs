//! Performance benchmarks for token timing
//!
//! Covers the pieces that run once per sample or once per analysis: token
//! construction, record appends and the rank-sum test on large groups.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use tempfile::TempDir;
use token_timing::{
    logging::Logger,
    models::{PairedRecord, Slot, TimingSample},
    stats::{Column, Metric, RankSumAnalyzer, SampleSummary},
    JsonLinesStore, MemoryStore, SampleStore, TokenForge,
};

fn sample(token: &str, elapsed: u64, slot: Slot) -> TimingSample {
    TimingSample {
        token: token.to_string(),
        elapsed_microseconds: elapsed,
        server_runtime: Some("0.001500".to_string()),
        slot,
        status: 401,
    }
}

fn record(label: &str, i: u64) -> PairedRecord {
    PairedRecord::new(
        label,
        sample("224a93060c0dd4fb931d05083b4cb7b6a8000000", 900 + (i * 37) % 400, Slot::Zero),
        sample("224a93060c0dd4fb931d05083b4cb7b6a7000000", 905 + (i * 53) % 400, Slot::One),
        if i % 2 == 0 { Slot::Zero } else { Slot::One },
    )
}

/// Deterministic latency-like values with plenty of ties
fn latencies(count: usize, offset: u64) -> Vec<f64> {
    (0..count as u64).map(|i| (offset + (i * 7919) % 2000) as f64).collect()
}

/// Benchmark token construction
fn benchmark_token_forge(c: &mut Criterion) {
    let mut group = c.benchmark_group("token_forge");

    group.bench_function("build_default", |b| {
        b.iter(|| TokenForge::build(black_box("224a93060c0dd4fb931d05083b4cb7b6a"), black_box("8"), black_box(7)))
    });

    let forge = TokenForge::new().with_scheme("Bearer");
    group.bench_function("forge_and_header", |b| {
        b.iter(|| {
            let token = forge.forge(black_box("AAAA"), black_box("1"), black_box(64)).unwrap();
            forge.authorization_value(&token)
        })
    });

    group.finish();
}

/// Benchmark the rank-sum test at several group sizes
fn benchmark_rank_sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_sum");
    let plain = RankSumAnalyzer::new();
    let corrected = RankSumAnalyzer::new().with_tie_correction();

    for size in [100usize, 1_000, 10_000].iter() {
        let a = latencies(*size, 1_000);
        let b = latencies(*size, 1_010);

        group.bench_with_input(BenchmarkId::new("compare", size), size, |bench, _| {
            bench.iter(|| plain.compare(black_box(&a), black_box(&b)))
        });

        group.bench_with_input(BenchmarkId::new("compare_tie_corrected", size), size, |bench, _| {
            bench.iter(|| corrected.compare(black_box(&a), black_box(&b)))
        });

        group.bench_with_input(BenchmarkId::new("summary", size), size, |bench, _| {
            bench.iter(|| SampleSummary::from_values(black_box(&a)))
        });
    }

    group.finish();
}

/// Benchmark record appends and label queries
fn benchmark_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");

    group.bench_function("memory_append", |b| {
        let mut store = MemoryStore::new();
        let mut i = 0;
        b.iter(|| {
            i += 1;
            store.append(black_box(&record("bench", i))).unwrap()
        })
    });

    let dir = TempDir::new().unwrap();
    group.bench_function("jsonl_append", |b| {
        let mut store = JsonLinesStore::open_or_create(dir.path().join("append.jsonl"), &Logger::silent()).unwrap();
        let mut i = 0;
        b.iter(|| {
            i += 1;
            store.append(black_box(&record("bench", i))).unwrap()
        })
    });

    let mut store = JsonLinesStore::open_or_create(dir.path().join("query.jsonl"), &Logger::silent()).unwrap();
    for i in 0..10_000 {
        let label = if i % 4 == 0 { "target" } else { "other" };
        store.append(&record(label, i)).unwrap();
    }
    group.sample_size(20);
    group.bench_function("jsonl_query_extract_2500", |b| {
        b.iter(|| Column::extract_pair(store.query_by_label(black_box("target")).unwrap(), Metric::Elapsed).unwrap())
    });
    group.bench_function("jsonl_reopen_10000", |b| {
        b.iter(|| JsonLinesStore::open_existing(dir.path().join("query.jsonl"), &Logger::silent()).unwrap())
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_token_forge,
    benchmark_rank_sum,
    benchmark_store
);
criterion_main!(benches);
