//! Criterion benchmarks for read-side queries on a finished recording.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rewind_bench::{generate, StreamProfile};
use rewind_core::{Cycle, SolverId};
use rewind_ingest::{IngestConfig, TraceProvider};
use rewind_store::{RecordingReader, StoreConfig};

fn recording(keyframe_interval: usize) -> RecordingReader {
    let config = IngestConfig {
        store: StoreConfig { keyframe_interval },
        ..IngestConfig::default()
    };
    let mut provider = TraceProvider::new(config).unwrap();
    let reader = provider.create_session("scrub").unwrap();
    for raw in generate(&StreamProfile::reference().with_frames(200)) {
        provider.on_event(raw);
    }
    provider.flush_pending();
    provider.end_session();
    reader
}

/// Benchmark: random-access collapse cost against keyframe interval.
fn bench_collapsed_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("collapsed_frame_at");
    for interval in [1usize, 5, 20] {
        let reader = recording(interval);
        let solver = SolverId(0);
        let len = reader.solver_frame_count(solver).max(1);
        group.bench_with_input(BenchmarkId::from_parameter(interval), &reader, |b, reader| {
            let mut n = 0usize;
            b.iter(|| {
                n = (n + 37) % len;
                black_box(reader.collapsed_frame_at(solver, n).unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark: cycle and time lookups.
fn bench_lookups(c: &mut Criterion) {
    let reader = recording(5);
    let solver = SolverId(0);
    c.bench_function("frame_number_at_cycle", |b| {
        let mut cycle = 0u64;
        b.iter(|| {
            cycle = (cycle + 13) % 200;
            black_box(reader.frame_number_at_cycle(solver, Cycle(cycle)));
        });
    });
    c.bench_function("outer_frame_number_at_time", |b| {
        let mut t = 0.0f64;
        b.iter(|| {
            t = (t + 0.07) % 10.0;
            black_box(reader.outer_frame_number_at_time(t));
        });
    });
    c.bench_function("available_solvers_at_outer_frame", |b| {
        let outer = reader.outer_frame_count().max(1);
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 7) % outer;
            black_box(reader.read().available_solvers_at_outer_frame(i));
        });
    });
}

criterion_group!(benches, bench_collapsed_frame, bench_lookups);
criterion_main!(benches);
