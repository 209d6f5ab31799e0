//! Tracker benchmarks using Criterion.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::DMatrix;

use deepsort_rs::{BBox, HungarianSolver, Tracker, TrackerConfig};

/// Create one frame of well-separated detections.
fn create_test_detections(n: usize, frame: usize) -> Vec<BBox> {
    (0..n)
        .map(|i| {
            let x = (i * 100) as f64 + frame as f64;
            let y = (i * 50) as f64;
            BBox::new(x, y, x + 30.0, y + 60.0)
        })
        .collect()
}

fn benchmark_tracker_update_10_objects(c: &mut Criterion) {
    let mut tracker = Tracker::new(TrackerConfig::default()).expect("valid tracker");
    // Warm up so every benchmarked frame runs the full cascade.
    for frame in 0..5 {
        tracker
            .update(&create_test_detections(10, frame))
            .expect("update");
    }

    let mut frame = 5;
    c.bench_function("tracker_update_10_objects", |b| {
        b.iter(|| {
            frame += 1;
            tracker
                .update(black_box(&create_test_detections(10, frame)))
                .expect("update");
        })
    });
}

fn benchmark_tracker_update_50_objects(c: &mut Criterion) {
    let mut tracker = Tracker::new(TrackerConfig::default()).expect("valid tracker");
    for frame in 0..5 {
        tracker
            .update(&create_test_detections(50, frame))
            .expect("update");
    }

    let mut frame = 5;
    c.bench_function("tracker_update_50_objects", |b| {
        b.iter(|| {
            frame += 1;
            tracker
                .update(black_box(&create_test_detections(50, frame)))
                .expect("update");
        })
    });
}

fn benchmark_tracker_update_100_objects(c: &mut Criterion) {
    let mut tracker = Tracker::new(TrackerConfig::default()).expect("valid tracker");
    for frame in 0..5 {
        tracker
            .update(&create_test_detections(100, frame))
            .expect("update");
    }

    let mut frame = 5;
    c.bench_function("tracker_update_100_objects", |b| {
        b.iter(|| {
            frame += 1;
            tracker
                .update(black_box(&create_test_detections(100, frame)))
                .expect("update");
        })
    });
}

fn benchmark_hungarian_solver_dense(c: &mut Criterion) {
    let mut solver = HungarianSolver::new();
    let n = 50;
    let costs = DMatrix::from_fn(n, n, |r, col| ((r * 7 + col * 13) % 97) as f64);

    c.bench_function("hungarian_solver_50x50", |b| {
        b.iter(|| solver.solve(black_box(&costs)).expect("solve"))
    });
}

criterion_group!(
    benches,
    benchmark_tracker_update_10_objects,
    benchmark_tracker_update_50_objects,
    benchmark_tracker_update_100_objects,
    benchmark_hungarian_solver_dense
);
criterion_main!(benches);
