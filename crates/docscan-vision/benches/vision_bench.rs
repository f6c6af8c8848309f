// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the per-frame analysis and the post-capture warp.
// The analysis tick has to fit inside the ~60 ms loop period on a VGA frame.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use docscan_core::{QualityThresholds, Quad};
use docscan_vision::synthetic::render_page;
use docscan_vision::{FrameEvaluator, PerspectiveCorrector};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Full evaluation (detection plus every quality check) of a 640x480 frame
/// containing a sharp page.
fn bench_evaluate_frame(c: &mut Criterion) {
    let frame = render_page(640, 480, &Quad::from_rect(170.0, 40.0, 300.0, 400.0));
    let evaluator = FrameEvaluator::new(QualityThresholds::live());
    let previous = Quad::from_rect(168.0, 38.0, 304.0, 404.0);

    c.bench_function("evaluate_frame (640x480)", |b| {
        b.iter(|| {
            let evaluation = evaluator.evaluate(black_box(&frame), Some(&previous));
            black_box(evaluation.ok());
        });
    });
}

/// Perspective correction of a slightly skewed page out of a 1280x960 still.
fn bench_perspective_warp(c: &mut Criterion) {
    let quad = Quad::from_points([
        (330.0, 70.0).into(),
        (950.0, 90.0).into(),
        (930.0, 890.0).into(),
        (350.0, 870.0).into(),
    ]);
    let frame = render_page(1280, 960, &quad);
    let corrector = PerspectiveCorrector::new();

    c.bench_function("perspective_warp (1280x960)", |b| {
        b.iter(|| {
            let warped = corrector.warp(black_box(&frame), &quad);
            black_box(warped.ok());
        });
    });
}

criterion_group!(benches, bench_evaluate_frame, bench_perspective_warp);
criterion_main!(benches);
