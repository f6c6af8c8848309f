// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame quality — measurements, rules and the evaluator that ties them to
// document detection.

pub mod evaluator;
pub mod report;

pub use evaluator::{Evaluation, FrameEvaluator};
pub use report::{FrameMetrics, QualityReport};
