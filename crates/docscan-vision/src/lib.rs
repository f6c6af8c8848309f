// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan-vision — Image analysis for the docscan capture pipeline.
//
// Provides frame quality evaluation (sharpness, lighting, shadow, tilt,
// cutoff), document boundary detection, perspective correction, readability
// enhancement and one-shot validation of still images.

pub mod detect;
pub mod engine;
pub mod frame;
pub mod image;
pub mod quality;
pub mod scan;
pub mod synthetic;
pub mod validate;

// Re-export the primary structs so callers can use `docscan_vision::VisionEngine` etc.
pub use engine::VisionEngine;
pub use frame::Frame;
pub use self::image::processor::ImageProcessor;
pub use quality::{Evaluation, FrameEvaluator, QualityReport};
pub use scan::{PerspectiveCorrector, ScanEnhancer};
pub use validate::{StaticValidation, StaticValidator, ValidationIssue, ValidationKind};
