// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan-capture — The live scanner session.
//
// Owns the camera lease, runs the analysis and tracking loops, tracks the
// document quadrilateral, fires auto-capture and drives the review flow up
// to the confirmed scan.

pub mod analyzer;
pub mod camera;
pub mod engine;
mod loops;
pub mod result;
pub mod session;
pub mod tracker;

pub use analyzer::FrameAnalyzer;
pub use camera::{
    CameraLease, FixedOrientation, FrameSource, OrientationSensor, ReplaySource, UnavailableCamera,
};
pub use engine::{EngineHandle, EngineInstaller};
pub use loops::{CaptureState, Overlay};
pub use result::{ScanResult, UploadCollaborator};
pub use session::CaptureSession;
pub use tracker::{BestFrame, Observation, QuadTracker, TrackerState};
