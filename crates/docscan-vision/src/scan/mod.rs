// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Post-capture pipeline — perspective correction and readability
// enhancement.

pub mod enhance;
pub mod warp;

pub use enhance::ScanEnhancer;
pub use warp::PerspectiveCorrector;
