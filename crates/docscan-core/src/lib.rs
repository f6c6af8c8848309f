// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan — Core types, configuration, guidance text and error definitions
// shared across all crates.

pub mod config;
pub mod error;
pub mod guidance;
pub mod types;

pub use config::{EnhanceMode, QualityThresholds, ScannerConfig, SessionConfig, TrackerConfig};
pub use error::{Result, ScanError};
pub use guidance::{Guidance, QualityIssue, Severity};
pub use types::*;
