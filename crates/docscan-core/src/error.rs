// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for docscan.

use thiserror::Error;

/// Top-level error type for all scanning operations.
#[derive(Debug, Error)]
pub enum ScanError {
    // -- Acquisition errors (fatal to the session) --
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("camera stream already released")]
    CameraReleased,

    #[error("vision engine never became ready")]
    EngineUnavailable,

    // -- Per-frame / processing errors --
    #[error("frame analysis failed: {0}")]
    FrameAnalysis(String),

    #[error("degenerate quadrilateral: {0}")]
    DegenerateQuad(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("enhancement failed: {0}")]
    Enhancement(String),

    // -- Session lifecycle --
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanError>;

/// How a failure propagates through a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Ends the session; the user must close and reopen the scanner.
    Fatal,
    /// Logged, the frame is skipped and the loop keeps running.
    Transient,
    /// Falls back to a less-processed but still usable image.
    Degraded,
}

/// Classify a `ScanError` by how the session must react to it.
pub fn classify_error(err: &ScanError) -> ErrorClass {
    match err {
        ScanError::PermissionDenied
        | ScanError::CameraUnavailable(_)
        | ScanError::EngineUnavailable
        | ScanError::Config(_) => ErrorClass::Fatal,

        ScanError::FrameAnalysis(_) | ScanError::CameraReleased => ErrorClass::Transient,

        ScanError::DegenerateQuad(_) | ScanError::Enhancement(_) | ScanError::ImageError(_) => {
            ErrorClass::Degraded
        }

        // Lifecycle misuse is a caller bug, not a user-facing session failure.
        ScanError::InvalidState { .. } => ErrorClass::Transient,

        ScanError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::NotFound => {
                ErrorClass::Fatal
            }
            _ => ErrorClass::Transient,
        },
        ScanError::Serialization(_) => ErrorClass::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquisition_errors_are_fatal() {
        assert_eq!(classify_error(&ScanError::PermissionDenied), ErrorClass::Fatal);
        assert_eq!(
            classify_error(&ScanError::CameraUnavailable("no device".into())),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn processing_failures_degrade() {
        assert_eq!(
            classify_error(&ScanError::DegenerateQuad("zero area".into())),
            ErrorClass::Degraded
        );
        assert_eq!(
            classify_error(&ScanError::Enhancement("empty".into())),
            ErrorClass::Degraded
        );
        assert_eq!(
            classify_error(&ScanError::FrameAnalysis("bad tick".into())),
            ErrorClass::Transient
        );
    }

    #[test]
    fn invalid_state_message_names_operation() {
        let err = ScanError::InvalidState {
            operation: "confirm",
            state: "Searching".into(),
        };
        assert_eq!(err.to_string(), "cannot confirm while session is Searching");
    }
}
