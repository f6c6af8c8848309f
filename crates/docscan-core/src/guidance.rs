// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-language guidance shown to field staff while scanning.
//
// Quality problems are not errors: each maps to one short instruction. Only
// one instruction is shown at a time, chosen by `QualityIssue` priority.
// Real failures (camera access) get a fuller `HumanError`.

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// How a message should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Everything looks good.
    Ok,
    /// Capture is possible but the result may suffer.
    Warning,
    /// Capture should not happen in this state.
    Error,
}

/// A single frame-quality problem.
///
/// Variants are declared in surfacing priority: when several are present,
/// the smallest one wins. Tests depend on this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssue {
    TooDark,
    Overexposed,
    NoDocument,
    CutOff,
    Tilted,
    Blurry,
    PartiallyBlurry,
    Shadow,
}

impl QualityIssue {
    /// Every issue in priority order.
    pub const ALL: [QualityIssue; 8] = [
        QualityIssue::TooDark,
        QualityIssue::Overexposed,
        QualityIssue::NoDocument,
        QualityIssue::CutOff,
        QualityIssue::Tilted,
        QualityIssue::Blurry,
        QualityIssue::PartiallyBlurry,
        QualityIssue::Shadow,
    ];

    pub fn message(&self) -> &'static str {
        match self {
            Self::TooDark => "Too Dark - Add More Light",
            Self::Overexposed => "Too Bright - Reduce Glare",
            Self::NoDocument => "No Document Detected",
            Self::CutOff => "Move Back - Document Cut Off",
            Self::Tilted => "Hold Phone Parallel to Paper",
            Self::Blurry => "Hold Steady - Image Blurry",
            Self::PartiallyBlurry => "Hold Steady - Part of Page Blurry",
            Self::Shadow => "Avoid Shadows on Paper",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::TooDark | Self::Overexposed | Self::CutOff | Self::Blurry => Severity::Error,
            Self::NoDocument | Self::Tilted | Self::PartiallyBlurry | Self::Shadow => {
                Severity::Warning
            }
        }
    }

    /// Pick the issue to surface from an unordered set.
    pub fn most_urgent(issues: impl IntoIterator<Item = QualityIssue>) -> Option<QualityIssue> {
        issues.into_iter().min()
    }
}

/// Message shown when a frame passes every check.
pub const READY_MESSAGE: &str = "Perfect - Hold Still";

/// The one instruction currently on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guidance {
    pub message: String,
    pub severity: Severity,
}

impl Guidance {
    pub fn for_issue(issue: Option<QualityIssue>) -> Self {
        match issue {
            Some(issue) => Self {
                message: issue.message().into(),
                severity: issue.severity(),
            },
            None => Self {
                message: READY_MESSAGE.into(),
                severity: Severity::Ok,
            },
        }
    }

    /// Initial text before the first frame has been analysed.
    pub fn starting() -> Self {
        Self {
            message: "Point Camera at Document".into(),
            severity: Severity::Warning,
        }
    }

    /// Banner for a failure the user has to act on.
    pub fn for_error(err: &ScanError) -> Self {
        let human = humanize_error(err);
        Self {
            message: human.message,
            severity: human.severity,
        }
    }
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether reopening the scanner could help without changing anything.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `ScanError` into something a field officer can act on.
pub fn humanize_error(err: &ScanError) -> HumanError {
    match err {
        ScanError::PermissionDenied => HumanError {
            message: "Camera access was blocked.".into(),
            suggestion: "Allow camera access in your browser or phone settings, then close and reopen the scanner.".into(),
            retriable: false,
            severity: Severity::Error,
        },

        ScanError::CameraUnavailable(_) => HumanError {
            message: "No camera could be started.".into(),
            suggestion: "Close other apps that may be using the camera, then reopen the scanner. You can also upload a photo from the gallery instead.".into(),
            retriable: true,
            severity: Severity::Error,
        },

        ScanError::EngineUnavailable => HumanError {
            message: "The scanner could not finish loading.".into(),
            suggestion: "Check your connection and reopen the scanner.".into(),
            retriable: true,
            severity: Severity::Error,
        },

        ScanError::CameraReleased | ScanError::FrameAnalysis(_) => HumanError {
            message: "The camera picture was interrupted.".into(),
            suggestion: "Hold the phone steady; scanning continues automatically.".into(),
            retriable: true,
            severity: Severity::Warning,
        },

        ScanError::DegenerateQuad(_) | ScanError::ImageError(_) | ScanError::Enhancement(_) => {
            HumanError {
                message: "The page could not be straightened.".into(),
                suggestion: "Check the preview. If the page looks wrong, press Retake.".into(),
                retriable: true,
                severity: Severity::Warning,
            }
        }

        ScanError::InvalidState { .. } => HumanError {
            message: "That action is not available right now.".into(),
            suggestion: "Wait for the current step to finish and try again.".into(),
            retriable: true,
            severity: Severity::Warning,
        },

        ScanError::Config(detail) => HumanError {
            message: "The scanner settings are invalid.".into(),
            suggestion: format!("Ask your coordinator to check the scanner settings. ({detail})"),
            retriable: false,
            severity: Severity::Error,
        },

        ScanError::Io(_) | ScanError::Serialization(_) => HumanError {
            message: "A file could not be read or saved.".into(),
            suggestion: "Make sure the device has free storage and try again.".into(),
            retriable: true,
            severity: Severity::Error,
        },
    }
}
