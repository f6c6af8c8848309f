// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The confirmed scan and the hand-off to whatever uploads it.

use chrono::{DateTime, Utc};
use docscan_core::{Rotation, SessionId};
use serde::Serialize;

/// A confirmed, encoded scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub session_id: SessionId,
    /// Logical file name for the upload.
    pub file_name: String,
    /// Encoded JPEG.
    #[serde(skip)]
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Rotation chosen by the user during review.
    pub manual_rotation: Rotation,
    /// Device orientation applied at capture.
    pub device_rotation: Rotation,
    /// Whether the perspective warp succeeded.
    pub perspective_corrected: bool,
    /// Whether the enhanced image was used.
    pub enhanced: bool,
    pub captured_at: DateTime<Utc>,
}

impl ScanResult {
    pub fn byte_len(&self) -> usize {
        self.jpeg.len()
    }
}

/// Receives confirmed scans. Upload, retry and progress reporting are the
/// collaborator's business; the session never learns the outcome.
pub trait UploadCollaborator {
    /// Fire and forget: failures are the collaborator's to log or retry.
    fn hand_off(&self, result: &ScanResult);
}
