// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hand-off of confirmed scans to a local directory.
//
// Stands in for the upload service on desktop: the JPEG is written under
// its logical file name with a JSON sidecar describing the capture.

use std::path::{Path, PathBuf};

use docscan_capture::{ScanResult, UploadCollaborator};
use docscan_core::error::Result;
use tracing::{error, info};

pub struct DirectoryUpload {
    dir: PathBuf,
}

impl DirectoryUpload {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the JPEG for `result` lands.
    pub fn image_path(&self, result: &ScanResult) -> PathBuf {
        self.dir.join(&result.file_name)
    }

    /// Where the metadata sidecar for `result` lands.
    pub fn sidecar_path(&self, result: &ScanResult) -> PathBuf {
        self.image_path(result).with_extension("json")
    }

    /// Write the JPEG and its sidecar. Returns the JPEG path.
    pub fn write(&self, result: &ScanResult) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let image_path = self.image_path(result);
        std::fs::write(&image_path, &result.jpeg)?;

        let sidecar = serde_json::to_string_pretty(result)?;
        std::fs::write(self.sidecar_path(result), sidecar)?;
        Ok(image_path)
    }
}

impl UploadCollaborator for DirectoryUpload {
    fn hand_off(&self, result: &ScanResult) {
        match self.write(result) {
            Ok(path) => info!(
                path = %path.display(),
                bytes = result.byte_len(),
                session = %result.session_id,
                "scan handed off"
            ),
            Err(err) => error!(
                error = %err,
                dir = %self.dir.display(),
                session = %result.session_id,
                "scan could not be written"
            ),
        }
    }
}
