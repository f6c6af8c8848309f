// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decoding, working-size downscaling, quarter-turn rotation,
// contrast adjustment and JPEG encoding of in-memory images.

use docscan_core::error::{Result, ScanError};
use docscan_core::Rotation;
use image::DynamicImage;
use image::imageops::FilterType;
use tracing::{debug, info, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping the
/// transformed image, enabling method chaining.
///
/// ```ignore
/// let jpeg = ImageProcessor::from_dynamic(corrected)
///     .rotate(Rotation::Cw90)
///     .to_jpeg_bytes(95)?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let img = image::open(path.as_ref()).map_err(|err| {
            ScanError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| ScanError::ImageError(format!("failed to decode image: {}", err)))?;
        debug!(width = img.width(), height = img.height(), "Image decoded from bytes");
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Downscale so the longer edge is at most `long_edge`, preserving aspect
    /// ratio. Returns the processor and the factor mapping working
    /// coordinates back to the original (`>= 1.0`). Never upscales.
    pub fn fit_within(self, long_edge: u32) -> (Self, f32) {
        let current = self.image.width().max(self.image.height());
        if current <= long_edge || long_edge == 0 {
            return (self, 1.0);
        }
        let resized = self.image.resize(long_edge, long_edge, FilterType::Triangle);
        let factor = current as f32 / resized.width().max(resized.height()) as f32;
        debug!(
            from = current,
            to = resized.width().max(resized.height()),
            factor,
            "Downscaled to working size"
        );
        (Self { image: resized }, factor)
    }

    /// Lossless clockwise quarter-turn rotation.
    #[instrument(skip(self))]
    pub fn rotate(self, rotation: Rotation) -> Self {
        let image = match rotation {
            Rotation::None => return self,
            Rotation::Cw90 => self.image.rotate90(),
            Rotation::Cw180 => self.image.rotate180(),
            Rotation::Cw270 => self.image.rotate270(),
        };
        debug!(degrees = rotation.degrees(), "Rotation applied");
        Self { image }
    }

    /// Adjust contrast by a factor around mid-grey. Values > 1.0 increase
    /// contrast; 1.0 is a no-op.
    #[instrument(skip(self))]
    pub fn adjust_contrast(self, factor: f32) -> Self {
        let rgba = self.image.to_rgba8();
        let contrasted = image::ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
            let image::Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let adjust = |channel: u8| -> u8 {
                let val = factor * (channel as f32 - 128.0) + 128.0;
                val.clamp(0.0, 255.0) as u8
            };
            image::Rgba([adjust(r), adjust(g), adjust(b), a])
        });

        Self {
            image: DynamicImage::ImageRgba8(contrasted),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode as JPEG with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder)
            .map_err(|err| ScanError::ImageError(format!("JPEG encoding failed: {}", err)))?;
        Ok(buffer)
    }
}
