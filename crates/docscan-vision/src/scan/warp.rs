// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective correction — map the four document corners onto an upright
// rectangle.

use docscan_core::Quad;
use docscan_core::error::{Result, ScanError};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, info, instrument};

/// Sides shorter than this (px) cannot be rectified meaningfully.
const MIN_SIDE: f32 = 2.0;

/// Warps a quadrilateral region of an image to a rectangle.
///
/// The output is as wide as the longer of the top and bottom edges and as
/// tall as the longer of the left and right edges, so no detail is lost to
/// downsampling.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerspectiveCorrector;

impl PerspectiveCorrector {
    pub fn new() -> Self {
        Self
    }

    /// Output dimensions for `quad`.
    pub fn output_size(quad: &Quad) -> (u32, u32) {
        let width = quad.top_width().max(quad.bottom_width()).round();
        let height = quad.left_height().max(quad.right_height()).round();
        (width.max(0.0) as u32, height.max(0.0) as u32)
    }

    /// Rectify `quad` (canonical corner order) from `image`.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn warp(&self, image: &DynamicImage, quad: &Quad) -> Result<DynamicImage> {
        if quad.area() < 1.0 {
            return Err(ScanError::DegenerateQuad(format!(
                "area {:.2} px^2 is too small",
                quad.area()
            )));
        }
        let shortest = quad
            .top_width()
            .min(quad.bottom_width())
            .min(quad.left_height())
            .min(quad.right_height());
        if shortest < MIN_SIDE {
            return Err(ScanError::DegenerateQuad(format!(
                "side of {shortest:.2} px is too short"
            )));
        }

        let (out_w, out_h) = Self::output_size(quad);
        let dest: [(f32, f32); 4] = [
            (0.0, 0.0),
            (out_w as f32, 0.0),
            (out_w as f32, out_h as f32),
            (0.0, out_h as f32),
        ];

        let projection = Projection::from_control_points(quad.as_tuples(), dest).ok_or_else(|| {
            ScanError::DegenerateQuad("projective transform is not invertible".into())
        })?;
        debug!(out_w, out_h, "projection computed");

        let rgba_input = image.to_rgba8();
        let default_pixel = Rgba([255u8, 255, 255, 255]);
        let mut output = RgbaImage::new(out_w, out_h);
        warp_into(
            &rgba_input,
            &projection,
            Interpolation::Bilinear,
            default_pixel,
            &mut output,
        );

        info!(out_w, out_h, "perspective correction applied");
        Ok(DynamicImage::ImageRgba8(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscan_core::Point;
    use image::{GrayImage, Luma};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
            Luma([((x + 2 * y) % 256) as u8])
        }))
    }

    #[test]
    fn output_size_uses_longest_edges() {
        let quad = Quad::from_points([
            Point::new(0.0, 0.0),
            Point::new(120.0, 0.0),
            Point::new(110.0, 200.0),
            Point::new(10.0, 190.0),
        ]);
        let (w, h) = PerspectiveCorrector::output_size(&quad);
        assert_eq!(w, 120);
        assert_eq!(h, 200);
    }

    #[test]
    fn axis_aligned_rectangle_is_a_plain_crop() {
        let source = gradient(200, 120);
        let quad = Quad::from_rect(20.0, 10.0, 100.0, 50.0);
        let warped = PerspectiveCorrector::new().warp(&source, &quad).expect("warp");
        assert_eq!((warped.width(), warped.height()), (100, 50));

        let src = source.to_luma8();
        let out = warped.to_luma8();
        for (x, y) in [(0, 0), (10, 5), (50, 25), (98, 48)] {
            let expected = src.get_pixel(20 + x, 10 + y).0[0] as i32;
            let actual = out.get_pixel(x, y).0[0] as i32;
            assert!((expected - actual).abs() <= 2, "({x},{y}): {actual} vs {expected}");
        }
    }

    #[test]
    fn full_frame_warp_is_idempotent() {
        let source = gradient(80, 60);
        let quad = Quad::from_rect(0.0, 0.0, 80.0, 60.0);
        let once = PerspectiveCorrector::new().warp(&source, &quad).expect("warp");
        let twice = PerspectiveCorrector::new().warp(&once, &quad).expect("warp");
        assert_eq!((once.width(), once.height()), (80, 60));
        let a = once.to_luma8();
        let b = twice.to_luma8();
        for (x, y) in [(1, 1), (40, 30), (70, 50)] {
            let diff = a.get_pixel(x, y).0[0] as i32 - b.get_pixel(x, y).0[0] as i32;
            assert!(diff.abs() <= 1);
        }
    }

    #[test]
    fn collapsed_quad_is_rejected() {
        let line = Quad::from_points([
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 0.5),
            Point::new(0.0, 0.5),
        ]);
        let err = PerspectiveCorrector::new().warp(&gradient(120, 10), &line).unwrap_err();
        assert!(matches!(err, ScanError::DegenerateQuad(_)));
    }
}
