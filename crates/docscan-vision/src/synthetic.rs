// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic camera frames: a textured page on a dark desk. Used by tests,
// benchmarks and the replay camera when no real frames are supplied.

use docscan_core::Quad;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::filter::gaussian_blur_f32;
use imageproc::point::Point as PixelPoint;

/// Desk brightness around the page.
pub const BACKGROUND_LEVEL: u8 = 60;
/// Checker cell size of the page texture (px).
pub const TEXTURE_CELL: u32 = 8;
const TEXTURE_DARK: u8 = 110;
const TEXTURE_LIGHT: u8 = 235;

/// Blank paper border, as a fraction of the way from each corner to the
/// page centre.
pub const PAGE_MARGIN: f32 = 0.05;

/// Render a `width x height` frame with a page filling `quad` on a uniform
/// background. The page has a plain border of [`PAGE_MARGIN`] around a
/// checker-textured body.
pub fn render_page(width: u32, height: u32, quad: &Quad) -> DynamicImage {
    let page = polygon_mask(width, height, quad);
    let body = polygon_mask(width, height, &quad.shrunk(PAGE_MARGIN));

    let frame = GrayImage::from_fn(width, height, |x, y| {
        if page.get_pixel(x, y).0[0] == 0 {
            return Luma([BACKGROUND_LEVEL]);
        }
        if body.get_pixel(x, y).0[0] == 0 {
            return Luma([TEXTURE_LIGHT]);
        }
        if ((x / TEXTURE_CELL) + (y / TEXTURE_CELL)) % 2 == 0 {
            Luma([TEXTURE_LIGHT])
        } else {
            Luma([TEXTURE_DARK])
        }
    });
    DynamicImage::ImageLuma8(frame)
}

fn polygon_mask(width: u32, height: u32, quad: &Quad) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let polygon: Vec<PixelPoint<i32>> = quad
        .corners
        .iter()
        .map(|p| PixelPoint::new(p.x.round() as i32, p.y.round() as i32))
        .collect();
    draw_polygon_mut(&mut mask, &polygon, Luma([255u8]));
    mask
}

/// A featureless frame at a single brightness level.
pub fn uniform_frame(width: u32, height: u32, level: u8) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([level])))
}

/// Gaussian-blurred copy, simulating camera shake or missed focus.
pub fn defocus(image: &DynamicImage, sigma: f32) -> DynamicImage {
    DynamicImage::ImageLuma8(gaussian_blur_f32(&image.to_luma8(), sigma))
}

/// Darken the left `fraction` of the frame by `amount` levels.
pub fn cast_shadow(image: &DynamicImage, fraction: f32, amount: u8) -> DynamicImage {
    let mut gray = image.to_luma8();
    let limit = (gray.width() as f32 * fraction) as u32;
    for (x, _, pixel) in gray.enumerate_pixels_mut() {
        if x < limit {
            pixel.0[0] = pixel.0[0].saturating_sub(amount);
        }
    }
    DynamicImage::ImageLuma8(gray)
}
