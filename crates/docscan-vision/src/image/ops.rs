// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stateless numerical image operations shared by the evaluator, the static
// validator and the enhancer: luminance statistics, Laplacian sharpness,
// quad-masked regions and their tiles, integral images and Otsu
// thresholding.

use docscan_core::{Point, Quad, Rect};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::laplacian_filter;

/// Signed Laplacian response of a grayscale image.
pub type LaplacianImage = ImageBuffer<Luma<i16>, Vec<i16>>;

/// 256-bin histogram of luminance values.
#[derive(Debug, Clone)]
pub struct LumaHistogram {
    bins: [u64; 256],
    total: u64,
}

impl LumaHistogram {
    /// Histogram of the whole image.
    pub fn from_luma(image: &GrayImage) -> Self {
        let mut bins = [0u64; 256];
        for pixel in image.pixels() {
            bins[usize::from(pixel.0[0])] += 1;
        }
        let total = bins.iter().sum();
        Self { bins, total }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Mean luminance (0-255).
    pub fn mean(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let sum: u64 = self
            .bins
            .iter()
            .enumerate()
            .map(|(i, &count)| i as u64 * count)
            .sum();
        sum as f64 / self.total as f64
    }

    /// Standard deviation of luminance; used as the global contrast measure.
    pub fn std_dev(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .bins
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                let diff = i as f64 - mean;
                diff * diff * count as f64
            })
            .sum::<f64>()
            / self.total as f64;
        variance.sqrt()
    }

    /// Luminance at percentile `p` (0.0-1.0).
    pub fn percentile(&self, p: f64) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let target = (self.total as f64 * p.clamp(0.0, 1.0)).round() as u64;
        let mut cumulative = 0u64;
        for (i, &count) in self.bins.iter().enumerate() {
            cumulative += count;
            if cumulative >= target.max(1) {
                return i as u8;
            }
        }
        255
    }

    /// Otsu threshold: the split that maximises between-class variance.
    pub fn otsu_threshold(&self) -> u8 {
        if self.total == 0 {
            return 128;
        }

        let sum_total: f64 = self
            .bins
            .iter()
            .enumerate()
            .map(|(i, &count)| i as f64 * count as f64)
            .sum();

        let mut sum_background = 0.0f64;
        let mut weight_background = 0u64;
        let mut max_variance = 0.0f64;
        let mut best_threshold = 0u8;

        for (t, &count) in self.bins.iter().enumerate() {
            weight_background += count;
            if weight_background == 0 {
                continue;
            }
            let weight_foreground = self.total - weight_background;
            if weight_foreground == 0 {
                break;
            }

            sum_background += t as f64 * count as f64;
            let mean_background = sum_background / weight_background as f64;
            let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;

            let between = weight_background as f64
                * weight_foreground as f64
                * (mean_background - mean_foreground).powi(2);

            if between > max_variance {
                max_variance = between;
                best_threshold = t as u8;
            }
        }

        best_threshold
    }
}

/// Laplacian (4-neighbour kernel) of a grayscale image.
pub fn laplacian(gray: &GrayImage) -> LaplacianImage {
    laplacian_filter(gray)
}

/// Variance of the Laplacian over the whole image. Higher is sharper.
///
/// Images smaller than 3x3 have no meaningful response and score 0.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }
    let response = laplacian(gray);
    response_variance(&response, &Region::whole(width, height))
}

/// Tiles with fewer than this fraction of their pixels inside the region's
/// mask are left out of per-tile statistics.
pub const MIN_TILE_COVERAGE: f64 = 0.25;

/// Pixels to measure: a rectangle, optionally restricted to those whose
/// centres fall inside a convex quad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub bounds: Rect,
    mask: Option<Quad>,
}

impl Region {
    pub fn rect(bounds: Rect) -> Self {
        Self { bounds, mask: None }
    }

    /// Rectangle covering a whole `width x height` image.
    pub fn whole(width: u32, height: u32) -> Self {
        Self::rect(full_rect(width, height))
    }

    /// Pixels inside `quad`, clipped to a `width x height` image.
    pub fn within(quad: &Quad, width: u32, height: u32) -> Self {
        Self {
            bounds: Rect::enclosing(quad, width, height),
            mask: Some(*quad),
        }
    }

    pub fn includes(&self, x: u32, y: u32) -> bool {
        self.mask
            .is_none_or(|quad| quad.contains(Point::new(x as f32 + 0.5, y as f32 + 0.5)))
    }

    /// Split into a `grid x grid` arrangement sharing this region's mask.
    pub fn tiles(&self, grid: u32) -> Vec<Region> {
        grid_tiles(self.bounds, grid)
            .into_iter()
            .map(|bounds| Region { bounds, mask: self.mask })
            .collect()
    }

    /// Visit every included pixel of a `width x height` image.
    fn for_each_pixel(&self, width: u32, height: u32, mut visit: impl FnMut(u32, u32)) {
        let rect = clip(self.bounds, width, height);
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                if self.includes(x, y) {
                    visit(x, y);
                }
            }
        }
    }
}

/// Running count, sum and sum of squares.
#[derive(Debug, Default, Clone, Copy)]
struct Moments {
    count: u64,
    sum: f64,
    sum_sq: f64,
}

impl Moments {
    fn push(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        self.sum_sq += v * v;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mean = self.mean();
        (self.sum_sq / self.count as f64 - mean * mean).max(0.0)
    }

    /// Whether enough of `region`'s bounding box was included.
    fn covers(&self, region: &Region) -> bool {
        let area = region.bounds.width as u64 * region.bounds.height as u64;
        area > 0 && self.count as f64 >= area as f64 * MIN_TILE_COVERAGE
    }
}

fn response_moments(response: &LaplacianImage, region: &Region) -> Moments {
    let mut moments = Moments::default();
    region.for_each_pixel(response.width(), response.height(), |x, y| {
        moments.push(response.get_pixel(x, y).0[0] as f64)
    });
    moments
}

fn brightness_moments(gray: &GrayImage, region: &Region) -> Moments {
    let mut moments = Moments::default();
    region.for_each_pixel(gray.width(), gray.height(), |x, y| {
        moments.push(gray.get_pixel(x, y).0[0] as f64)
    });
    moments
}

/// Variance of a precomputed Laplacian response inside `region`.
pub fn response_variance(response: &LaplacianImage, region: &Region) -> f64 {
    response_moments(response, region).variance()
}

/// Mean luminance inside `region`.
pub fn mean_brightness(gray: &GrayImage, region: &Region) -> f64 {
    brightness_moments(gray, region).mean()
}

/// Split `rect` into a `grid x grid` arrangement of tiles. The last row and
/// column absorb any remainder. Empty tiles are omitted.
pub fn grid_tiles(rect: Rect, grid: u32) -> Vec<Rect> {
    if grid == 0 || rect.is_empty() {
        return Vec::new();
    }
    let tile_w = rect.width / grid;
    let tile_h = rect.height / grid;
    let mut tiles = Vec::with_capacity((grid * grid) as usize);
    for row in 0..grid {
        for col in 0..grid {
            let x = rect.x + col * tile_w;
            let y = rect.y + row * tile_h;
            let width = if col + 1 == grid { rect.x + rect.width - x } else { tile_w };
            let height = if row + 1 == grid { rect.y + rect.height - y } else { tile_h };
            let tile = Rect { x, y, width, height };
            if !tile.is_empty() {
                tiles.push(tile);
            }
        }
    }
    tiles
}

/// Max-minus-min tile brightness over a grid. `None` when fewer than two
/// tiles are sufficiently covered by the region.
pub fn brightness_spread(gray: &GrayImage, roi: &Region, grid: u32) -> Option<f64> {
    let means: Vec<f64> = roi
        .tiles(grid)
        .iter()
        .map(|tile| (tile, brightness_moments(gray, tile)))
        .filter(|(tile, moments)| moments.covers(tile))
        .map(|(_, moments)| moments.mean())
        .collect();
    if means.len() < 2 {
        return None;
    }
    let max = means.iter().copied().fold(f64::MIN, f64::max);
    let min = means.iter().copied().fold(f64::MAX, f64::min);
    Some(max - min)
}

/// Lowest per-tile Laplacian variance over a grid, skipping tiles the
/// region barely covers.
pub fn min_tile_sharpness(response: &LaplacianImage, roi: &Region, grid: u32) -> Option<f64> {
    roi.tiles(grid)
        .iter()
        .map(|tile| (tile, response_moments(response, tile)))
        .filter(|(tile, moments)| moments.covers(tile))
        .map(|(_, moments)| moments.variance())
        .min_by(|a, b| a.total_cmp(b))
}

/// Bounding box of pixels darker than `threshold` (typically ink on paper).
pub fn dark_content_bounds(gray: &GrayImage, threshold: u8) -> Option<Rect> {
    let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0u32, 0u32);
    let mut found = false;
    for (x, y, pixel) in gray.enumerate_pixels() {
        if pixel.0[0] < threshold {
            found = true;
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
    }
    found.then(|| Rect {
        x: x0,
        y: y0,
        width: x1 - x0 + 1,
        height: y1 - y0 + 1,
    })
}

/// Rectangle covering a whole `width x height` image.
pub fn full_rect(width: u32, height: u32) -> Rect {
    Rect { x: 0, y: 0, width, height }
}

fn clip(rect: Rect, width: u32, height: u32) -> Rect {
    let x = rect.x.min(width);
    let y = rect.y.min(height);
    Rect {
        x,
        y,
        width: rect.width.min(width - x),
        height: rect.height.min(height - y),
    }
}

// -- Integral image helpers ---------------------------------------------------

/// Summed-area table of a grayscale image.
///
/// `table[y * (width+1) + x]` holds the sum of all pixels in `[0, x) x [0, y)`.
/// The table has dimensions `(width+1) x (height+1)` with a zero border.
pub struct IntegralImage {
    table: Vec<u64>,
    width: u32,
    height: u32,
}

impl IntegralImage {
    pub fn new(gray: &GrayImage) -> Self {
        let (w, h) = gray.dimensions();
        let stride = (w + 1) as usize;
        let mut table = vec![0u64; stride * (h + 1) as usize];

        for y in 0..h {
            let mut row_sum = 0u64;
            for x in 0..w {
                row_sum += gray.get_pixel(x, y).0[0] as u64;
                let idx = (y + 1) as usize * stride + (x + 1) as usize;
                let above = y as usize * stride + (x + 1) as usize;
                table[idx] = row_sum + table[above];
            }
        }

        Self { table, width: w, height: h }
    }

    /// Mean pixel value in the square of `radius` around `(cx, cy)`,
    /// clamped to the image.
    pub fn local_mean(&self, cx: u32, cy: u32, radius: u32) -> f64 {
        let stride = (self.width + 1) as usize;

        let x1 = cx.saturating_sub(radius) as usize;
        let y1 = cy.saturating_sub(radius) as usize;
        let x2 = ((cx + radius + 1) as usize).min(self.width as usize);
        let y2 = ((cy + radius + 1) as usize).min(self.height as usize);

        let area = ((x2 - x1) * (y2 - y1)) as f64;
        if area == 0.0 {
            return 128.0;
        }

        let sum = self.table[y2 * stride + x2] as f64 - self.table[y1 * stride + x2] as f64
            - self.table[y2 * stride + x1] as f64
            + self.table[y1 * stride + x1] as f64;

        sum / area
    }
}
