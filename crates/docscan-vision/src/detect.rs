// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document boundary detection — edge map, external contours, polygon
// approximation and candidate scoring.
//
// ## Pipeline
//
// 1. Gaussian blur to suppress sensor noise
// 2. Canny edge detection
// 3. Dilation to close small gaps in the page outline
// 4. Outermost contours only (holes and nested contours are ignored)
// 5. Drop contours below the minimum area
// 6. Corner fit: diagonal extremes of the contour, snapped outward along
//    each centre-to-corner direction
// 7. Reject fits the contour strays from by more than a fraction of the
//    perimeter, or that the contour does not fill
// 8. Keep quadrilaterals whose bounding box has a page-like aspect ratio
// 9. Score by area, boosted when close to the previous frame's quad

use docscan_core::{Point, QualityThresholds, Quad};
use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::contour_area;
use imageproc::morphology::dilate;
use imageproc::point::Point as PixelPoint;
use tracing::{debug, trace};

/// Fitted corners closer than this (px) count as the same corner.
const MIN_CORNER_SEPARATION: f32 = 2.0;
/// Contour area over fitted quad area below this is not a quadrilateral.
const MIN_FILL_RATIO: f64 = 0.85;

/// Accepted document candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Corners in canonical order.
    pub quad: Quad,
    /// Contour area in px^2.
    pub area: f64,
    /// Ranking score (area, possibly boosted for continuity).
    pub score: f64,
}

/// Blurred, edge-detected and dilated binary map of `gray`.
pub fn edge_map(gray: &GrayImage, thresholds: &QualityThresholds) -> GrayImage {
    let blurred = if thresholds.edge_blur_sigma > 0.0 {
        gaussian_blur_f32(gray, thresholds.edge_blur_sigma)
    } else {
        gray.clone()
    };
    let edges = canny(&blurred, thresholds.canny_low, thresholds.canny_high);
    if thresholds.dilate_radius == 0 {
        return edges;
    }
    dilate(&edges, Norm::LInf, thresholds.dilate_radius)
}

/// Find the best document quadrilateral in `gray`.
///
/// `previous` is the quad accepted on the prior frame; a candidate whose
/// area is within `continuity_tolerance` of it has its score multiplied by
/// `continuity_bonus` so detection does not flicker between similar shapes.
pub fn detect_document(
    gray: &GrayImage,
    thresholds: &QualityThresholds,
    previous: Option<&Quad>,
) -> Option<Detection> {
    let edges = edge_map(gray, thresholds);
    let contours = find_contours::<i32>(&edges);
    let previous_area = previous.map(|quad| quad.area() as f64).filter(|a| *a > 0.0);

    let mut best: Option<Detection> = None;
    let mut examined = 0usize;

    for contour in contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
    {
        if contour.points.len() < 4 {
            continue;
        }
        let area = contour_area(&contour.points).abs();
        if area < thresholds.min_contour_area {
            continue;
        }
        examined += 1;

        let Some(quad) = approximate_quad(&contour.points, area, thresholds.approx_epsilon) else {
            continue;
        };
        if !has_page_aspect(&quad, thresholds) {
            trace!(aspect = quad.aspect_ratio(), "candidate rejected on aspect");
            continue;
        }

        let mut score = area;
        if let Some(prev) = previous_area {
            if ((area - prev) / prev).abs() <= thresholds.continuity_tolerance {
                score *= thresholds.continuity_bonus;
            }
        }

        if best.is_none_or(|b| score > b.score) {
            best = Some(Detection { quad, area, score });
        }
    }

    debug!(
        contours = contours.len(),
        examined,
        found = best.is_some(),
        "document detection complete"
    );
    best
}

fn has_page_aspect(quad: &Quad, thresholds: &QualityThresholds) -> bool {
    let aspect = quad.aspect_ratio();
    let (p_min, p_max) = thresholds.portrait_aspect;
    let (l_min, l_max) = thresholds.landscape_aspect;
    (p_min..=p_max).contains(&aspect) || (l_min..=l_max).contains(&aspect)
}

/// Fit four canonical corners to a closed contour, or `None` when the
/// outline is not a quadrilateral.
///
/// The fit does not depend on where the contour starts: corners are read off
/// the extremes of the whole point set, so a start point midway along an
/// edge cannot become a vertex.
fn approximate_quad(
    contour: &[PixelPoint<i32>],
    area: f64,
    epsilon_fraction: f64,
) -> Option<Quad> {
    let points: Vec<Point> = contour
        .iter()
        .map(|p| Point::new(p.x as f32, p.y as f32))
        .collect();

    let rough = diagonal_extremes(&points)?;
    let corners = snap_outward(&points, &rough);
    for (i, a) in corners.iter().enumerate() {
        if corners[i + 1..]
            .iter()
            .any(|b| a.distance(b) < MIN_CORNER_SEPARATION)
        {
            return None;
        }
    }
    let quad = Quad::from_points(corners);

    let epsilon = (epsilon_fraction as f32 * quad.perimeter()).max(f32::EPSILON);
    let deviation = points
        .iter()
        .map(|p| distance_to_outline(*p, &quad))
        .fold(0.0f32, f32::max);
    if deviation > epsilon {
        trace!(deviation, epsilon, "contour strays from fitted quad");
        return None;
    }

    let quad_area = quad.area() as f64;
    if quad_area <= 0.0 || area / quad_area < MIN_FILL_RATIO {
        trace!(quad_area, "contour does not fill fitted quad");
        return None;
    }
    Some(quad)
}

/// Points minimising `x + y` and `x - y` and maximising them: the corners
/// of any page rotated less than 45 degrees in-plane.
fn diagonal_extremes(points: &[Point]) -> Option<[Point; 4]> {
    let extreme = |key: fn(&Point) -> f32, want_max: bool| -> Option<Point> {
        let iter = points.iter();
        let found = if want_max {
            iter.max_by(|a, b| key(*a).total_cmp(&key(*b)))
        } else {
            iter.min_by(|a, b| key(*a).total_cmp(&key(*b)))
        };
        found.copied()
    };
    let sum = |p: &Point| p.x + p.y;
    let diff = |p: &Point| p.x - p.y;
    Some([
        extreme(sum, false)?,
        extreme(diff, true)?,
        extreme(sum, true)?,
        extreme(diff, false)?,
    ])
}

/// Move each corner to the point furthest out along the direction from the
/// rough centre to that corner.
fn snap_outward(points: &[Point], rough: &[Point; 4]) -> [Point; 4] {
    let centre = Quad { corners: *rough }.centroid();
    rough.map(|corner| {
        let (dx, dy) = (corner.x - centre.x, corner.y - centre.y);
        let reach = |p: &Point| (p.x - centre.x) * dx + (p.y - centre.y) * dy;
        points
            .iter()
            .max_by(|a, b| reach(*a).total_cmp(&reach(*b)))
            .copied()
            .unwrap_or(corner)
    })
}

fn distance_to_outline(p: Point, quad: &Quad) -> f32 {
    (0..4)
        .map(|i| distance_to_segment(p, quad.corners[i], quad.corners[(i + 1) % 4]))
        .fold(f32::MAX, f32::min)
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (abx, aby) = (b.x - a.x, b.y - a.y);
    let len_sq = abx * abx + aby * aby;
    if len_sq <= f32::EPSILON {
        return p.distance(&a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    p.distance(&Point::new(a.x + abx * t, a.y + aby * t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{BACKGROUND_LEVEL, render_page};

    fn gray_page(quad: &Quad) -> GrayImage {
        render_page(640, 480, quad).to_luma8()
    }

    fn assert_corners_near(found: &Quad, want: &Quad, tolerance: f32) {
        for (got, want) in found.corners.iter().zip(want.corners.iter()) {
            assert!(got.distance(want) < tolerance, "corner {got:?} too far from {want:?}");
        }
    }

    fn rotated_rect(cx: f32, cy: f32, width: f32, height: f32, degrees: f32) -> Quad {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let corner = |dx: f32, dy: f32| Point::new(cx + dx * cos - dy * sin, cy + dx * sin + dy * cos);
        let (hw, hh) = (width / 2.0, height / 2.0);
        Quad::from_points([corner(-hw, -hh), corner(hw, -hh), corner(hw, hh), corner(-hw, hh)])
    }

    #[test]
    fn detects_axis_aligned_page() {
        let page = Quad::from_rect(170.0, 40.0, 300.0, 400.0);
        let found = detect_document(&gray_page(&page), &QualityThresholds::live(), None)
            .expect("page should be detected");

        assert_corners_near(&found.quad, &page, 6.0);
        assert!(found.area > 100_000.0);
    }

    #[test]
    fn corners_hold_across_sizes_positions_and_profiles() {
        let pages = [
            Quad::from_rect(170.0, 40.0, 300.0, 400.0),
            Quad::from_rect(40.0, 30.0, 240.0, 330.0),
            Quad::from_rect(330.0, 120.0, 220.0, 300.0),
            Quad::from_rect(90.0, 100.0, 440.0, 260.0),
            Quad::from_rect(60.0, 50.0, 520.0, 380.0),
        ];
        for thresholds in [QualityThresholds::live(), QualityThresholds::still()] {
            for page in &pages {
                let found = detect_document(&gray_page(page), &thresholds, None)
                    .unwrap_or_else(|| panic!("no document for {page:?}"));
                assert_corners_near(&found.quad, page, 6.0);
            }
        }
    }

    #[test]
    fn corners_follow_in_plane_rotation() {
        for degrees in [-20.0, 12.0, 20.0] {
            let page = rotated_rect(320.0, 240.0, 280.0, 380.0, degrees);
            let found = detect_document(&gray_page(&page), &QualityThresholds::live(), None)
                .unwrap_or_else(|| panic!("no document at {degrees} degrees"));
            assert_corners_near(&found.quad, &page, 6.0);
        }
    }

    #[test]
    fn fit_ignores_where_the_contour_starts() {
        // Closed outline of a 100x150 rectangle starting midway along the top.
        let mut contour = Vec::new();
        contour.extend((50..100).map(|x| PixelPoint::new(x, 0)));
        contour.extend((0..150).map(|y| PixelPoint::new(100, y)));
        contour.extend((1..=100).rev().map(|x| PixelPoint::new(x, 150)));
        contour.extend((1..=150).rev().map(|y| PixelPoint::new(0, y)));
        contour.extend((0..50).map(|x| PixelPoint::new(x, 0)));

        let quad = approximate_quad(&contour, 15_000.0, 0.02).expect("quad");
        assert_corners_near(&quad, &Quad::from_rect(0.0, 0.0, 100.0, 150.0), 0.5);
    }

    #[test]
    fn round_outline_is_not_a_quad() {
        let contour: Vec<PixelPoint<i32>> = (0..360)
            .map(|deg| {
                let (sin, cos) = (deg as f32).to_radians().sin_cos();
                PixelPoint::new((200.0 + 100.0 * cos) as i32, (200.0 + 100.0 * sin) as i32)
            })
            .collect();
        let area = contour_area(&contour).abs();
        assert!(approximate_quad(&contour, area, 0.02).is_none());
    }

    #[test]
    fn uniform_frame_has_no_document() {
        let gray = GrayImage::from_pixel(640, 480, image::Luma([BACKGROUND_LEVEL]));
        assert!(detect_document(&gray, &QualityThresholds::live(), None).is_none());
    }

    #[test]
    fn small_blobs_are_ignored() {
        let page = Quad::from_rect(300.0, 200.0, 60.0, 80.0);
        assert!(detect_document(&gray_page(&page), &QualityThresholds::live(), None).is_none());
    }

    #[test]
    fn square_outline_is_not_a_page() {
        let square = Quad::from_rect(170.0, 90.0, 300.0, 300.0);
        assert!(detect_document(&gray_page(&square), &QualityThresholds::live(), None).is_none());
    }

    #[test]
    fn continuity_bonus_applies_to_similar_area() {
        let page = Quad::from_rect(170.0, 40.0, 300.0, 400.0);
        let gray = gray_page(&page);
        let thresholds = QualityThresholds::live();

        let plain = detect_document(&gray, &thresholds, None).expect("detected");
        let similar = Quad::from_rect(160.0, 40.0, 310.0, 410.0);
        let boosted = detect_document(&gray, &thresholds, Some(&similar)).expect("detected");
        assert!((boosted.score - plain.score * thresholds.continuity_bonus).abs() < 1e-6);

        let far = Quad::from_rect(0.0, 0.0, 100.0, 100.0);
        let unboosted = detect_document(&gray, &thresholds, Some(&far)).expect("detected");
        assert_eq!(unboosted.score, plain.score);
    }
}
