// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for docscan: points, document quadrilaterals, rectangles
// and quarter-turn rotations.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 2D point in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Straight-line distance to `other`.
    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Linear interpolation towards `target` by `t` (0 = self, 1 = target).
    pub fn lerp(&self, target: &Point, t: f32) -> Point {
        Point {
            x: self.x + (target.x - self.x) * t,
            y: self.y + (target.y - self.y) * t,
        }
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Document orientation derived from a quadrilateral's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Ratio of opposing edge lengths (always >= 1.0).
///
/// A perfectly parallel capture of a rectangular page yields `1.0` for both.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TiltRatios {
    /// Longer of top/bottom divided by the shorter.
    pub width_ratio: f32,
    /// Longer of left/right divided by the shorter.
    pub height_ratio: f32,
}

impl TiltRatios {
    /// The worse of the two ratios.
    pub fn worst(&self) -> f32 {
        self.width_ratio.max(self.height_ratio)
    }
}

/// Four corners of a detected document in canonical order:
/// `[top_left, top_right, bottom_right, bottom_left]`.
///
/// Always construct through [`Quad::from_points`] when the input order is
/// unknown; interpolation between frames relies on the ordering being stable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub corners: [Point; 4],
}

impl Quad {
    /// Sort four arbitrary points into canonical order.
    ///
    /// Top-left has the smallest `x + y`, bottom-right the largest; top-right
    /// has the smallest `y - x`, bottom-left the largest.
    pub fn from_points(points: [Point; 4]) -> Self {
        let sum = |p: &&Point| p.x + p.y;
        let diff = |p: &&Point| p.y - p.x;

        let pick = |key: &dyn Fn(&&Point) -> f32, want_max: bool| -> Point {
            let iter = points.iter();
            let found = if want_max {
                iter.max_by(|a, b| key(a).total_cmp(&key(b)))
            } else {
                iter.min_by(|a, b| key(a).total_cmp(&key(b)))
            };
            found.copied().unwrap_or_default()
        };

        Self {
            corners: [
                pick(&sum, false),
                pick(&diff, false),
                pick(&sum, true),
                pick(&diff, true),
            ],
        }
    }

    /// Quad covering an axis-aligned rectangle.
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            corners: [
                Point::new(x, y),
                Point::new(x + width, y),
                Point::new(x + width, y + height),
                Point::new(x, y + height),
            ],
        }
    }

    pub fn top_left(&self) -> Point {
        self.corners[0]
    }

    pub fn top_right(&self) -> Point {
        self.corners[1]
    }

    pub fn bottom_right(&self) -> Point {
        self.corners[2]
    }

    pub fn bottom_left(&self) -> Point {
        self.corners[3]
    }

    pub fn top_width(&self) -> f32 {
        self.corners[0].distance(&self.corners[1])
    }

    pub fn bottom_width(&self) -> f32 {
        self.corners[3].distance(&self.corners[2])
    }

    pub fn left_height(&self) -> f32 {
        self.corners[0].distance(&self.corners[3])
    }

    pub fn right_height(&self) -> f32 {
        self.corners[1].distance(&self.corners[2])
    }

    /// Area via the shoelace formula.
    pub fn area(&self) -> f32 {
        let n = self.corners.len();
        let mut area = 0.0f32;
        for i in 0..n {
            let j = (i + 1) % n;
            area += self.corners[i].x * self.corners[j].y;
            area -= self.corners[j].x * self.corners[i].y;
        }
        area.abs() / 2.0
    }

    pub fn perimeter(&self) -> f32 {
        self.top_width() + self.right_height() + self.bottom_width() + self.left_height()
    }

    /// Whether `p` lies inside or on the quad. Assumes a convex quad.
    pub fn contains(&self, p: Point) -> bool {
        let mut sign = 0.0f32;
        for (i, a) in self.corners.iter().enumerate() {
            let b = self.corners[(i + 1) % 4];
            let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
            if cross == 0.0 {
                continue;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    /// Pull every corner `fraction` of the way towards the centroid.
    pub fn shrunk(&self, fraction: f32) -> Quad {
        let centre = self.centroid();
        self.lerp(&Quad { corners: [centre; 4] }, fraction.clamp(0.0, 1.0))
    }

    pub fn centroid(&self) -> Point {
        let (sx, sy) = self
            .corners
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / 4.0, sy / 4.0)
    }

    /// Axis-aligned bounds as `(min_x, min_y, max_x, max_y)`.
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        self.corners.iter().fold(
            (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }

    /// Bounding-box width divided by height.
    pub fn aspect_ratio(&self) -> f32 {
        let (x0, y0, x1, y1) = self.bounds();
        let height = y1 - y0;
        if height <= f32::EPSILON {
            return f32::INFINITY;
        }
        (x1 - x0) / height
    }

    pub fn orientation(&self) -> Orientation {
        if self.aspect_ratio() > 1.0 {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    /// Opposing-edge ratios used for the parallel-capture check.
    pub fn tilt(&self) -> TiltRatios {
        TiltRatios {
            width_ratio: edge_ratio(self.top_width(), self.bottom_width()),
            height_ratio: edge_ratio(self.left_height(), self.right_height()),
        }
    }

    /// Per-corner interpolation towards `target`. Corners never influence
    /// each other.
    pub fn lerp(&self, target: &Quad, t: f32) -> Quad {
        let mut corners = self.corners;
        for (corner, goal) in corners.iter_mut().zip(target.corners.iter()) {
            *corner = corner.lerp(goal, t);
        }
        Quad { corners }
    }

    /// Expand outward from the centroid.
    ///
    /// `long_axis` and `short_axis` are fractions of the quad's bounding box
    /// extent along that axis. Portrait documents get `long_axis` padding at
    /// the top and bottom, landscape documents at the left and right.
    pub fn padded(&self, long_axis: f32, short_axis: f32) -> Quad {
        let (x0, y0, x1, y1) = self.bounds();
        let (width, height) = (x1 - x0, y1 - y0);
        let (pad_x, pad_y) = match self.orientation() {
            Orientation::Portrait => (width * short_axis, height * long_axis),
            Orientation::Landscape => (width * long_axis, height * short_axis),
        };

        let centre = self.centroid();
        let mut corners = self.corners;
        for corner in corners.iter_mut() {
            corner.x += signum_or_zero(corner.x - centre.x) * pad_x;
            corner.y += signum_or_zero(corner.y - centre.y) * pad_y;
        }
        Quad { corners }
    }

    /// Clamp every corner into `[0, width - 1] x [0, height - 1]`.
    pub fn clamped(&self, width: u32, height: u32) -> Quad {
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;
        let mut corners = self.corners;
        for corner in corners.iter_mut() {
            corner.x = corner.x.clamp(0.0, max_x);
            corner.y = corner.y.clamp(0.0, max_y);
        }
        Quad { corners }
    }

    /// Uniformly scale all coordinates (used to map working-resolution
    /// detections back to the source image).
    pub fn scaled(&self, factor: f32) -> Quad {
        let mut corners = self.corners;
        for corner in corners.iter_mut() {
            corner.x *= factor;
            corner.y *= factor;
        }
        Quad { corners }
    }

    /// Whether any corner lies within `margin` pixels of the frame edge.
    pub fn touches_border(&self, width: u32, height: u32, margin: f32) -> bool {
        let (w, h) = (width as f32, height as f32);
        self.corners
            .iter()
            .any(|p| p.x < margin || p.y < margin || p.x > w - margin || p.y > h - margin)
    }

    pub fn as_tuples(&self) -> [(f32, f32); 4] {
        self.corners.map(|p| (p.x, p.y))
    }
}

fn edge_ratio(a: f32, b: f32) -> f32 {
    let (long, short) = if a >= b { (a, b) } else { (b, a) };
    if short <= f32::EPSILON {
        return f32::INFINITY;
    }
    long / short
}

fn signum_or_zero(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Integer pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Smallest rectangle containing `quad`, clipped to the image.
    pub fn enclosing(quad: &Quad, image_width: u32, image_height: u32) -> Self {
        let (x0, y0, x1, y1) = quad.bounds();
        let x = x0.max(0.0).floor() as u32;
        let y = y0.max(0.0).floor() as u32;
        let right = (x1.ceil().max(0.0) as u32).min(image_width);
        let bottom = (y1.ceil().max(0.0) as u32).min(image_height);
        Self {
            x: x.min(image_width),
            y: y.min(image_height),
            width: right.saturating_sub(x),
            height: bottom.saturating_sub(y),
        }
    }

    /// Shrink by `fraction` of the width/height on every side.
    pub fn inset(&self, fraction: f32) -> Self {
        let dx = (self.width as f32 * fraction).round() as u32;
        let dy = (self.height as f32 * fraction).round() as u32;
        Self {
            x: self.x + dx,
            y: self.y + dy,
            width: self.width.saturating_sub(dx * 2),
            height: self.height.saturating_sub(dy * 2),
        }
    }

    /// Multiply every coordinate by `factor`, rounding outward.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            x: (self.x as f32 * factor).floor() as u32,
            y: (self.y as f32 * factor).floor() as u32,
            width: (self.width as f32 * factor).ceil() as u32,
            height: (self.height as f32 * factor).ceil() as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Clockwise quarter-turn rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Parse an angle in degrees. Only multiples of 90 are accepted;
    /// negative angles are counter-clockwise.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::None),
            90 => Some(Self::Cw90),
            180 => Some(Self::Cw180),
            270 => Some(Self::Cw270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }

    /// One more quarter turn clockwise.
    pub fn turned_right(self) -> Self {
        self.then(Self::Cw90)
    }

    /// One quarter turn counter-clockwise.
    pub fn turned_left(self) -> Self {
        self.then(Self::Cw270)
    }

    /// Apply `other` after `self`.
    pub fn then(self, other: Rotation) -> Self {
        Self::from_degrees((self.degrees() + other.degrees()) as i32).unwrap_or_default()
    }
}
