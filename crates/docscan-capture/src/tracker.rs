// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quadrilateral tracker — padding, per-corner smoothing, the slow stable
// snapshot, steadiness counting and best-frame selection.
//
// The analysis loop feeds `observe` once per evaluated frame; the tracking
// loop calls `update` and `refresh_stable` at display rate.

use std::sync::Arc;
use std::time::Instant;

use docscan_core::{Orientation, Quad, TrackerConfig};
use docscan_vision::{Evaluation, Frame};
use tracing::{debug, info};

/// Highest-scoring frame seen since the last reset.
#[derive(Debug, Clone)]
pub struct BestFrame {
    pub frame: Arc<Frame>,
    /// Padded, unsmoothed corners in frame coordinates.
    pub quad: Quad,
    /// Detected contour area times blur score.
    pub score: f64,
}

/// Everything the tracker knows. Cleared on retake and close.
#[derive(Debug, Clone, Default)]
pub struct TrackerState {
    /// Latest padded detection, unsmoothed.
    pub raw_points: Option<Quad>,
    pub smoothed_points: Option<Quad>,
    pub stable_points: Option<Quad>,
    pub steady_count: u32,
    pub best: Option<BestFrame>,
    /// Latest analysed frame, kept as a capture fallback.
    pub latest_frame: Option<Arc<Frame>>,
    /// Latest unpadded detection, fed back for detection continuity.
    pub previous_detection: Option<Quad>,
}

/// What one observed frame changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub raw: Option<Quad>,
    pub steady_count: u32,
    /// True on exactly the tick the steady count reaches the threshold.
    pub auto_capture: bool,
}

pub struct QuadTracker {
    config: TrackerConfig,
    state: TrackerState,
    last_stable_at: Option<Instant>,
}

impl QuadTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            state: TrackerState::default(),
            last_stable_at: None,
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn steady_count(&self) -> u32 {
        self.state.steady_count
    }

    pub fn best(&self) -> Option<&BestFrame> {
        self.state.best.as_ref()
    }

    /// Sort, pad and clamp a raw detection.
    pub fn prepare(&self, raw: &Quad, width: u32, height: u32) -> Quad {
        Quad::from_points(raw.corners)
            .padded(self.config.pad_long_axis, self.config.pad_short_axis)
            .clamped(width, height)
    }

    /// Record one evaluated frame.
    pub fn observe(&mut self, frame: &Arc<Frame>, evaluation: &Evaluation) -> Observation {
        let raw = evaluation
            .quad
            .as_ref()
            .map(|quad| self.prepare(quad, frame.width(), frame.height()));

        if let Some(padded) = raw {
            let score = evaluation.detected_area * evaluation.report.blur_score;
            if self.state.best.as_ref().is_none_or(|best| score > best.score) {
                debug!(score, sequence = frame.sequence, "new best frame");
                self.state.best = Some(BestFrame {
                    frame: Arc::clone(frame),
                    quad: padded,
                    score,
                });
            }
        }

        if evaluation.report.is_valid && raw.is_some() {
            self.state.steady_count += 1;
        } else {
            self.state.steady_count = 0;
        }

        self.state.raw_points = raw;
        self.state.previous_detection = evaluation.quad;
        self.state.latest_frame = Some(Arc::clone(frame));

        let auto_capture = self.state.steady_count == self.config.steady_threshold;
        if auto_capture {
            info!(steady = self.state.steady_count, "document steady");
        }

        Observation {
            raw,
            steady_count: self.state.steady_count,
            auto_capture,
        }
    }

    /// Blend the smoothed corners towards `raw`. The first detection seeds
    /// the estimate; losing the detection clears it.
    pub fn update(&mut self, raw: Option<&Quad>) -> Option<Quad> {
        self.state.smoothed_points = match (raw, self.state.smoothed_points) {
            (None, _) => None,
            (Some(target), None) => Some(*target),
            (Some(target), Some(current)) => Some(current.lerp(target, self.config.smoothing)),
        };
        self.state.smoothed_points
    }

    /// Copy the smoothed corners into the stable snapshot once per stable
    /// interval. Returns the current stable snapshot.
    pub fn refresh_stable(&mut self, now: Instant) -> Option<Quad> {
        let due = self
            .last_stable_at
            .is_none_or(|at| now.duration_since(at) >= self.config.stable_interval());
        if due {
            self.state.stable_points = self.state.smoothed_points;
            self.last_stable_at = Some(now);
        }
        self.state.stable_points
    }

    /// Orientation of the stable snapshot.
    pub fn stable_orientation(&self) -> Option<Orientation> {
        self.state.stable_points.map(|quad| quad.orientation())
    }

    pub fn reset(&mut self) {
        self.state = TrackerState::default();
        self.last_stable_at = None;
    }
}
