// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The two scheduled loops of a live session.
//
// - Analysis (~15 fps): grab a frame, evaluate it on the blocking pool, feed
//   the tracker and publish guidance plus the raw quad.
// - Tracking (~60 fps): smooth the latest raw quad towards the overlay and
//   refresh the stable snapshot.
//
// Both share one `LiveContext`. Results are applied only while the
// context generation matches the one the work started under; stopping a
// loop bumps the generation first so in-flight work is discarded.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use docscan_core::error::{ErrorClass, ScanError, classify_error};
use docscan_core::guidance::Guidance;
use docscan_core::{Orientation, Quad};
use docscan_vision::QualityReport;
use serde::Serialize;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use crate::analyzer::FrameAnalyzer;
use crate::camera::CameraLease;
use crate::tracker::QuadTracker;

/// Lifecycle of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Searching,
    Capturing,
    Reviewing,
    Enhancing,
    Closed,
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Searching => "searching",
            Self::Capturing => "capturing",
            Self::Reviewing => "reviewing",
            Self::Enhancing => "enhancing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What the UI draws over the camera preview.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Overlay {
    pub smoothed: Option<Quad>,
    pub stable: Option<Quad>,
    pub orientation: Option<Orientation>,
}

/// Lock a std mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the session and its loops.
pub(crate) struct LiveContext<A> {
    pub analyzer: Arc<A>,
    pub camera: Mutex<CameraLease>,
    pub tracker: Mutex<QuadTracker>,
    pub generation: AtomicU64,
    pub busy: Arc<AtomicBool>,
    pub auto_capture: bool,
    pub state: watch::Sender<CaptureState>,
    /// Single-slot cell: the latest padded raw quad, last value wins.
    pub raw: watch::Sender<Option<Quad>>,
    pub overlay: watch::Sender<Overlay>,
    pub guidance: watch::Sender<Guidance>,
    pub report: watch::Sender<Option<QualityReport>>,
    pub auto_trigger: watch::Sender<bool>,
}

impl<A: FrameAnalyzer> LiveContext<A> {
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Invalidate all in-flight loop work. Returns the new generation.
    pub fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn set_state(&self, state: CaptureState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "capture state changed");
        }
    }

    pub fn state(&self) -> CaptureState {
        *self.state.borrow()
    }

    /// Clear everything the live loops published.
    pub fn clear_live_outputs(&self) {
        self.raw.send_replace(None);
        self.overlay.send_replace(Overlay::default());
        self.guidance.send_replace(Guidance::starting());
        self.report.send_replace(None);
        self.auto_trigger.send_replace(false);
    }

    /// One analysis tick. Runs on the blocking pool.
    fn analyse(&self, generation: u64) {
        let frame = match lock(&self.camera).grab() {
            Ok(frame) => Arc::new(frame),
            Err(err) => {
                self.tick_failed(&err, "grab", generation);
                return;
            }
        };

        let previous = lock(&self.tracker).state().previous_detection;
        let evaluation = match self.analyzer.evaluate(&frame.image, previous.as_ref()) {
            Ok(evaluation) => evaluation,
            Err(err) => {
                self.tick_failed(&err, "evaluate", generation);
                return;
            }
        };

        let mut tracker = lock(&self.tracker);
        if self.current_generation() != generation || self.state() != CaptureState::Searching {
            debug!(sequence = frame.sequence, "stale analysis result discarded");
            return;
        }

        let observation = tracker.observe(&frame, &evaluation);
        drop(tracker);

        self.raw.send_replace(observation.raw);
        self.guidance.send_replace(evaluation.report.guidance());
        self.report.send_replace(Some(evaluation.report));

        trace!(
            sequence = frame.sequence,
            steady = observation.steady_count,
            "analysis tick applied"
        );

        if observation.auto_capture && self.auto_capture {
            info!(sequence = frame.sequence, "auto-capture triggered");
            self.auto_trigger.send_replace(true);
        }
    }

    /// Fatal failures replace the guidance with what the user has to do;
    /// anything else only costs this tick.
    fn tick_failed(&self, err: &ScanError, stage: &'static str, generation: u64) {
        match classify_error(err) {
            ErrorClass::Fatal => {
                error!(error = %err, stage, "analysis tick hit a fatal error");
                if self.current_generation() == generation
                    && self.state() == CaptureState::Searching
                {
                    self.guidance.send_replace(Guidance::for_error(err));
                }
            }
            class => warn!(error = %err, stage, ?class, "analysis tick skipped"),
        }
    }

    /// One tracking tick. Runs inline on the async task; it is cheap.
    fn track(&self, now: Instant) {
        let raw = *self.raw.borrow();
        let mut tracker = lock(&self.tracker);
        let smoothed = tracker.update(raw.as_ref());
        let stable = tracker.refresh_stable(now);
        let orientation = tracker.stable_orientation();
        drop(tracker);

        self.overlay.send_if_modified(|overlay| {
            let next = Overlay {
                smoothed,
                stable,
                orientation,
            };
            let changed = *overlay != next;
            *overlay = next;
            changed
        });
    }
}

/// Holds the busy flag for the duration of one analysis tick. Moves into
/// the blocking task, so the flag stays set even if the loop that spawned
/// it is aborted.
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Cancellation handle of one running loop.
pub(crate) struct LoopHandle {
    name: &'static str,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl LoopHandle {
    /// Signal and abort the loop. Does not wait; in-flight blocking work
    /// finishes on its own and is discarded by the generation check.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            self.shutdown.notify_one();
            task.abort();
            debug!(name = self.name, "loop stopped");
        }
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Spawn the analysis loop under the current generation.
pub(crate) fn spawn_analysis<A: FrameAnalyzer>(ctx: Arc<LiveContext<A>>, period: Duration) -> LoopHandle {
    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    let generation = ctx.current_generation();

    let task = tokio::spawn(async move {
        let mut ticks = ticker(period);
        loop {
            tokio::select! {
                _ = signal.notified() => {
                    debug!("analysis loop received shutdown signal");
                    break;
                }
                _ = ticks.tick() => {
                    if ctx.current_generation() != generation {
                        break;
                    }
                    let Some(guard) = BusyGuard::try_acquire(&ctx.busy) else {
                        trace!("analysis still busy; tick skipped");
                        continue;
                    };
                    let work = Arc::clone(&ctx);
                    let outcome = tokio::task::spawn_blocking(move || {
                        let _guard = guard;
                        work.analyse(generation);
                    })
                    .await;
                    if let Err(err) = outcome {
                        warn!(error = %err, "analysis task failed");
                    }
                }
            }
        }
    });

    LoopHandle {
        name: "analysis",
        shutdown,
        task: Some(task),
    }
}

/// Spawn the tracking loop under the current generation.
pub(crate) fn spawn_tracking<A: FrameAnalyzer>(ctx: Arc<LiveContext<A>>, period: Duration) -> LoopHandle {
    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    let generation = ctx.current_generation();

    let task = tokio::spawn(async move {
        let mut ticks = ticker(period);
        loop {
            tokio::select! {
                _ = signal.notified() => {
                    debug!("tracking loop received shutdown signal");
                    break;
                }
                _ = ticks.tick() => {
                    if ctx.current_generation() != generation {
                        break;
                    }
                    ctx.track(Instant::now());
                }
            }
        }
    });

    LoopHandle {
        name: "tracking",
        shutdown,
        task: Some(task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_guard_is_exclusive_and_released_on_drop() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = BusyGuard::try_acquire(&flag).expect("free");
        assert!(BusyGuard::try_acquire(&flag).is_none());
        drop(guard);
        assert!(BusyGuard::try_acquire(&flag).is_some());
    }

    #[test]
    fn states_display_lowercase() {
        assert_eq!(CaptureState::Enhancing.to_string(), "enhancing");
    }
}
