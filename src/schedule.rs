//! # Animation Scheduler
//!
//! Turns elapsed wall-clock seconds into progress along a track so that a
//! fixed-length animation (60 s by default) always ends on the last point,
//! whatever the length of the track. Two tracks driven by the same elapsed
//! value therefore finish together.
//!
//! The scheduler owns no timer. Callers pass elapsed seconds on each tick;
//! stopping an animation is just not ticking it any more.
//!
//! ```rust
//! use gpx_racer::{build_track, schedule, TrackPoint};
//!
//! let track = build_track(vec![TrackPoint::new(0.0, 0.0), TrackPoint::new(0.0, 0.1)]).unwrap();
//! let progress = schedule(&track, 60.0);
//!
//! assert_eq!(progress(0.0), 0.0);
//! assert_eq!(progress(30.0), 0.5);
//! assert_eq!(progress(60.0), 1.0);
//! assert_eq!(progress(600.0), 1.0);
//! ```

use log::debug;

use crate::interpolate::{interpolate, progress_at_time};
use crate::{clamp_progress, Position, Track};

/// Length of a race animation when none is configured.
pub const DEFAULT_DURATION_SECONDS: f64 = 60.0;

/// How progress advances over the animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Pacing {
    /// Progress proportional to elapsed time.
    #[default]
    Linear,
    /// Replay the track's own timestamps compressed into the animation, so
    /// fast and slow stretches keep their relative speed. Tracks without
    /// timestamps fall back to linear.
    Recorded,
}

/// Progress as a function of elapsed seconds for one track.
///
/// `progress_at(0) == start` and `progress_at(duration) == 1.0`, never
/// decreasing in between and staying at 1.0 afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Schedule<'a> {
    track: &'a Track,
    duration_seconds: f64,
    start_progress: f64,
    pacing: Pacing,
}

/// Linear schedule for `track` as a plain function of elapsed seconds.
pub fn schedule(track: &Track, duration_seconds: f64) -> impl Fn(f64) -> f64 + '_ {
    let schedule = Schedule::new(track, duration_seconds);
    move |elapsed_seconds| schedule.progress_at(elapsed_seconds)
}

/// Replace non-finite or non-positive durations with the default.
pub(crate) fn sanitize_duration(duration_seconds: f64) -> f64 {
    if duration_seconds.is_finite() && duration_seconds > 0.0 {
        duration_seconds
    } else {
        DEFAULT_DURATION_SECONDS
    }
}

/// Fraction of the animation done after `elapsed_seconds`, in `[0, 1]`.
pub(crate) fn elapsed_ratio(elapsed_seconds: f64, duration_seconds: f64) -> f64 {
    if elapsed_seconds.is_nan() || elapsed_seconds <= 0.0 {
        return 0.0;
    }
    (elapsed_seconds / duration_seconds).min(1.0)
}

impl<'a> Schedule<'a> {
    /// Linear schedule from the start of the track.
    ///
    /// A non-finite or non-positive duration falls back to
    /// [`DEFAULT_DURATION_SECONDS`].
    pub fn new(track: &'a Track, duration_seconds: f64) -> Self {
        Self {
            track,
            duration_seconds: sanitize_duration(duration_seconds),
            start_progress: 0.0,
            pacing: Pacing::Linear,
        }
    }

    pub fn with_pacing(self, pacing: Pacing) -> Self {
        Self { pacing, ..self }
    }

    /// Start the animation from `progress` instead of the first point. The
    /// remaining part of the track is covered in the full duration.
    pub fn starting_at(self, progress: f64) -> Self {
        Self { start_progress: clamp_progress(progress), ..self }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn start_progress(&self) -> f64 {
        self.start_progress
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// True once the animation has reached its end.
    pub fn is_complete(&self, elapsed_seconds: f64) -> bool {
        elapsed_ratio(elapsed_seconds, self.duration_seconds) >= 1.0
    }

    pub fn progress_at(&self, elapsed_seconds: f64) -> f64 {
        let ratio = elapsed_ratio(elapsed_seconds, self.duration_seconds);
        if ratio >= 1.0 {
            return 1.0;
        }

        let shape = match (self.pacing, self.track.duration_seconds()) {
            (Pacing::Recorded, Some(recorded)) if recorded > 0.0 => {
                progress_at_time(self.track, ratio * recorded).unwrap_or(ratio)
            }
            _ => ratio,
        };

        if shape >= 1.0 {
            return 1.0;
        }
        self.start_progress + (1.0 - self.start_progress) * shape
    }

    pub fn position_at(&self, elapsed_seconds: f64) -> Position {
        interpolate(self.track, self.progress_at(elapsed_seconds))
    }
}

// =============================================================================
// Animation State Machine
// =============================================================================

/// Lifecycle of an animation.
///
/// `Idle -> Running -> Completed`. `Completed` only leaves through a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AnimationState {
    #[default]
    Idle,
    Running,
    Completed,
}

/// A single-track animation as a caller-owned value.
///
/// Every transition consumes the animation and returns the next one.
///
/// ```rust
/// use gpx_racer::{build_track, Animation, AnimationState, Schedule, TrackPoint};
///
/// let track = build_track(vec![TrackPoint::new(0.0, 0.0), TrackPoint::new(0.0, 0.1)]).unwrap();
/// let schedule = Schedule::new(&track, 60.0);
///
/// let animation = Animation::default().start(0.0).tick(&schedule, 30.0);
/// assert_eq!(animation.state(), AnimationState::Running);
/// assert_eq!(animation.progress(), 0.5);
///
/// let animation = animation.tick(&schedule, 61.0);
/// assert_eq!(animation.state(), AnimationState::Completed);
/// assert_eq!(animation.progress(), 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Animation {
    state: AnimationState,
    start_progress: f64,
    progress: f64,
}

impl Animation {
    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Begin running from `from_progress`. Only leaves `Idle`.
    #[must_use]
    pub fn start(self, from_progress: f64) -> Self {
        if self.state != AnimationState::Idle {
            return self;
        }
        let from = clamp_progress(from_progress);
        debug!("animation started at {:.3}", from);
        Self {
            state: AnimationState::Running,
            start_progress: from,
            progress: from,
        }
    }

    /// Advance to `elapsed_seconds` since `start`. Only moves while running.
    #[must_use]
    pub fn tick(self, schedule: &Schedule<'_>, elapsed_seconds: f64) -> Self {
        if self.state != AnimationState::Running {
            return self;
        }

        let schedule = schedule.starting_at(self.start_progress);
        let progress = schedule.progress_at(elapsed_seconds);
        let state = if schedule.is_complete(elapsed_seconds) {
            debug!("animation completed");
            AnimationState::Completed
        } else {
            AnimationState::Running
        };

        Self { state, progress, ..self }
    }

    /// Pause a running animation where it is.
    #[must_use]
    pub fn stop(self) -> Self {
        match self.state {
            AnimationState::Running => Self { state: AnimationState::Idle, ..self },
            _ => self,
        }
    }

    /// Put the dot at `progress` by hand. A running animation pauses there;
    /// a completed one keeps its state until [`Animation::reset`].
    #[must_use]
    pub fn move_to(self, progress: f64) -> Self {
        let state = match self.state {
            AnimationState::Running => AnimationState::Idle,
            other => other,
        };
        Self { state, progress: clamp_progress(progress), ..self }
    }

    /// Where the current or last run started.
    pub fn start_progress(&self) -> f64 {
        self.start_progress
    }

    /// Back to `Idle` at progress 0.
    #[must_use]
    pub fn reset(self) -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_track, TrackPoint};
    use chrono::{DateTime, Duration, Utc};

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn line(length_deg: f64) -> Track {
        build_track(vec![TrackPoint::new(0.0, 0.0), TrackPoint::new(0.0, length_deg)]).unwrap()
    }

    fn timed_track() -> Track {
        // 1 km in the first 100 s, then 1 km in the next 900 s
        let t0 = DateTime::parse_from_rfc3339("2024-05-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        build_track(vec![
            TrackPoint::with_time(0.0, 0.0, t0),
            TrackPoint::with_time(0.0, 0.009, t0 + Duration::seconds(100)),
            TrackPoint::with_time(0.0, 0.018, t0 + Duration::seconds(1000)),
        ])
        .unwrap()
    }

    #[test]
    fn test_endpoint_law() {
        let track = line(0.1);
        let progress = schedule(&track, 60.0);
        assert_eq!(progress(0.0), 0.0);
        assert_eq!(progress(60.0), 1.0);
        assert_eq!(progress(30.0), 0.5);
        assert_eq!(progress(1e9), 1.0);
        assert_eq!(progress(-4.0), 0.0);
        assert_eq!(progress(f64::NAN), 0.0);
    }

    #[test]
    fn test_monotonic() {
        let track = timed_track();
        for pacing in [Pacing::Linear, Pacing::Recorded] {
            let schedule = Schedule::new(&track, 60.0).with_pacing(pacing);
            let mut previous = 0.0;
            for i in 0..=700 {
                let p = schedule.progress_at(i as f64 / 10.0);
                assert!(p >= previous, "{:?} went backwards at {}", pacing, i);
                assert!((0.0..=1.0).contains(&p));
                previous = p;
            }
            assert_eq!(previous, 1.0);
        }
    }

    #[test]
    fn test_different_lengths_finish_together() {
        // ~10 km and ~20 km along the equator
        let short = line(0.0899);
        let long = line(0.1798);
        let short_schedule = Schedule::new(&short, 60.0);
        let long_schedule = Schedule::new(&long, 60.0);

        let short_mid = short_schedule.position_at(30.0);
        let long_mid = long_schedule.position_at(30.0);
        assert!(approx_eq(short_mid.distance_along, short.total_distance() / 2.0, 1e-6));
        assert!(approx_eq(long_mid.distance_along, long.total_distance() / 2.0, 1e-6));
        assert!(approx_eq(short_mid.distance_along, 5_000.0, 10.0));
        assert!(approx_eq(long_mid.distance_along, 10_000.0, 20.0));

        assert_eq!(short_schedule.progress_at(60.0), 1.0);
        assert_eq!(long_schedule.progress_at(60.0), 1.0);
    }

    #[test]
    fn test_invalid_duration_uses_default() {
        let track = line(0.1);
        for duration in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let schedule = Schedule::new(&track, duration);
            assert_eq!(schedule.duration_seconds(), DEFAULT_DURATION_SECONDS);
        }
    }

    #[test]
    fn test_starting_mid_route() {
        let track = line(0.1);
        let schedule = Schedule::new(&track, 60.0).starting_at(0.5);
        assert_eq!(schedule.progress_at(0.0), 0.5);
        assert_eq!(schedule.progress_at(30.0), 0.75);
        assert_eq!(schedule.progress_at(60.0), 1.0);
    }

    #[test]
    fn test_recorded_pacing() {
        let track = timed_track();
        let schedule = Schedule::new(&track, 100.0).with_pacing(Pacing::Recorded);

        // The first half of the distance took 10% of the recorded time
        assert!(approx_eq(schedule.progress_at(10.0), 0.5, 1e-3));
        assert!(approx_eq(schedule.progress_at(55.0), 0.75, 1e-3));
        assert_eq!(schedule.progress_at(0.0), 0.0);
        assert_eq!(schedule.progress_at(100.0), 1.0);
    }

    #[test]
    fn test_recorded_pacing_without_time_is_linear() {
        let track = line(0.1);
        let schedule = Schedule::new(&track, 60.0).with_pacing(Pacing::Recorded);
        assert_eq!(schedule.progress_at(15.0), 0.25);
    }

    #[test]
    fn test_animation_lifecycle() {
        let track = line(0.1);
        let schedule = Schedule::new(&track, 60.0);

        let idle = Animation::default();
        assert_eq!(idle.state(), AnimationState::Idle);
        // Ticking while idle does nothing
        assert_eq!(idle.tick(&schedule, 30.0), idle);

        let running = idle.start(0.0).tick(&schedule, 15.0);
        assert_eq!(running.state(), AnimationState::Running);
        assert_eq!(running.progress(), 0.25);

        let completed = running.tick(&schedule, 60.0);
        assert_eq!(completed.state(), AnimationState::Completed);
        assert_eq!(completed.progress(), 1.0);

        // Terminal until reset
        assert_eq!(completed.start(0.0), completed);
        assert_eq!(completed.stop(), completed);
        assert_eq!(completed.tick(&schedule, 10.0), completed);

        let reset = completed.reset();
        assert_eq!(reset.state(), AnimationState::Idle);
        assert_eq!(reset.progress(), 0.0);
    }

    #[test]
    fn test_animation_move_to() {
        let track = line(0.1);
        let schedule = Schedule::new(&track, 60.0);

        let parked = Animation::default().move_to(0.4);
        assert_eq!(parked.state(), AnimationState::Idle);
        assert_eq!(parked.progress(), 0.4);
        assert_eq!(Animation::default().move_to(3.0).progress(), 1.0);

        let paused = Animation::default().start(0.0).tick(&schedule, 30.0).move_to(0.1);
        assert_eq!(paused.state(), AnimationState::Idle);
        assert_eq!(paused.progress(), 0.1);

        let completed = Animation::default().start(0.0).tick(&schedule, 60.0).move_to(0.3);
        assert_eq!(completed.state(), AnimationState::Completed);
        assert_eq!(completed.progress(), 0.3);
    }

    #[test]
    fn test_animation_stop_keeps_progress() {
        let track = line(0.1);
        let schedule = Schedule::new(&track, 60.0);

        let stopped = Animation::default().start(0.2).tick(&schedule, 30.0).stop();
        assert_eq!(stopped.state(), AnimationState::Idle);
        assert!(approx_eq(stopped.progress(), 0.6, 1e-12));

        let resumed = stopped.start(stopped.progress()).tick(&schedule, 0.0);
        assert!(approx_eq(resumed.progress(), 0.6, 1e-12));
    }
}
