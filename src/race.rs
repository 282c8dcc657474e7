//! # Race Session
//!
//! Control logic for racing two routes against each other: a shared slider,
//! one slider per route, "align as early as possible", "start from this
//! route's dot", and a timed run that brings both dots home together.
//!
//! The session state is a plain value owned by the caller. Each UI event
//! becomes a [`RaceCommand`]; [`Race::apply`] takes the current state and the
//! command and returns the next state. Nothing is stored inside [`Race`]
//! besides the two borrowed tracks and the configuration.
//!
//! ```rust
//! use gpx_racer::{build_track, Race, RaceCommand, RaceConfig, RaceState, TrackPoint};
//!
//! let route_1 = build_track(vec![TrackPoint::new(0.0, 0.0), TrackPoint::new(0.0, 0.09)]).unwrap();
//! let route_2 = build_track(vec![TrackPoint::new(0.0, 0.0), TrackPoint::new(0.0, 0.18)]).unwrap();
//! let race = Race::new(&route_1, &route_2, RaceConfig::default());
//!
//! let state = race.apply(RaceState::default(), RaceCommand::Go);
//! let state = race.apply(state, RaceCommand::Tick { elapsed_seconds: 30.0 });
//! assert_eq!(state.progress(), (0.5, 0.5));
//! ```

use log::debug;

use crate::alignment::{find_earliest_close_pair_with, snap_to_nearest, AlignConfig, Alignment};
use crate::geo_utils::{compute_bounds, compute_center};
use crate::interpolate::interpolate;
use crate::schedule::{
    sanitize_duration, Animation, AnimationState, Pacing, Schedule, DEFAULT_DURATION_SECONDS,
};
use crate::{Bounds, GpsPoint, Position, Track};

/// Configuration for a race between two routes.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RaceConfig {
    /// Length of the timed run in seconds.
    /// Default: 60.0
    pub duration_seconds: f64,

    /// Distance at which the two routes count as "together" when aligning.
    /// Default: 30.0 meters (GPS noise on two separate recordings)
    pub proximity_threshold_m: f64,

    /// Progress resolution of the alignment search.
    /// Default: 0.001
    pub sample_step: f64,

    /// How the dots move during the timed run.
    /// Default: linear
    pub pacing: Pacing,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            duration_seconds: DEFAULT_DURATION_SECONDS,
            proximity_threshold_m: 30.0,
            sample_step: AlignConfig::default().sample_step,
            pacing: Pacing::Linear,
        }
    }
}

/// Everything the UI has to keep between ticks: one animated dot per route.
///
/// Both dots are started, ticked and stopped together, so they always share
/// the same [`AnimationState`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RaceState {
    pub route_1: Animation,
    pub route_2: Animation,
}

impl RaceState {
    /// Progress of both dots.
    pub fn progress(&self) -> (f64, f64) {
        (self.route_1.progress(), self.route_2.progress())
    }

    /// Position of the shared slider: the mean of both dots.
    pub fn sync_progress(&self) -> f64 {
        (self.route_1.progress() + self.route_2.progress()) / 2.0
    }

    pub fn animation(&self) -> AnimationState {
        self.route_1.state()
    }

    pub fn is_running(&self) -> bool {
        self.animation() == AnimationState::Running
    }
}

/// A UI event.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RaceCommand {
    /// Move both dots to the same progress
    SetSync(f64),
    SetRoute1(f64),
    SetRoute2(f64),
    /// Put both dots at the earliest place the routes come together
    AlignEarliest,
    /// Move the route 2 dot to the point nearest the route 1 dot
    StartFromRoute1,
    /// Move the route 1 dot to the point nearest the route 2 dot
    StartFromRoute2,
    /// Start the timed run from the current dots
    Go,
    /// Seconds since `Go`
    Tick { elapsed_seconds: f64 },
    /// Pause the timed run where it is
    Stop,
    /// Back to the start with no run in progress
    Reset,
}

/// Summary of the two routes for display.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RaceSummary {
    pub route_1_km: f64,
    pub route_2_km: f64,
    /// Mean of every point of both routes, for centering a map
    pub center: GpsPoint,
    /// Bounds enclosing both routes
    pub bounds: Bounds,
}

/// Two routes and the rules for racing them.
#[derive(Debug, Clone, Copy)]
pub struct Race<'a> {
    route_1: &'a Track,
    route_2: &'a Track,
    config: RaceConfig,
}

impl<'a> Race<'a> {
    pub fn new(route_1: &'a Track, route_2: &'a Track, config: RaceConfig) -> Self {
        let config = RaceConfig {
            duration_seconds: sanitize_duration(config.duration_seconds),
            ..config
        };
        Self { route_1, route_2, config }
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn route_1(&self) -> &'a Track {
        self.route_1
    }

    pub fn route_2(&self) -> &'a Track {
        self.route_2
    }

    /// Apply one UI event and return the next state.
    ///
    /// Moving a dot by hand pauses a running timed run. A completed run stays
    /// completed until [`RaceCommand::Reset`]: the dots can still be moved to
    /// inspect the routes, but `Go` does nothing until the race is reset,
    /// which puts both dots back at the start.
    pub fn apply(&self, state: RaceState, command: RaceCommand) -> RaceState {
        debug!("race command {:?}", command);

        let (progress_1, progress_2) = state.progress();
        match command {
            RaceCommand::SetSync(progress) => self.moved_by_hand(state, progress, progress),
            RaceCommand::SetRoute1(progress) => self.moved_by_hand(state, progress, progress_2),
            RaceCommand::SetRoute2(progress) => self.moved_by_hand(state, progress_1, progress),
            RaceCommand::AlignEarliest => {
                let alignment = self.align_earliest();
                self.moved_by_hand(state, alignment.progress_a, alignment.progress_b)
            }
            RaceCommand::StartFromRoute1 => {
                let dot = interpolate(self.route_1, progress_1);
                let route_2 = snap_to_nearest(self.route_2, &dot);
                self.moved_by_hand(state, progress_1, route_2)
            }
            RaceCommand::StartFromRoute2 => {
                let dot = interpolate(self.route_2, progress_2);
                let route_1 = snap_to_nearest(self.route_1, &dot);
                self.moved_by_hand(state, route_1, progress_2)
            }
            RaceCommand::Go => RaceState {
                route_1: state.route_1.start(progress_1),
                route_2: state.route_2.start(progress_2),
            },
            RaceCommand::Tick { elapsed_seconds } => self.tick(state, elapsed_seconds),
            RaceCommand::Stop => RaceState {
                route_1: state.route_1.stop(),
                route_2: state.route_2.stop(),
            },
            RaceCommand::Reset => RaceState {
                route_1: state.route_1.reset(),
                route_2: state.route_2.reset(),
            },
        }
    }

    /// The earliest close pair for the configured threshold, including the
    /// distance between the dots.
    pub fn align_earliest(&self) -> Alignment {
        let config = AlignConfig { sample_step: self.config.sample_step };
        find_earliest_close_pair_with(
            self.route_1,
            self.route_2,
            self.config.proximity_threshold_m,
            &config,
        )
    }

    /// Marker positions for both dots.
    pub fn markers(&self, state: &RaceState) -> (Position, Position) {
        let (progress_1, progress_2) = state.progress();
        (interpolate(self.route_1, progress_1), interpolate(self.route_2, progress_2))
    }

    pub fn summary(&self) -> RaceSummary {
        let all_points: Vec<GpsPoint> = self
            .route_1
            .gps_points()
            .chain(self.route_2.gps_points())
            .collect();

        RaceSummary {
            route_1_km: self.route_1.total_distance() / 1000.0,
            route_2_km: self.route_2.total_distance() / 1000.0,
            center: compute_center(&all_points),
            bounds: compute_bounds(&all_points),
        }
    }

    fn schedule_for(&self, track: &'a Track) -> Schedule<'a> {
        Schedule::new(track, self.config.duration_seconds).with_pacing(self.config.pacing)
    }

    fn tick(&self, state: RaceState, elapsed_seconds: f64) -> RaceState {
        let next = RaceState {
            route_1: state.route_1.tick(&self.schedule_for(self.route_1), elapsed_seconds),
            route_2: state.route_2.tick(&self.schedule_for(self.route_2), elapsed_seconds),
        };
        if state.is_running() && next.animation() == AnimationState::Completed {
            debug!("race finished after {:.1}s", elapsed_seconds);
        }
        next
    }

    fn moved_by_hand(&self, state: RaceState, route_1: f64, route_2: f64) -> RaceState {
        RaceState {
            route_1: state.route_1.move_to(route_1),
            route_2: state.route_2.move_to(route_2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_track, TrackPoint};

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn track(points: &[(f64, f64)]) -> Track {
        build_track(points.iter().map(|&(lat, lng)| TrackPoint::new(lat, lng))).unwrap()
    }

    fn at(route_1: f64, route_2: f64) -> RaceState {
        RaceState {
            route_1: Animation::default().move_to(route_1),
            route_2: Animation::default().move_to(route_2),
        }
    }

    #[test]
    fn test_sliders() {
        let route_1 = track(&[(0.0, 0.0), (0.0, 0.01)]);
        let route_2 = track(&[(0.0, 0.0), (0.0, 0.02)]);
        let race = Race::new(&route_1, &route_2, RaceConfig::default());

        let state = race.apply(RaceState::default(), RaceCommand::SetSync(0.4));
        assert_eq!(state.progress(), (0.4, 0.4));
        assert_eq!(state.sync_progress(), 0.4);

        let state = race.apply(state, RaceCommand::SetRoute1(0.8));
        assert_eq!(state.progress(), (0.8, 0.4));
        assert!(approx_eq(state.sync_progress(), 0.6, 1e-12));

        let state = race.apply(state, RaceCommand::SetRoute2(7.0));
        assert_eq!(state.route_2.progress(), 1.0);
    }

    #[test]
    fn test_timed_run_finishes_together() {
        // ~10 km and ~20 km
        let route_1 = track(&[(0.0, 0.0), (0.0, 0.0899)]);
        let route_2 = track(&[(0.0, 0.0), (0.0, 0.1798)]);
        let race = Race::new(&route_1, &route_2, RaceConfig::default());

        let state = race.apply(RaceState::default(), RaceCommand::Go);
        assert!(state.is_running());

        let state = race.apply(state, RaceCommand::Tick { elapsed_seconds: 30.0 });
        let (dot_1, dot_2) = race.markers(&state);
        assert!(approx_eq(dot_1.distance_along, route_1.total_distance() / 2.0, 1e-6));
        assert!(approx_eq(dot_2.distance_along, route_2.total_distance() / 2.0, 1e-6));

        let state = race.apply(state, RaceCommand::Tick { elapsed_seconds: 60.0 });
        assert_eq!(state.animation(), AnimationState::Completed);
        assert_eq!(state.progress(), (1.0, 1.0));

        // Completed is terminal until reset
        let again = race.apply(state, RaceCommand::Go);
        assert_eq!(again, state);

        let reset = race.apply(state, RaceCommand::Reset);
        assert_eq!(reset, RaceState::default());
    }

    #[test]
    fn test_run_from_current_positions() {
        let route_1 = track(&[(0.0, 0.0), (0.0, 0.01)]);
        let route_2 = track(&[(0.0, 0.0), (0.0, 0.02)]);
        let race = Race::new(&route_1, &route_2, RaceConfig::default());

        let state = race.apply(RaceState::default(), RaceCommand::SetRoute1(0.5));
        let state = race.apply(state, RaceCommand::Go);
        let state = race.apply(state, RaceCommand::Tick { elapsed_seconds: 30.0 });

        assert_eq!(state.progress(), (0.75, 0.5));
        assert_eq!(state.route_1.start_progress(), 0.5);
    }

    #[test]
    fn test_stop_and_manual_move_pause() {
        let route_1 = track(&[(0.0, 0.0), (0.0, 0.01)]);
        let route_2 = track(&[(0.0, 0.0), (0.0, 0.02)]);
        let race = Race::new(&route_1, &route_2, RaceConfig::default());

        let running = race.apply(RaceState::default(), RaceCommand::Go);
        let stopped = race.apply(running, RaceCommand::Stop);
        assert_eq!(stopped.animation(), AnimationState::Idle);

        // Ticks after stopping are ignored
        let ticked = race.apply(stopped, RaceCommand::Tick { elapsed_seconds: 30.0 });
        assert_eq!(ticked, stopped);

        let moved = race.apply(running, RaceCommand::SetSync(0.3));
        assert_eq!(moved.animation(), AnimationState::Idle);
        assert_eq!(moved.progress(), (0.3, 0.3));
    }

    #[test]
    fn test_completed_run_needs_reset() {
        let route_1 = track(&[(0.0, 0.0), (0.0, 0.04)]);
        let route_2 = track(&[(0.0, 0.01), (0.0, 0.03)]);
        let race = Race::new(&route_1, &route_2, RaceConfig::default());

        let state = race.apply(RaceState::default(), RaceCommand::Go);
        let finished = race.apply(state, RaceCommand::Tick { elapsed_seconds: 60.0 });
        assert_eq!(finished.animation(), AnimationState::Completed);

        // Dots can be inspected after the finish, but a new run needs a reset
        let moved = race.apply(finished, RaceCommand::SetRoute1(0.5));
        let moved = race.apply(moved, RaceCommand::StartFromRoute1);
        assert_eq!(moved.animation(), AnimationState::Completed);
        assert!(approx_eq(moved.route_2.progress(), 0.5, 1e-6));
        assert_eq!(race.apply(moved, RaceCommand::Go), moved);

        let reset = race.apply(moved, RaceCommand::Reset);
        assert_eq!(reset, RaceState::default());
        let rerun = race.apply(reset, RaceCommand::Go);
        assert!(rerun.is_running());
    }

    #[test]
    fn test_align_earliest() {
        let route_1 = track(&[(0.0, 0.0), (0.0, 1.0)]);
        let route_2 = track(&[(0.0, 0.0005), (0.0, 1.0)]);
        let race = Race::new(
            &route_1,
            &route_2,
            RaceConfig { proximity_threshold_m: 100.0, ..RaceConfig::default() },
        );

        let start = at(0.7, 0.2);
        let state = race.apply(start, RaceCommand::AlignEarliest);
        assert_eq!(state.progress(), (0.0, 0.0));
        assert!(race.align_earliest().within_threshold);
    }

    #[test]
    fn test_start_from_route() {
        // Route 2 starts where route 1 is a quarter of the way along
        let route_1 = track(&[(0.0, 0.0), (0.0, 0.04)]);
        let route_2 = track(&[(0.0, 0.01), (0.0, 0.03)]);
        let race = Race::new(&route_1, &route_2, RaceConfig::default());

        let state = race.apply(at(0.5, 0.9), RaceCommand::StartFromRoute1);
        assert_eq!(state.route_1.progress(), 0.5);
        assert!(approx_eq(state.route_2.progress(), 0.5, 1e-6));

        let state = race.apply(at(0.9, 0.0), RaceCommand::StartFromRoute2);
        assert!(approx_eq(state.route_1.progress(), 0.25, 1e-6));
        assert_eq!(state.route_2.progress(), 0.0);
    }

    #[test]
    fn test_summary() {
        let route_1 = track(&[(0.0, 0.0), (0.0, 0.0899)]);
        let route_2 = track(&[(0.01, 0.0), (0.01, 0.1798)]);
        let race = Race::new(&route_1, &route_2, RaceConfig::default());

        let summary = race.summary();
        assert!(approx_eq(summary.route_1_km, 10.0, 0.01));
        assert!(approx_eq(summary.route_2_km, 20.0, 0.02));
        assert!(approx_eq(summary.center.latitude, 0.005, 1e-12));
        assert_eq!(summary.bounds.max_lng, 0.1798);
    }

    #[test]
    fn test_invalid_duration_falls_back() {
        let route_1 = track(&[(0.0, 0.0), (0.0, 0.01)]);
        let race = Race::new(
            &route_1,
            &route_1,
            RaceConfig { duration_seconds: -1.0, ..RaceConfig::default() },
        );
        assert_eq!(race.config().duration_seconds, DEFAULT_DURATION_SECONDS);
    }
}
