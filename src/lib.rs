//! # GPX Racer
//!
//! Route geometry and synchronization engine for racing two GPS tracks
//! against each other.
//!
//! This library provides:
//! - An immutable, distance-parameterized [`Track`] built from raw points
//! - Interpolation from progress (0.0 to 1.0) or elapsed time to a position
//! - Cross-route alignment: the earliest place two routes come together, and
//!   snapping one route's dot to the point nearest the other's
//! - A 60-second animation schedule that brings both dots home together
//! - A [`Race`] session that turns UI events into state transitions
//!
//! Everything is synchronous and allocation-light; tracks are never mutated
//! after construction and every query is a pure function of its inputs.
//!
//! ## Features
//!
//! - **`parallel`** - Run the alignment search on rayon
//! - **`serde`** - Serialize/Deserialize on public value types
//! - **`gpx`** - Parse GPX text into track points
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use gpx_racer::{build_track, interpolate, find_earliest_close_pair, TrackPoint};
//!
//! let route_1 = build_track(vec![
//!     TrackPoint::new(51.5074, -0.1278),
//!     TrackPoint::new(51.5080, -0.1290),
//!     TrackPoint::new(51.5090, -0.1300),
//! ]).unwrap();
//! let route_2 = build_track(vec![
//!     TrackPoint::new(51.5075, -0.1279),
//!     TrackPoint::new(51.5095, -0.1305),
//! ]).unwrap();
//!
//! let dot = interpolate(&route_1, 0.5);
//! println!("Route 1 halfway: {:.5}, {:.5}", dot.latitude, dot.longitude);
//!
//! let alignment = find_earliest_close_pair(&route_1, &route_2, 30.0);
//! assert!(alignment.within_threshold);
//! ```

use chrono::{DateTime, Utc};

pub mod error;
pub use error::InvalidTrackError;
#[cfg(feature = "gpx")]
pub use error::GpxImportError;

pub mod geo_utils;

pub mod track;
pub use track::{build_track, TimeMode, Track};

pub mod interpolate;
pub use interpolate::{interpolate, interpolate_at_time, progress_at_time};

pub mod alignment;
pub use alignment::{
    find_earliest_close_pair, find_earliest_close_pair_with, snap_point, snap_to_nearest,
    AlignConfig, Alignment,
};

pub mod schedule;
pub use schedule::{schedule, Animation, AnimationState, Pacing, Schedule, DEFAULT_DURATION_SECONDS};

pub mod race;
pub use race::{Race, RaceCommand, RaceConfig, RaceState, RaceSummary};

#[cfg(feature = "gpx")]
pub mod gpx_import;
#[cfg(feature = "gpx")]
pub use gpx_import::{parse_gpx_points, track_from_gpx};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use gpx_racer::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One raw record of a GPS log, as handed over by a GPX parser.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl TrackPoint {
    /// A point without a timestamp.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, timestamp: None }
    }

    pub fn with_time(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self { latitude, longitude, timestamp: Some(timestamp) }
    }

    #[inline]
    pub fn gps_point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    pub fn is_valid(&self) -> bool {
        self.gps_point().is_valid()
    }
}

/// Bounding box of one or more tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// An interpolated point on a track, with the segment it lies on.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Segment `[segment_index, segment_index + 1]` containing the point
    pub segment_index: usize,
    /// How far along that segment, 0.0 to 1.0
    pub segment_fraction: f64,
    /// Progress along the whole track, 0.0 to 1.0
    pub progress: f64,
    /// Meters from the first point
    pub distance_along: f64,
}

impl Position {
    pub fn gps_point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// Clamp a progress value into `[0, 1]`. NaN becomes 0.
#[inline]
pub fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
