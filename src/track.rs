//! # Track Model
//!
//! An immutable, distance-parameterized polyline built once from raw track
//! points. Everything the interpolator, the alignment engine and the
//! scheduler need is precomputed here:
//!
//! - cumulative great-circle distance at every vertex
//! - the vertex progress table (`cumulative / total`)
//! - elapsed seconds at every vertex, when the track carries usable timestamps
//! - bounds and center for map display

use log::debug;

use crate::error::InvalidTrackError;
use crate::geo_utils::{compute_bounds, compute_center, haversine_distance};
use crate::{Bounds, GpsPoint, Position, TrackPoint};

/// How timestamps on the input points are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeMode {
    /// Use timestamps when every point has one. Timestamps that are present
    /// but go backwards reject the track.
    #[default]
    Auto,
    /// Drop all timestamps. The track is driven by distance only, so
    /// out-of-order timestamps are not an error.
    DistanceOnly,
}

/// An ordered GPS polyline with cached distance and time metadata.
///
/// Construct with [`build_track`] or [`Track::with_time_mode`]. There are no
/// mutating methods; share it by reference.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Track {
    points: Vec<TrackPoint>,
    cumulative_distance: Vec<f64>,
    progress: Vec<f64>,
    /// Seconds since the first point, present only when `has_time` holds
    elapsed_seconds: Option<Vec<f64>>,
    bounds: Bounds,
    center: GpsPoint,
}

/// Build a track from raw points, using timestamps when they are complete.
///
/// # Errors
///
/// See [`InvalidTrackError`] for the rejected inputs.
///
/// # Example
///
/// ```rust
/// use gpx_racer::{build_track, TrackPoint};
///
/// let track = build_track(vec![
///     TrackPoint::new(51.0, -1.0),
///     TrackPoint::new(51.0005, -1.0005),
///     TrackPoint::new(51.001, -1.001),
/// ]).unwrap();
///
/// assert_eq!(track.vertex_progress()[0], 0.0);
/// assert_eq!(track.vertex_progress()[2], 1.0);
/// assert!(!track.has_time());
/// ```
pub fn build_track<I>(points: I) -> Result<Track, InvalidTrackError>
where
    I: IntoIterator<Item = TrackPoint>,
{
    Track::with_time_mode(points.into_iter().collect(), TimeMode::Auto)
}

impl Track {
    /// Build a track, treating timestamps according to `mode`.
    pub fn with_time_mode(
        mut points: Vec<TrackPoint>,
        mode: TimeMode,
    ) -> Result<Self, InvalidTrackError> {
        if points.len() < 2 {
            return Err(InvalidTrackError::TooFewPoints { count: points.len() });
        }

        if let Some((index, p)) = points.iter().enumerate().find(|(_, p)| !p.is_valid()) {
            return Err(InvalidTrackError::CoordinateOutOfRange {
                index,
                latitude: p.latitude,
                longitude: p.longitude,
            });
        }

        if mode == TimeMode::DistanceOnly {
            for p in &mut points {
                p.timestamp = None;
            }
        }

        let elapsed_seconds = elapsed_seconds(&points)?;

        let mut cumulative_distance = Vec::with_capacity(points.len());
        cumulative_distance.push(0.0);
        let mut total = 0.0;
        for w in points.windows(2) {
            total += haversine_distance(&w[0].gps_point(), &w[1].gps_point());
            cumulative_distance.push(total);
        }

        if total <= 0.0 {
            return Err(InvalidTrackError::ZeroLength);
        }

        let mut progress: Vec<f64> = cumulative_distance.iter().map(|d| d / total).collect();
        // Division can land a hair below 1.0; the last vertex is the end by definition
        if let Some(last) = progress.last_mut() {
            *last = 1.0;
        }

        let coords: Vec<GpsPoint> = points.iter().map(TrackPoint::gps_point).collect();
        let bounds = compute_bounds(&coords);
        let center = compute_center(&coords);

        debug!(
            "built track: {} points, {:.0}m, has_time={}",
            points.len(),
            total,
            elapsed_seconds.is_some()
        );

        Ok(Self {
            points,
            cumulative_distance,
            progress,
            elapsed_seconds,
            bounds,
            center,
        })
    }

    /// Number of points (always at least 2).
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; a track cannot be constructed empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of segments, `len() - 1`.
    pub fn segment_count(&self) -> usize {
        self.points.len() - 1
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    /// Coordinates of vertex `index`.
    ///
    /// # Panics
    ///
    /// If `index >= len()`.
    #[inline]
    pub fn point(&self, index: usize) -> GpsPoint {
        self.points[index].gps_point()
    }

    pub fn gps_points(&self) -> impl Iterator<Item = GpsPoint> + '_ {
        self.points.iter().map(TrackPoint::gps_point)
    }

    /// Meters from point 0 to each vertex. Non-decreasing.
    pub fn cumulative_distance(&self) -> &[f64] {
        &self.cumulative_distance
    }

    /// Total length in meters.
    pub fn total_distance(&self) -> f64 {
        self.cumulative_distance[self.cumulative_distance.len() - 1]
    }

    /// Progress of each vertex; starts at exactly 0.0 and ends at exactly 1.0.
    pub fn vertex_progress(&self) -> &[f64] {
        &self.progress
    }

    /// Whether every point carries a timestamp and they never go backwards.
    pub fn has_time(&self) -> bool {
        self.elapsed_seconds.is_some()
    }

    /// Seconds since the first point at each vertex, for timed tracks.
    pub fn elapsed_seconds(&self) -> Option<&[f64]> {
        self.elapsed_seconds.as_deref()
    }

    /// Recorded duration in seconds, for timed tracks.
    pub fn duration_seconds(&self) -> Option<f64> {
        self.elapsed_seconds.as_ref().and_then(|e| e.last().copied())
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn center(&self) -> GpsPoint {
        self.center
    }

    /// Length of segment `index` in meters.
    #[inline]
    pub(crate) fn segment_length(&self, index: usize) -> f64 {
        self.cumulative_distance[index + 1] - self.cumulative_distance[index]
    }

    /// Meters walked from point 0 to reach `position`.
    ///
    /// Uses the segment context carried by the position, so no search is
    /// needed.
    pub fn distance_at(&self, position: &Position) -> f64 {
        let i = position.segment_index.min(self.segment_count() - 1);
        let t = position.segment_fraction.clamp(0.0, 1.0);
        if t >= 1.0 {
            return self.cumulative_distance[i + 1];
        }
        self.cumulative_distance[i] + t * self.segment_length(i)
    }

    /// Index of the vertex whose progress is closest to `progress`.
    ///
    /// Progress is clamped to `[0, 1]`. Ties go to the lowest index.
    pub fn nearest_vertex(&self, progress: f64) -> usize {
        let target = crate::clamp_progress(progress);
        let upper = self.progress.partition_point(|&p| p < target);

        let best_value = if upper == 0 {
            self.progress[0]
        } else if upper >= self.progress.len() {
            self.progress[self.progress.len() - 1]
        } else {
            let below = self.progress[upper - 1];
            let above = self.progress[upper];
            if target - below <= above - target { below } else { above }
        };

        self.progress.partition_point(|&p| p < best_value)
    }
}

/// Seconds since the first point, when every point has a timestamp.
///
/// Present timestamps must be non-decreasing even when some are missing.
fn elapsed_seconds(points: &[TrackPoint]) -> Result<Option<Vec<f64>>, InvalidTrackError> {
    let mut previous = None;
    for (index, p) in points.iter().enumerate() {
        if let Some(ts) = p.timestamp {
            if previous.is_some_and(|prev| ts < prev) {
                return Err(InvalidTrackError::TimestampsOutOfOrder { index });
            }
            previous = Some(ts);
        }
    }

    let Some(start) = points[0].timestamp else {
        return Ok(None);
    };

    let elapsed: Option<Vec<f64>> = points
        .iter()
        .map(|p| p.timestamp.map(|ts| (ts - start).num_milliseconds() as f64 / 1000.0))
        .collect();

    Ok(elapsed)
}
