//! # Position Interpolator
//!
//! Maps a progress fraction, or an elapsed time on a timed track, to a point
//! on the polyline. Results carry their segment context so later queries
//! (distance walked, snapping) need no second search.
//!
//! ```rust
//! use gpx_racer::{build_track, interpolate, TrackPoint};
//!
//! let track = build_track(vec![TrackPoint::new(0.0, 0.0), TrackPoint::new(0.0, 1.0)]).unwrap();
//!
//! let halfway = interpolate(&track, 0.5);
//! assert!((halfway.longitude - 0.5).abs() < 1e-9);
//! assert_eq!(halfway.segment_index, 0);
//!
//! // Out-of-range progress is clamped, not rejected
//! assert_eq!(interpolate(&track, 5.0), interpolate(&track, 1.0));
//! ```

use crate::geo_utils::lerp;
use crate::{clamp_progress, Position, Track};

/// Position at `progress` (clamped to `[0, 1]`) along the track by distance.
///
/// Progress 0.0 returns the first point and 1.0 the last point, bit-for-bit.
/// A target that falls on a zero-length segment returns that segment's start.
pub fn interpolate(track: &Track, progress: f64) -> Position {
    let progress = clamp_progress(progress);
    let last_segment = track.segment_count() - 1;

    if progress <= 0.0 {
        return position_on_segment(track, 0, 0.0, 0.0);
    }
    if progress >= 1.0 {
        return position_on_segment(track, last_segment, 1.0, 1.0);
    }

    let cumulative = track.cumulative_distance();
    let target = progress * track.total_distance();

    // First vertex strictly past the target; cumulative[0] == 0 keeps this >= 1
    let upper = cumulative.partition_point(|&d| d <= target);
    let index = upper.saturating_sub(1).min(last_segment);

    let segment_length = track.segment_length(index);
    let fraction = if segment_length > 0.0 {
        ((target - cumulative[index]) / segment_length).clamp(0.0, 1.0)
    } else {
        0.0
    };

    position_on_segment(track, index, fraction, progress)
}

/// Position `elapsed_seconds` after the first timestamp, for timed tracks.
///
/// Elapsed time is clamped to the recorded duration. Within a segment the
/// position moves linearly with time; a segment whose endpoints share a
/// timestamp resolves to its start. Returns `None` when the track has no
/// usable timestamps.
pub fn interpolate_at_time(track: &Track, elapsed_seconds: f64) -> Option<Position> {
    let times = track.elapsed_seconds()?;
    let duration = times[times.len() - 1];
    let last_segment = track.segment_count() - 1;

    let elapsed = if elapsed_seconds.is_nan() { 0.0 } else { elapsed_seconds };
    if elapsed <= 0.0 {
        return Some(position_on_segment(track, 0, 0.0, 0.0));
    }
    if elapsed >= duration {
        return Some(position_on_segment(track, last_segment, 1.0, 1.0));
    }

    let upper = times.partition_point(|&s| s <= elapsed);
    let index = upper.saturating_sub(1).min(last_segment);

    let segment_duration = times[index + 1] - times[index];
    let fraction = if segment_duration > 0.0 {
        ((elapsed - times[index]) / segment_duration).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let distance = track.cumulative_distance()[index] + fraction * track.segment_length(index);
    let progress = clamp_progress(distance / track.total_distance());

    Some(position_on_segment(track, index, fraction, progress))
}

/// Progress reached `elapsed_seconds` into a timed track's recording.
pub fn progress_at_time(track: &Track, elapsed_seconds: f64) -> Option<f64> {
    interpolate_at_time(track, elapsed_seconds).map(|p| p.progress)
}

pub(crate) fn position_on_segment(
    track: &Track,
    segment_index: usize,
    segment_fraction: f64,
    progress: f64,
) -> Position {
    let start = track.point(segment_index);
    let end = track.point(segment_index + 1);
    let point = lerp(&start, &end, segment_fraction);

    let distance_along = if segment_fraction >= 1.0 {
        track.cumulative_distance()[segment_index + 1]
    } else {
        track.cumulative_distance()[segment_index]
            + segment_fraction * track.segment_length(segment_index)
    };

    Position {
        latitude: point.latitude,
        longitude: point.longitude,
        segment_index,
        segment_fraction,
        progress,
        distance_along,
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

    fn sample_track() -> Track {
        build_track(vec![
            TrackPoint::new(51.5074, -0.1278),
            TrackPoint::new(51.5080, -0.1290),
            TrackPoint::new(51.5090, -0.1300),
            TrackPoint::new(51.5100, -0.1310),
            TrackPoint::new(51.5110, -0.1320),
        ])
        .unwrap()
    }

    fn timed_track() -> Track {
        let t0 = DateTime::parse_from_rfc3339("2024-05-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        build_track(vec![
            TrackPoint::with_time(0.0, 0.0, t0),
            TrackPoint::with_time(0.0, 0.01, t0 + Duration::seconds(100)),
            TrackPoint::with_time(0.0, 0.01, t0 + Duration::seconds(150)),
            TrackPoint::with_time(0.0, 0.02, t0 + Duration::seconds(200)),
        ])
        .unwrap()
    }

    #[test]
    fn test_endpoints_exact() {
        let track = sample_track();
        let start = interpolate(&track, 0.0);
        let end = interpolate(&track, 1.0);

        assert_eq!(start.gps_point(), track.point(0));
        assert_eq!(end.gps_point(), track.point(track.len() - 1));
        assert_eq!(start.distance_along, 0.0);
        assert_eq!(end.distance_along, track.total_distance());
    }

    #[test]
    fn test_clamping() {
        let track = sample_track();
        assert_eq!(interpolate(&track, -5.0), interpolate(&track, 0.0));
        assert_eq!(interpolate(&track, 5.0), interpolate(&track, 1.0));
        assert_eq!(interpolate(&track, f64::NAN), interpolate(&track, 0.0));
    }

    #[test]
    fn test_monotonic_distance() {
        let track = sample_track();
        let mut previous = -1.0;
        for i in 0..=1000 {
            let position = interpolate(&track, i as f64 / 1000.0);
            let walked = track.distance_at(&position);
            assert!(walked >= previous, "step {} went backwards", i);
            assert!(approx_eq(walked, position.distance_along, 1e-6));
            previous = walked;
        }
    }

    #[test]
    fn test_midpoint_of_single_segment() {
        let track = build_track(vec![TrackPoint::new(0.0, 0.0), TrackPoint::new(0.0, 1.0)]).unwrap();
        let mid = interpolate(&track, 0.5);
        assert_eq!(mid.segment_index, 0);
        assert!(approx_eq(mid.segment_fraction, 0.5, 1e-9));
        assert!(approx_eq(mid.longitude, 0.5, 1e-9));
        assert_eq!(mid.latitude, 0.0);
    }

    #[test]
    fn test_vertex_progress_lands_on_vertex() {
        let track = sample_track();
        for (i, &p) in track.vertex_progress().iter().enumerate() {
            let position = interpolate(&track, p);
            assert!(approx_eq(position.latitude, track.point(i).latitude, 1e-9));
            assert!(approx_eq(position.longitude, track.point(i).longitude, 1e-9));
        }
    }

    #[test]
    fn test_zero_length_segment() {
        let track = build_track(vec![
            TrackPoint::new(0.0, 0.0),
            TrackPoint::new(0.0, 0.01),
            TrackPoint::new(0.0, 0.01),
            TrackPoint::new(0.0, 0.02),
        ])
        .unwrap();

        let position = interpolate(&track, 0.5);
        assert!(approx_eq(position.longitude, 0.01, 1e-9));
        assert!(position.segment_fraction.is_finite());

        for i in 0..=100 {
            let p = interpolate(&track, i as f64 / 100.0);
            assert!(p.latitude.is_finite() && p.longitude.is_finite());
        }
    }

    #[test]
    fn test_leading_duplicate_start() {
        let track = build_track(vec![
            TrackPoint::new(0.0, 0.0),
            TrackPoint::new(0.0, 0.0),
            TrackPoint::new(0.0, 0.01),
        ])
        .unwrap();
        let start = interpolate(&track, 0.0);
        assert_eq!(start.segment_index, 0);
        assert_eq!(start.gps_point(), track.point(0));
    }

    #[test]
    fn test_interpolate_at_time() {
        let track = timed_track();

        let at_vertex = interpolate_at_time(&track, 100.0).unwrap();
        assert!(approx_eq(at_vertex.longitude, 0.01, 1e-12));

        let halfway_first = interpolate_at_time(&track, 50.0).unwrap();
        assert!(approx_eq(halfway_first.longitude, 0.005, 1e-9));

        // Standing still between 100s and 150s
        let paused = interpolate_at_time(&track, 125.0).unwrap();
        assert!(approx_eq(paused.longitude, 0.01, 1e-12));
        assert!(approx_eq(paused.progress, 0.5, 1e-6));

        assert_eq!(interpolate_at_time(&track, -10.0).unwrap().gps_point(), track.point(0));
        assert_eq!(interpolate_at_time(&track, 1e6).unwrap().gps_point(), track.point(3));
        assert_eq!(progress_at_time(&track, 200.0), Some(1.0));
    }

    #[test]
    fn test_interpolate_at_time_without_time() {
        assert!(interpolate_at_time(&sample_track(), 10.0).is_none());
        assert!(progress_at_time(&sample_track(), 10.0).is_none());
    }
}
