//! GPX text to track points.
//!
//! Reads every track segment point, then every route point, in document
//! order. Consecutive points at identical coordinates are collapsed into the
//! first one, which keeps stationary recording noise out of the track.

use std::io::Cursor;

use chrono::{DateTime, Utc};
use log::debug;

use crate::error::GpxImportError;
use crate::{build_track, Track, TrackPoint};

/// Extract track points from GPX text.
///
/// ```rust
/// use gpx_racer::parse_gpx_points;
///
/// let gpx = r#"<?xml version="1.0" encoding="UTF-8"?>
/// <gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
///   <trk><trkseg>
///     <trkpt lat="51.0" lon="-1.0"></trkpt>
///     <trkpt lat="51.001" lon="-1.001"></trkpt>
///   </trkseg></trk>
/// </gpx>"#;
///
/// let points = parse_gpx_points(gpx).unwrap();
/// assert_eq!(points.len(), 2);
/// assert_eq!(points[1].latitude, 51.001);
/// ```
pub fn parse_gpx_points(gpx_text: &str) -> Result<Vec<TrackPoint>, GpxImportError> {
    let parsed = gpx::read(Cursor::new(gpx_text.as_bytes()))
        .map_err(|e| GpxImportError::Parse(e.to_string()))?;

    let track_points = parsed
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .flat_map(|segment| segment.points.iter());
    let route_points = parsed.routes.iter().flat_map(|route| route.points.iter());

    let mut points: Vec<TrackPoint> = Vec::new();
    for waypoint in track_points.chain(route_points) {
        let point = to_track_point(waypoint)?;
        let duplicate = points.last().is_some_and(|last| {
            last.latitude == point.latitude && last.longitude == point.longitude
        });
        if !duplicate {
            points.push(point);
        }
    }

    debug!("parsed {} GPX points", points.len());
    Ok(points)
}

/// Parse GPX text and build a track from it.
pub fn track_from_gpx(gpx_text: &str) -> Result<Track, GpxImportError> {
    let points = parse_gpx_points(gpx_text)?;
    Ok(build_track(points)?)
}

fn to_track_point(waypoint: &gpx::Waypoint) -> Result<TrackPoint, GpxImportError> {
    let coords = waypoint.point();
    let timestamp = match &waypoint.time {
        Some(time) => {
            let iso = time.format().map_err(|e| GpxImportError::Parse(e.to_string()))?;
            let utc = DateTime::parse_from_rfc3339(&iso)
                .map_err(|e| GpxImportError::Parse(e.to_string()))?
                .with_timezone(&Utc);
            Some(utc)
        }
        None => None,
    };

    Ok(TrackPoint {
        latitude: coords.y(),
        longitude: coords.x(),
        timestamp,
    })
}
