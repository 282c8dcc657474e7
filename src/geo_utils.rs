//! # Geographic Utilities
//!
//! Low-level geographic helpers shared by the track model, the interpolator
//! and the alignment engine.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`compute_bounds`] | Bounding box of a set of points |
//! | [`compute_center`] | Arithmetic centroid of a set of points |
//! | [`lerp`] | Linear interpolation between two coordinates |
//! | [`LocalProjection`] | Equirectangular projection to meters |
//!
//! ## Example
//!
//! ```rust
//! use gpx_racer::{GpsPoint, geo_utils};
//!
//! let track = vec![
//!     GpsPoint::new(51.5074, -0.1278),
//!     GpsPoint::new(51.5080, -0.1290),
//!     GpsPoint::new(51.5090, -0.1300),
//! ];
//!
//! let dist = geo_utils::haversine_distance(&track[0], &track[2]);
//! let center = geo_utils::compute_center(&track);
//! assert!(dist > 0.0);
//! assert!((center.latitude - 51.5081).abs() < 1e-4);
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances use the haversine formula on a spherical Earth (radius 6,371 km).
//! At the scale of running, hiking and cycling routes the error against an
//! ellipsoidal model stays well below GPS noise.
//!
//! Projection onto segments is done in a local equirectangular plane. Over a
//! single GPS segment (tens to hundreds of meters) the plane is
//! indistinguishable from the sphere.

use geo::{Distance, Haversine, Point};

use crate::{Bounds, GpsPoint};

/// Mean Earth radius in meters, matching the radius used by [`Haversine`].
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two GPS points in meters.
///
/// # Example
///
/// ```rust
/// use gpx_racer::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Linear interpolation between two coordinates.
///
/// `t == 0.0` and `t == 1.0` return the endpoints bit-for-bit.
#[inline]
pub fn lerp(a: &GpsPoint, b: &GpsPoint, t: f64) -> GpsPoint {
    if t <= 0.0 {
        return *a;
    }
    if t >= 1.0 {
        return *b;
    }
    GpsPoint::new(
        a.latitude + t * (b.latitude - a.latitude),
        a.longitude + t * (b.longitude - a.longitude),
    )
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a set of points.
///
/// For empty input, returns bounds with MIN/MAX sentinels.
///
/// ```rust
/// use gpx_racer::{GpsPoint, geo_utils};
///
/// let bounds = geo_utils::compute_bounds(&[
///     GpsPoint::new(51.5000, -0.1300),
///     GpsPoint::new(51.5100, -0.1200),
/// ]);
/// assert_eq!(bounds.min_lat, 51.5000);
/// assert_eq!(bounds.max_lng, -0.1200);
/// ```
pub fn compute_bounds(points: &[GpsPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lng = min_lng.min(p.longitude);
        max_lng = max_lng.max(p.longitude);
    }

    Bounds { min_lat, max_lat, min_lng, max_lng }
}

// =============================================================================
// Center/Centroid Functions
// =============================================================================

/// Arithmetic mean of all latitudes and longitudes. Returns (0, 0) for empty
/// input.
///
/// This is what a map view centers on when showing both routes. It does not
/// handle tracks crossing the antimeridian.
pub fn compute_center(points: &[GpsPoint]) -> GpsPoint {
    if points.is_empty() {
        return GpsPoint::new(0.0, 0.0);
    }

    let sum_lat: f64 = points.iter().map(|p| p.latitude).sum();
    let sum_lng: f64 = points.iter().map(|p| p.longitude).sum();
    let n = points.len() as f64;

    GpsPoint::new(sum_lat / n, sum_lng / n)
}

// =============================================================================
// Local Projection
// =============================================================================

/// Equirectangular projection to a local metric plane.
///
/// `x` grows east and `y` grows north, both in meters, with the longitude
/// scale fixed at the reference latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    meters_per_deg_lat: f64,
    meters_per_deg_lng: f64,
}

impl LocalProjection {
    pub fn new(reference_lat: f64) -> Self {
        let meters_per_deg_lat = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        Self {
            meters_per_deg_lat,
            meters_per_deg_lng: meters_per_deg_lat * reference_lat.to_radians().cos(),
        }
    }

    /// Project a point to `[x, y]` meters.
    #[inline]
    pub fn project(&self, p: &GpsPoint) -> [f64; 2] {
        [
            p.longitude * self.meters_per_deg_lng,
            p.latitude * self.meters_per_deg_lat,
        ]
    }
}

/// Fraction `t` in `[0, 1]` of the point on segment `start..end` closest to
/// `target`.
///
/// Zero-length segments return 0.0. A target exactly on `start` returns
/// exactly 0.0 and a target exactly on `end` returns exactly 1.0.
pub fn project_onto_segment(target: &GpsPoint, start: &GpsPoint, end: &GpsPoint) -> f64 {
    let projection = LocalProjection::new(target.latitude);
    let [sx, sy] = projection.project(start);
    let [ex, ey] = projection.project(end);
    let [tx, ty] = projection.project(target);

    let dx = ex - sx;
    let dy = ey - sy;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 || !len_sq.is_finite() {
        return 0.0;
    }

    let t = ((tx - sx) * dx + (ty - sy) * dy) / len_sq;
    t.clamp(0.0, 1.0)
}

// =============================================================================
// Unit Tests
// =============================================================================
