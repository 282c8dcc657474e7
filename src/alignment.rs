//! # Alignment Engine
//!
//! Finds geographically corresponding progress values across two tracks.
//!
//! ## Earliest close pair
//!
//! Both tracks are sampled at every vertex plus a fixed progress step, so
//! long straight segments are still probed finely. Samples of track B go
//! into an R-tree keyed on 3D Earth-centered coordinates: chord length is
//! monotonic in great-circle distance, so radius and nearest-neighbour
//! queries on the tree are exact with respect to haversine ordering.
//!
//! Among all sample pairs within the threshold the one with the smallest
//! combined progress wins, then the smaller distance. Remaining ties (routes
//! run in opposite directions mirror each other) are broken by keys that do
//! not depend on argument order, so swapping the tracks swaps the pair. The
//! tree works on the sphere directly, so tracks near the poles or across the
//! antimeridian need no special handling. When nothing is within
//! the threshold the globally closest pair is returned instead, tagged with
//! `within_threshold == false`.
//!
//! ## Snap
//!
//! A single pass over the segments of one track, projecting the target onto
//! each segment and keeping the closest foot point. Ties keep the lower
//! progress.
//!
//! ```rust
//! use gpx_racer::{build_track, find_earliest_close_pair, TrackPoint};
//!
//! let route_1 = build_track(vec![TrackPoint::new(0.0, 0.0), TrackPoint::new(0.0, 1.0)]).unwrap();
//! let route_2 = build_track(vec![TrackPoint::new(0.0, 0.0005), TrackPoint::new(0.0, 1.0)]).unwrap();
//!
//! let alignment = find_earliest_close_pair(&route_1, &route_2, 100.0);
//! assert!(alignment.within_threshold);
//! assert!(alignment.progress_a < 0.001 && alignment.progress_b < 0.001);
//! ```

use std::cmp::Ordering;

use log::debug;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::geo_utils::{haversine_distance, lerp, project_onto_segment, EARTH_RADIUS_M};
use crate::interpolate::interpolate;
use crate::{clamp_progress, GpsPoint, Position, Track};

/// Configuration for the earliest-close-pair search.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlignConfig {
    /// Progress step between samples in addition to every vertex.
    /// Default: 0.001 (the resolution of a 1000-step slider)
    pub sample_step: f64,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self { sample_step: 0.001 }
    }
}

/// A pair of corresponding progress values on two tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Alignment {
    /// Progress on the first track passed in
    pub progress_a: f64,
    /// Progress on the second track passed in
    pub progress_b: f64,
    /// Great-circle distance between the two positions in meters
    pub distance_m: f64,
    /// Whether `distance_m` is within the requested threshold. When false the
    /// pair is the closest approach found anywhere on the two tracks.
    pub within_threshold: bool,
}

impl Alignment {
    /// The same alignment seen from the other track.
    pub fn swapped(&self) -> Self {
        Self {
            progress_a: self.progress_b,
            progress_b: self.progress_a,
            ..*self
        }
    }
}

// =============================================================================
// Sampling and Spatial Index
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Sample {
    progress: f64,
    point: GpsPoint,
}

/// A sample in Earth-centered coordinates (meters) for R-tree queries
#[derive(Debug, Clone, Copy)]
struct IndexedSample {
    idx: usize,
    xyz: [f64; 3],
}

impl RTreeObject for IndexedSample {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.xyz)
    }
}

impl PointDistance for IndexedSample {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.xyz[0] - point[0];
        let dy = self.xyz[1] - point[1];
        let dz = self.xyz[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

fn to_xyz(p: &GpsPoint) -> [f64; 3] {
    let lat = p.latitude.to_radians();
    let lng = p.longitude.to_radians();
    [
        EARTH_RADIUS_M * lat.cos() * lng.cos(),
        EARTH_RADIUS_M * lat.cos() * lng.sin(),
        EARTH_RADIUS_M * lat.sin(),
    ]
}

/// Chord length subtending a great-circle arc of `distance` meters
fn chord_length(distance: f64) -> f64 {
    let half_angle = (distance / (2.0 * EARTH_RADIUS_M)).min(std::f64::consts::FRAC_PI_2);
    2.0 * EARTH_RADIUS_M * half_angle.sin()
}

/// Every vertex plus every multiple of `step`, sorted by progress.
fn sample_track(track: &Track, step: f64) -> Vec<Sample> {
    let step = if step.is_finite() && step > 0.0 {
        step.clamp(1e-6, 1.0)
    } else {
        AlignConfig::default().sample_step
    };
    let grid_count = (1.0 / step).ceil() as usize;

    let vertices = track.vertex_progress();
    let mut samples = Vec::with_capacity(vertices.len() + grid_count + 1);

    let mut v = 0;
    let mut k = 0;
    while v < vertices.len() || k <= grid_count {
        let grid = if k <= grid_count { Some(clamp_progress(k as f64 * step)) } else { None };

        match (vertices.get(v), grid) {
            (Some(&vp), Some(gp)) if vp <= gp => {
                samples.push(Sample { progress: vp, point: track.point(v) });
                v += 1;
                if vp == gp {
                    k += 1;
                }
            }
            (_, Some(gp)) => {
                samples.push(Sample { progress: gp, point: interpolate(track, gp).gps_point() });
                k += 1;
            }
            (Some(&vp), None) => {
                samples.push(Sample { progress: vp, point: track.point(v) });
                v += 1;
            }
            (None, None) => break,
        }
    }

    samples
}

fn build_rtree(samples: &[Sample]) -> RTree<IndexedSample> {
    let indexed: Vec<IndexedSample> = samples
        .iter()
        .enumerate()
        .map(|(idx, s)| IndexedSample { idx, xyz: to_xyz(&s.point) })
        .collect();
    RTree::bulk_load(indexed)
}

// =============================================================================
// Earliest Close Pair
// =============================================================================

/// A scored pair plus the midpoint of its two positions.
///
/// Every key used for ordering is unchanged when the tracks are swapped, so
/// `f(a, b)` and `f(b, a).swapped()` pick the same place.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    alignment: Alignment,
    midpoint: [f64; 2],
}

impl Candidate {
    fn new(sample_a: &Sample, sample_b: &Sample, within_threshold: bool) -> Self {
        let (a, b) = (&sample_a.point, &sample_b.point);
        Self {
            alignment: Alignment {
                progress_a: sample_a.progress,
                progress_b: sample_b.progress,
                distance_m: haversine_distance(a, b),
                within_threshold,
            },
            midpoint: [
                (a.latitude + b.latitude) / 2.0,
                (a.longitude + b.longitude) / 2.0,
            ],
        }
    }

    fn combined_progress(&self) -> f64 {
        self.alignment.progress_a + self.alignment.progress_b
    }

    fn lower_progress(&self) -> f64 {
        self.alignment.progress_a.min(self.alignment.progress_b)
    }
}

/// Ties between pairs that mirror each other (opposite-direction routes)
/// resolve to the lower progress, then the southernmost, then westernmost
/// midpoint.
fn mirror_order(a: &Candidate, b: &Candidate) -> Ordering {
    a.lower_progress()
        .total_cmp(&b.lower_progress())
        .then(a.midpoint[0].total_cmp(&b.midpoint[0]))
        .then(a.midpoint[1].total_cmp(&b.midpoint[1]))
}

/// Ordering for the earliest pair: combined progress, then distance.
fn earliest_order(a: &Candidate, b: &Candidate) -> Ordering {
    a.combined_progress()
        .total_cmp(&b.combined_progress())
        .then(a.alignment.distance_m.total_cmp(&b.alignment.distance_m))
        .then_with(|| mirror_order(a, b))
}

/// Ordering for the closest pair: distance, then the earliest ordering.
fn closest_order(a: &Candidate, b: &Candidate) -> Ordering {
    a.alignment
        .distance_m
        .total_cmp(&b.alignment.distance_m)
        .then(a.combined_progress().total_cmp(&b.combined_progress()))
        .then_with(|| mirror_order(a, b))
}

/// Earliest sample of B within `threshold` of `sample`.
fn earliest_within(
    sample: &Sample,
    samples_b: &[Sample],
    tree_b: &RTree<IndexedSample>,
    threshold: f64,
) -> Option<Candidate> {
    let chord = chord_length(threshold);
    // Slight inflation so rounding in the chord never drops a boundary pair;
    // membership is decided by haversine below
    let radius_2 = chord * chord * (1.0 + 1e-9) + 1e-6;

    tree_b
        .locate_within_distance(to_xyz(&sample.point), radius_2)
        .map(|indexed| Candidate::new(sample, &samples_b[indexed.idx], true))
        .filter(|candidate| candidate.alignment.distance_m <= threshold)
        .min_by(earliest_order)
}

/// Closest samples of B to `sample`, reduced with the closest ordering.
fn closest_to(sample: &Sample, samples_b: &[Sample], tree_b: &RTree<IndexedSample>) -> Option<Candidate> {
    let query = to_xyz(&sample.point);
    let nearest = tree_b.nearest_neighbor(&query)?;
    let nearest_d2 = nearest.distance_2(&query);

    tree_b
        .locate_within_distance(query, nearest_d2)
        .map(|indexed| Candidate::new(sample, &samples_b[indexed.idx], false))
        .min_by(closest_order)
        .or_else(|| Some(Candidate::new(sample, &samples_b[nearest.idx], false)))
}

/// Earliest pair of positions on the two tracks that come within
/// `threshold_m` meters of each other, sampled at the default resolution.
///
/// Never fails: when the tracks never come that close, the closest pair is
/// returned with `within_threshold == false`.
pub fn find_earliest_close_pair(track_a: &Track, track_b: &Track, threshold_m: f64) -> Alignment {
    find_earliest_close_pair_with(track_a, track_b, threshold_m, &AlignConfig::default())
}

/// [`find_earliest_close_pair`] with an explicit sampling configuration.
pub fn find_earliest_close_pair_with(
    track_a: &Track,
    track_b: &Track,
    threshold_m: f64,
    config: &AlignConfig,
) -> Alignment {
    let threshold = if threshold_m.is_nan() { 0.0 } else { threshold_m.max(0.0) };

    let samples_a = sample_track(track_a, config.sample_step);
    let samples_b = sample_track(track_b, config.sample_step);
    let tree_b = build_rtree(&samples_b);

    #[cfg(feature = "parallel")]
    let iter = samples_a.par_iter();
    #[cfg(not(feature = "parallel"))]
    let iter = samples_a.iter();

    let earliest = iter
        .filter_map(|s| earliest_within(s, &samples_b, &tree_b, threshold))
        .min_by(earliest_order);

    if let Some(found) = earliest {
        let found = found.alignment;
        debug!(
            "earliest close pair within {:.1}m: ({:.4}, {:.4}) at {:.1}m",
            threshold, found.progress_a, found.progress_b, found.distance_m
        );
        return found;
    }

    #[cfg(feature = "parallel")]
    let iter = samples_a.par_iter();
    #[cfg(not(feature = "parallel"))]
    let iter = samples_a.iter();

    let mut closest = iter
        .filter_map(|s| closest_to(s, &samples_b, &tree_b))
        .min_by(closest_order)
        .map(|candidate| candidate.alignment)
        .unwrap_or(Alignment {
            progress_a: 0.0,
            progress_b: 0.0,
            distance_m: haversine_distance(&track_a.point(0), &track_b.point(0)),
            within_threshold: false,
        });
    closest.within_threshold = closest.distance_m <= threshold;

    debug!(
        "no pair within {:.1}m; closest approach ({:.4}, {:.4}) at {:.1}m",
        threshold, closest.progress_a, closest.progress_b, closest.distance_m
    );
    closest
}

// =============================================================================
// Snap
// =============================================================================

/// Progress on `track` geographically nearest to `target`.
///
/// Used to start a race from one route's live dot: the other route's dot is
/// placed at the returned progress.
pub fn snap_to_nearest(track: &Track, target: &Position) -> f64 {
    snap_point(track, &target.gps_point())
}

/// Progress on `track` geographically nearest to an arbitrary coordinate.
///
/// One pass over the segments. A target lying exactly on vertex `i` returns
/// exactly `cumulative_distance[i] / total_distance`.
///
/// ```rust
/// use gpx_racer::{build_track, snap_point, GpsPoint, TrackPoint};
///
/// let track = build_track(vec![TrackPoint::new(0.0, 0.0), TrackPoint::new(0.0, 0.02)]).unwrap();
/// let progress = snap_point(&track, &GpsPoint::new(0.001, 0.005));
/// assert!((progress - 0.25).abs() < 1e-6);
/// ```
pub fn snap_point(track: &Track, target: &GpsPoint) -> f64 {
    let cumulative = track.cumulative_distance();
    let total = track.total_distance();

    let mut best_distance = f64::INFINITY;
    let mut best_progress = 0.0;

    for i in 0..track.segment_count() {
        let start = track.point(i);
        let end = track.point(i + 1);

        let t = project_onto_segment(target, &start, &end);
        let foot = lerp(&start, &end, t);
        let distance = haversine_distance(target, &foot);

        let walked = if t >= 1.0 {
            cumulative[i + 1]
        } else {
            cumulative[i] + t * track.segment_length(i)
        };
        let progress = clamp_progress(walked / total);

        if distance < best_distance || (distance == best_distance && progress < best_progress) {
            best_distance = distance;
            best_progress = progress;
        }
    }

    best_progress
}
