use thiserror::Error;

/// Reasons a point sequence cannot become a [`Track`](crate::Track).
///
/// Raised only at construction time. The caller has to supply different
/// input; nothing downstream of a built track can fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidTrackError {
    #[error("a track needs at least 2 points, got {count}")]
    TooFewPoints { count: usize },

    #[error("point {index} has out-of-range coordinates ({latitude}, {longitude})")]
    CoordinateOutOfRange {
        index: usize,
        latitude: f64,
        longitude: f64,
    },

    #[error("timestamp of point {index} is earlier than the one before it")]
    TimestampsOutOfOrder { index: usize },

    #[error("track has zero total distance")]
    ZeroLength,
}

/// Failure to turn GPX text into a track.
#[cfg(feature = "gpx")]
#[derive(Error, Debug)]
pub enum GpxImportError {
    #[error("failed to parse GPX: {0}")]
    Parse(String),

    #[error(transparent)]
    InvalidTrack(#[from] InvalidTrackError),
}
