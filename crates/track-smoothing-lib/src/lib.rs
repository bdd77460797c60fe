//! Track Smoothing Library - GPS track graph, incremental statistics and smoothing
//!
//! A recorded track is held as a chain of vertex and segment nodes. Statistics
//! (distance, speed, height rate) are maintained incrementally: every structural
//! change reports which segments were detached and which were linked, and each
//! registered property updates itself from that delta instead of rescanning.
//! Smoothers remove implausible vertices (sharp turns taken too fast, points
//! recorded while standing still) and keep those statistics exact.
//!
//! # Architecture
//!
//! - **[`TrackPoint`] / [`TrackSegment`]**: raw samples and the derived metrics between two of them
//! - **[`Polyline`]**: arena-backed chain with stable [`VertexId`] / [`SegmentId`] handles
//! - **[`Sum`] / [`MaxMinProperty`]**: reversible accumulators over segments
//! - **[`Track`]**: owns the chain and keeps every [`TrackProperty`] in sync with it
//! - **[`Smoother`]**: bounded pass-and-converge vertex removal
//!
//! # Performance Characteristics
//!
//! - **Seeding**: O(N) per property
//! - **Removal**: O(1) per property, plus a rescan when an extremum holder goes away
//! - **Smoothing pass**: O(N) vertices visited

mod aggregate;
mod arena;
mod geojson;
mod gpx_io;
mod pipeline;
mod point;
pub mod polyline;
mod properties;
mod segment;
mod smoothing;
mod track;
pub mod utils;

// Public API exports
pub use aggregate::{
    Accumulator, MaxMinProperty, NodeOfInterest, PointSegments, PointValue, SegmentFilter,
    SegmentValue, Sum, TrackProperty, every_segment,
};
pub use arena::Index;
pub use geojson::GeoJsonTrack;
pub use gpx_io::read_gpx_file;
pub use pipeline::{SmoothingConfig, SmoothingOutcome, smooth_track};
pub use point::TrackPoint;
pub use polyline::{Polyline, SegmentId, SegmentNode, SegmentRef, Splice, VertexId, VertexNode};
pub use properties::{
    DistanceProperty, DistanceSnapshot, ElevationTrend, HeightRateProperty, HeightRateSnapshot,
    SpeedProperty, SpeedSnapshot, TrendSnapshot,
};
pub use segment::TrackSegment;
pub use smoothing::{
    RemovedVertex, SmoothOptions, SmoothReport, Smoother, VertexContext, VertexPredicate,
    default_stationary, is_stationary, rotates_too_fast,
};
pub use track::{Track, TrackStatistics};

/// Error types for the track library
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("GPX parsing error: {0}")]
    GpxParse(#[from] gpx::errors::GpxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Malformed timestamp: {0:?}")]
    MalformedTimestamp(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Inconsistent aggregation state in {property}: {reason}")]
    InconsistentAggregationState {
        property: &'static str,
        reason: String,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty track")]
    EmptyTrack,
}

pub type Result<T> = std::result::Result<T, TrackError>;
