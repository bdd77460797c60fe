//! Kinematics of the connection between two consecutive track points
//!
//! A [`TrackSegment`] is computed once from its two endpoints and never
//! mutated. Metrics that need a duration or a direction are `Option`s: an
//! undefined value is reported as `None` and must be checked by the caller,
//! it is never coerced to zero and never produced by a division by zero.

use crate::{TrackPoint, utils};
use geo::{Bearing, Distance, Haversine};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Derived metrics of one segment
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackSegment {
    start: TrackPoint,
    end: TrackPoint,
    /// Great-circle length in meters
    length: f64,
    /// Elapsed seconds, `None` when only one endpoint has a timestamp
    duration: Option<i64>,
    /// Initial bearing in radians clockwise from north, `None` for coincident endpoints
    bearing: Option<f64>,
}

impl TrackSegment {
    /// Compute the metrics of the segment `start -> end`
    pub fn between(start: TrackPoint, end: TrackPoint) -> Self {
        let from = start.geo_point();
        let to = end.geo_point();

        let length = Haversine.distance(from, to);
        let bearing = if length > 0.0 {
            Some(Haversine.bearing(from, to).to_radians())
        } else {
            None
        };

        Self {
            start,
            end,
            length,
            duration: utils::interval_seconds(start.time, end.time),
            bearing,
        }
    }

    #[inline]
    pub fn start(&self) -> &TrackPoint {
        &self.start
    }

    #[inline]
    pub fn end(&self) -> &TrackPoint {
        &self.end
    }

    /// Length in meters
    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Duration in whole seconds (may be negative if time runs backwards)
    #[inline]
    pub fn duration(&self) -> Option<i64> {
        self.duration
    }

    /// Duration when it is defined and non-zero
    #[inline]
    fn divisor(&self) -> Option<f64> {
        self.duration.filter(|&d| d != 0).map(|d| d as f64)
    }

    /// Average speed in m/s
    #[inline]
    pub fn speed(&self) -> Option<f64> {
        self.divisor().map(|seconds| self.length / seconds)
    }

    /// Signed elevation change in meters
    #[inline]
    pub fn height(&self) -> Option<f64> {
        Some(self.end.elevation? - self.start.elevation?)
    }

    /// Signed elevation change rate in m/s
    #[inline]
    pub fn height_rate(&self) -> Option<f64> {
        Some(self.height()? / self.divisor()?)
    }

    /// Initial bearing in radians, clockwise from north
    #[inline]
    pub fn bearing(&self) -> Option<f64> {
        self.bearing
    }

    /// Signed change of direction from `previous` to this segment, in `(-PI, PI]`
    ///
    /// Positive values turn clockwise.
    pub fn rotation_from(&self, previous: &TrackSegment) -> Option<f64> {
        Some(utils::normalize_angle(self.bearing? - previous.bearing?))
    }

    /// Change of direction from `previous` per second spent on this segment
    pub fn rotation_rate(&self, previous: &TrackSegment) -> Option<f64> {
        Some(self.rotation_from(previous)? / self.divisor()?)
    }

    /// True when the segment has a positive duration
    #[inline]
    pub fn is_timed(&self) -> bool {
        self.duration.is_some_and(|d| d > 0)
    }
}
