//! Composite track statistics built from [`Sum`] and [`MaxMinProperty`]

use crate::aggregate::{
    Accumulator, MaxMinProperty, NodeOfInterest, PointSegments, PointValue, SegmentFilter, Sum,
    TrackProperty,
};
use crate::TrackSegment;
use std::any::Any;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

fn length(segment: &TrackSegment) -> Option<f64> {
    Some(segment.length())
}

fn duration(segment: &TrackSegment) -> Option<f64> {
    segment.duration().map(|seconds| seconds as f64)
}

fn loss(segment: &TrackSegment) -> Option<f64> {
    segment.height().map(|height| -height)
}

fn is_ascending(segment: &TrackSegment) -> bool {
    segment.height().is_some_and(|height| height > 0.0)
}

fn is_descending(segment: &TrackSegment) -> bool {
    segment.height().is_some_and(|height| height < 0.0)
}

fn is_timed_ascent(segment: &TrackSegment) -> bool {
    is_ascending(segment) && segment.is_timed()
}

fn is_timed_descent(segment: &TrackSegment) -> bool {
    is_descending(segment) && segment.is_timed()
}

/// Distance over time across the timed segments touching a point
fn point_speed(point: &PointSegments<'_>) -> Option<f64> {
    let (length, seconds) = [point.incoming, point.outgoing]
        .into_iter()
        .flatten()
        .filter(|segment| segment.is_timed())
        .fold((0.0, 0.0), |(length, seconds), segment| {
            (length + segment.length(), seconds + duration(segment).unwrap_or(0.0))
        });
    (seconds > 0.0).then(|| length / seconds)
}

fn ascent_arrival(point: &PointSegments<'_>) -> Option<f64> {
    point
        .incoming
        .filter(|segment| is_ascending(segment))
        .and(point.point.elevation)
}

fn descent_arrival(point: &PointSegments<'_>) -> Option<f64> {
    point
        .incoming
        .filter(|segment| is_descending(segment))
        .and(point.point.elevation)
}

/// Average over the considered segments, `None` when no time was accumulated
#[inline]
fn ratio(numerator: &Sum, denominator: &Sum) -> Option<f64> {
    (denominator.total() > 0.0).then(|| numerator.total() / denominator.total())
}

/// Speed statistics over positively timed segments
///
/// The average is total distance over total time. Extremes are per point: a
/// point's speed is the combined distance over the combined time of its timed
/// incoming and outgoing segments, so the head and tail count too.
#[derive(Clone, Debug)]
pub struct SpeedProperty {
    distance: Sum,
    duration: Sum,
    extremes: MaxMinProperty,
}

/// Read-only view of a [`SpeedProperty`]
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeedSnapshot {
    /// Meters per second
    pub avg: Option<f64>,
    pub max: Option<NodeOfInterest>,
    pub min: Option<NodeOfInterest>,
}

impl Default for SpeedProperty {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeedProperty {
    pub fn new() -> Self {
        Self {
            distance: Sum::new(length, TrackSegment::is_timed),
            duration: Sum::new(duration, TrackSegment::is_timed),
            extremes: MaxMinProperty::new(point_speed),
        }
    }

    pub fn average(&self) -> Option<f64> {
        ratio(&self.distance, &self.duration)
    }

    /// Distance covered by timed segments, in meters
    pub fn distance(&self) -> f64 {
        self.distance.total()
    }

    /// Time spent on timed segments, in seconds
    pub fn duration(&self) -> f64 {
        self.duration.total()
    }

    pub fn fastest(&self) -> Option<&NodeOfInterest> {
        self.extremes.max()
    }

    pub fn slowest(&self) -> Option<&NodeOfInterest> {
        self.extremes.min()
    }

    pub fn snapshot(&self) -> SpeedSnapshot {
        SpeedSnapshot {
            avg: self.average(),
            max: self.fastest().copied(),
            min: self.slowest().copied(),
        }
    }
}

impl TrackProperty for SpeedProperty {
    fn name(&self) -> &'static str {
        "speed"
    }

    fn for_each_accumulator(&mut self, visit: &mut dyn FnMut(&mut dyn Accumulator)) {
        visit(&mut self.distance);
        visit(&mut self.duration);
        visit(&mut self.extremes);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One direction (ascent or descent) of a [`HeightRateProperty`]
#[derive(Clone, Debug)]
pub struct ElevationTrend {
    height: Sum,
    duration: Sum,
    extremes: MaxMinProperty,
}

/// Read-only view of an [`ElevationTrend`]
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrendSnapshot {
    /// Signed elevation change per second (negative for descents)
    pub avg: Option<f64>,
    /// Highest point reached in this direction
    pub max: Option<NodeOfInterest>,
    /// Lowest point reached in this direction
    pub min: Option<NodeOfInterest>,
}

impl ElevationTrend {
    /// `arrival` keys a point by its elevation when it is reached in this direction
    fn new(timed: SegmentFilter, arrival: PointValue) -> Self {
        Self {
            height: Sum::new(TrackSegment::height, timed),
            duration: Sum::new(duration, timed),
            extremes: MaxMinProperty::new(arrival),
        }
    }

    /// Average elevation rate in m/s
    pub fn average(&self) -> Option<f64> {
        ratio(&self.height, &self.duration)
    }

    pub fn highest(&self) -> Option<&NodeOfInterest> {
        self.extremes.max()
    }

    pub fn lowest(&self) -> Option<&NodeOfInterest> {
        self.extremes.min()
    }

    pub fn snapshot(&self) -> TrendSnapshot {
        TrendSnapshot {
            avg: self.average(),
            max: self.highest().copied(),
            min: self.lowest().copied(),
        }
    }
}

/// Ascent and descent rate statistics
///
/// Segments with no elevation change feed neither direction.
#[derive(Clone, Debug)]
pub struct HeightRateProperty {
    ascent: ElevationTrend,
    descent: ElevationTrend,
}

/// Read-only view of a [`HeightRateProperty`]
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HeightRateSnapshot {
    pub ascent: TrendSnapshot,
    pub descent: TrendSnapshot,
}

impl Default for HeightRateProperty {
    fn default() -> Self {
        Self::new()
    }
}

impl HeightRateProperty {
    pub fn new() -> Self {
        Self {
            ascent: ElevationTrend::new(is_timed_ascent, ascent_arrival),
            descent: ElevationTrend::new(is_timed_descent, descent_arrival),
        }
    }

    pub fn ascent(&self) -> &ElevationTrend {
        &self.ascent
    }

    pub fn descent(&self) -> &ElevationTrend {
        &self.descent
    }

    pub fn snapshot(&self) -> HeightRateSnapshot {
        HeightRateSnapshot {
            ascent: self.ascent.snapshot(),
            descent: self.descent.snapshot(),
        }
    }
}

impl TrackProperty for HeightRateProperty {
    fn name(&self) -> &'static str {
        "height-rate"
    }

    fn for_each_accumulator(&mut self, visit: &mut dyn FnMut(&mut dyn Accumulator)) {
        for trend in [&mut self.ascent, &mut self.descent] {
            visit(&mut trend.height);
            visit(&mut trend.duration);
            visit(&mut trend.extremes);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Total length and cumulative elevation gain/loss
#[derive(Clone, Debug)]
pub struct DistanceProperty {
    length: Sum,
    gain: Sum,
    loss: Sum,
}

/// Read-only view of a [`DistanceProperty`]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DistanceSnapshot {
    /// Meters
    pub length: f64,
    /// Meters climbed
    pub gain: f64,
    /// Meters descended (positive)
    pub loss: f64,
}

impl Default for DistanceProperty {
    fn default() -> Self {
        Self::new()
    }
}

impl DistanceProperty {
    pub fn new() -> Self {
        Self {
            length: Sum::all(length),
            gain: Sum::new(TrackSegment::height, is_ascending),
            loss: Sum::new(loss, is_descending),
        }
    }

    pub fn length(&self) -> f64 {
        self.length.total()
    }

    pub fn snapshot(&self) -> DistanceSnapshot {
        DistanceSnapshot {
            length: self.length.total(),
            gain: self.gain.total(),
            loss: self.loss.total(),
        }
    }
}

impl TrackProperty for DistanceProperty {
    fn name(&self) -> &'static str {
        "distance"
    }

    fn for_each_accumulator(&mut self, visit: &mut dyn FnMut(&mut dyn Accumulator)) {
        visit(&mut self.length);
        visit(&mut self.gain);
        visit(&mut self.loss);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Polyline, TrackPoint};

    /// (latitude offset in 0.001 degrees, elevation, seconds)
    fn polyline(samples: &[(f64, f64, i64)]) -> Polyline {
        Polyline::from_points(samples.iter().map(|&(step, elevation, seconds)| {
            let time = chrono::DateTime::from_timestamp(seconds, 0).unwrap();
            TrackPoint::new(step * 0.001, 0.0)
                .with_elevation(elevation)
                .with_time(time)
        }))
    }

    fn seed<P: TrackProperty>(property: &mut P, line: &Polyline) {
        for segment in line.segments() {
            property.add_segment(&segment);
        }
    }

    #[test]
    fn test_speed_average_is_distance_over_time() {
        let line = polyline(&[(0.0, 0.0, 0), (1.0, 0.0, 10), (3.0, 0.0, 20)]);
        let mut speed = SpeedProperty::new();
        seed(&mut speed, &line);

        let total: f64 = line.segments().map(|s| s.segment.length()).sum();
        assert!((speed.distance() - total).abs() < 1e-9);
        assert_eq!(speed.duration(), 20.0);
        assert!((speed.average().unwrap() - total / 20.0).abs() < 1e-9);

        let fastest = speed.fastest().unwrap();
        let slowest = speed.slowest().unwrap();
        assert!((fastest.point.latitude - 0.003).abs() < 1e-12);
        assert!(slowest.point.latitude.abs() < 1e-12);
        assert!(fastest.value > slowest.value);
    }

    #[test]
    fn test_speed_extremes_are_per_point() {
        // About 100 m in 10 s, then about 5 m in 10 s
        let mut line = polyline(&[(0.0, 0.0, 0), (0.9, 0.0, 10), (0.945, 0.0, 20)]);
        let mut speed = SpeedProperty::new();
        seed(&mut speed, &line);

        let vertices: Vec<_> = line.vertices().collect();
        let segments: Vec<_> = line.segments().map(|s| *s.segment).collect();
        let fast = segments[0].speed().unwrap();
        let slow = segments[1].speed().unwrap();
        assert!(fast > 9.9 && slow < 0.6);

        // The head only has the fast segment and the tail only the slow one;
        // the middle point averages both
        let fastest = speed.fastest().unwrap();
        let slowest = speed.slowest().unwrap();
        assert_eq!(fastest.vertex, vertices[0]);
        assert!((fastest.value - fast).abs() < 1e-9);
        assert_eq!(slowest.vertex, vertices[2]);
        assert!((slowest.value - slow).abs() < 1e-9);

        // Removing the middle re-keys both neighbours from the merged segment
        let (_, splice) = line.remove_vertex(vertices[1]).unwrap();
        for (id, node) in &splice.removed {
            speed.remove_segment(&node.view(*id));
        }
        for &id in &splice.added {
            speed.add_segment(&line.segment_ref(id).unwrap());
        }
        let merged = line.segments().next().unwrap().segment.speed().unwrap();
        assert!((merged - 5.25).abs() < 0.01);
        assert!((speed.fastest().unwrap().value - merged).abs() < 1e-9);
        assert!((speed.slowest().unwrap().value - merged).abs() < 1e-9);
    }

    #[test]
    fn test_speed_skips_untimed_segments() {
        let line = Polyline::from_points([
            TrackPoint::new(0.0, 0.0),
            TrackPoint::new(0.001, 0.0),
        ]);
        let mut speed = SpeedProperty::new();
        seed(&mut speed, &line);
        assert!(speed.average().is_none());
        assert!(speed.fastest().is_none());
        assert_eq!(speed.distance(), 0.0);
    }

    #[test]
    fn test_height_rate_splits_directions() {
        let line = polyline(&[
            (0.0, 100.0, 0),
            (1.0, 110.0, 10),
            (2.0, 110.0, 20),
            (3.0, 130.0, 30),
            (4.0, 90.0, 50),
        ]);
        let mut rate = HeightRateProperty::new();
        seed(&mut rate, &line);

        // +10 m in 10 s and +20 m in 10 s
        assert_eq!(rate.ascent().average(), Some(1.5));
        // -40 m in 20 s
        assert_eq!(rate.descent().average(), Some(-2.0));
        assert_eq!(rate.ascent().highest().unwrap().value, 130.0);
        assert_eq!(rate.ascent().lowest().unwrap().value, 110.0);
        assert_eq!(rate.descent().highest().unwrap().value, 90.0);
    }

    #[test]
    fn test_height_rate_flat_track_has_no_trend() {
        let line = polyline(&[(0.0, 50.0, 0), (1.0, 50.0, 10)]);
        let mut rate = HeightRateProperty::new();
        seed(&mut rate, &line);
        let snapshot = rate.snapshot();
        assert!(snapshot.ascent.avg.is_none());
        assert!(snapshot.ascent.max.is_none());
        assert!(snapshot.descent.avg.is_none());
    }

    #[test]
    fn test_distance_gain_and_loss() {
        let line = polyline(&[(0.0, 10.0, 0), (1.0, 15.0, 10), (2.0, 12.0, 20), (3.0, 20.0, 30)]);
        let mut distance = DistanceProperty::new();
        seed(&mut distance, &line);
        let snapshot = distance.snapshot();
        assert_eq!(snapshot.gain, 13.0);
        assert_eq!(snapshot.loss, 3.0);
        assert!(snapshot.length > 300.0);
    }

    #[test]
    fn test_remove_segment_reverts_add() {
        let line = polyline(&[(0.0, 10.0, 0), (1.0, 15.0, 10), (2.0, 12.0, 20)]);
        let mut distance = DistanceProperty::new();
        seed(&mut distance, &line);
        for segment in line.segments() {
            distance.remove_segment(&segment);
        }
        assert_eq!(distance.snapshot(), DistanceSnapshot::default());
    }

    #[test]
    fn test_every_accumulator_is_visited_once() {
        fn visits(property: &mut dyn TrackProperty) -> usize {
            let mut count = 0;
            property.for_each_accumulator(&mut |_: &mut dyn Accumulator| count += 1);
            count
        }
        assert_eq!(visits(&mut SpeedProperty::new()), 3);
        assert_eq!(visits(&mut HeightRateProperty::new()), 6);
        assert_eq!(visits(&mut DistanceProperty::new()), 3);
    }

    #[test]
    fn test_initialize_resets() {
        let line = polyline(&[(0.0, 10.0, 0), (1.0, 15.0, 10)]);
        let mut speed = SpeedProperty::new();
        seed(&mut speed, &line);
        speed.initialize();
        assert!(speed.average().is_none());
        assert!(speed.fastest().is_none());
    }
}
