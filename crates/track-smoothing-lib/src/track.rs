//! Track: the polyline plus the statistics kept in sync with it
//!
//! A track is built once from ordered points, then `add_properties` seeds every
//! registered [`TrackProperty`] by walking the segments once. From then on,
//! each structural change pushes `remove` for the detached segments and `add`
//! for the new ones into every property before returning.

use crate::aggregate::TrackProperty;
use crate::polyline::{SegmentId, SegmentRef, Splice, VertexId};
use crate::properties::{
    DistanceProperty, DistanceSnapshot, HeightRateProperty, HeightRateSnapshot, SpeedProperty,
    SpeedSnapshot,
};
use crate::smoothing::VertexContext;
use crate::{Polyline, Result, TrackError, TrackPoint};
use std::collections::HashSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A registered property and the segments it currently holds
#[derive(Debug)]
struct Registered {
    property: Box<dyn TrackProperty>,
    members: HashSet<SegmentId>,
}

impl Registered {
    fn add(&mut self, segment: &SegmentRef<'_>) -> Result<()> {
        if !self.members.insert(segment.id) {
            return Err(TrackError::InconsistentAggregationState {
                property: self.property.name(),
                reason: format!("segment {} added twice", segment.id),
            });
        }
        self.property.add_segment(segment);
        Ok(())
    }

    fn remove(&mut self, segment: &SegmentRef<'_>) -> Result<()> {
        if !self.members.remove(&segment.id) {
            return Err(TrackError::InconsistentAggregationState {
                property: self.property.name(),
                reason: format!("segment {} removed but never added", segment.id),
            });
        }
        self.property.remove_segment(segment);
        Ok(())
    }

    fn seed(&mut self, polyline: &Polyline) -> Result<()> {
        self.property.initialize();
        self.members.clear();
        for segment in polyline.segments() {
            self.add(&segment)?;
        }
        Ok(())
    }
}

/// Snapshot of every built-in statistic registered on a track
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackStatistics {
    pub points: usize,
    pub segments: usize,
    pub distance: Option<DistanceSnapshot>,
    pub speed: Option<SpeedSnapshot>,
    pub height_rate: Option<HeightRateSnapshot>,
}

/// An ordered GPS track with incrementally maintained statistics
#[derive(Debug, Default)]
pub struct Track {
    polyline: Polyline,
    properties: Vec<Registered>,
    seeded: bool,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Track {
    /// Build the chain from ordered points
    ///
    /// Points with unusable coordinates are skipped with a warning. No
    /// statistics are computed until [`Track::add_properties`] is called.
    ///
    /// # Returns
    /// The track, or [`TrackError::EmptyTrack`] if no usable point remains
    pub fn from_points<I: IntoIterator<Item = TrackPoint>>(points: I) -> Result<Self> {
        #[cfg(feature = "profiling")]
        profiling::scope!("track::from_points");

        let mut skipped = 0usize;
        let polyline = Polyline::from_points(points.into_iter().filter(|point| {
            let valid = point.is_valid();
            if !valid {
                tracing::warn!(
                    "Skipping point with invalid coordinates: ({}, {})",
                    point.latitude,
                    point.longitude
                );
                skipped += 1;
            }
            valid
        }));

        if polyline.is_empty() {
            return Err(TrackError::EmptyTrack);
        }
        tracing::debug!(
            "Built track with {} points ({} skipped)",
            polyline.vertex_count(),
            skipped
        );

        Ok(Self {
            polyline,
            properties: Vec::new(),
            seeded: false,
        })
    }

    /// Register the distance, speed and height-rate properties
    pub fn with_default_properties(mut self) -> Result<Self> {
        self.register_default_properties()?;
        Ok(self)
    }

    pub fn register_default_properties(&mut self) -> Result<()> {
        self.register_property(DistanceProperty::new())?;
        self.register_property(SpeedProperty::new())?;
        self.register_property(HeightRateProperty::new())
    }

    /// Register a property
    ///
    /// If the track is already seeded, the property is seeded right away.
    pub fn register_property<P: TrackProperty>(&mut self, property: P) -> Result<()> {
        let mut registered = Registered {
            property: Box::new(property),
            members: HashSet::new(),
        };
        if self.seeded {
            registered.seed(&self.polyline)?;
        }
        self.properties.push(registered);
        Ok(())
    }

    /// Seed every registered property by walking each segment once
    ///
    /// Calling it again resets and reseeds, so it always matches a full
    /// recomputation over the current chain.
    pub fn add_properties(&mut self) -> Result<()> {
        #[cfg(feature = "profiling")]
        profiling::scope!("track::add_properties");

        for registered in &mut self.properties {
            registered.seed(&self.polyline)?;
        }
        self.seeded = true;
        Ok(())
    }

    /// Whether `add_properties` has run
    #[inline]
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Look up a registered property by type
    pub fn property<P: TrackProperty>(&self) -> Option<&P> {
        self.properties
            .iter()
            .find_map(|registered| registered.property.as_any().downcast_ref::<P>())
    }

    /// Current points, head to tail
    ///
    /// Restartable: each call walks the chain again and reflects every removal.
    pub fn track_points(&self) -> impl Iterator<Item = &TrackPoint> + '_ {
        self.polyline.points()
    }

    #[inline]
    pub fn polyline(&self) -> &Polyline {
        &self.polyline
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.polyline.vertex_count()
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.polyline.segment_count()
    }

    /// The point and both adjoining segments of an interior vertex
    ///
    /// `None` for endpoints and for vertices not in the chain.
    pub fn vertex_context(&self, vertex: VertexId) -> Option<VertexContext<'_>> {
        let node = self.polyline.vertex(vertex)?;
        let incoming = self.polyline.segment(node.incoming()?)?;
        let outgoing = self.polyline.segment(node.outgoing()?)?;
        Some(VertexContext {
            vertex,
            point: node.point(),
            incoming: incoming.segment(),
            outgoing: outgoing.segment(),
        })
    }

    /// Insert a point after `vertex`, updating every property
    pub fn insert_after(&mut self, vertex: VertexId, point: TrackPoint) -> Result<VertexId> {
        let (inserted, splice) = self.polyline.insert_after(vertex, point)?;
        self.apply(splice)?;
        Ok(inserted)
    }

    /// Remove an interior vertex, updating every property
    ///
    /// # Returns
    /// The removed point, or [`TrackError::InvalidOperation`] for endpoints and
    /// vertices that are not in the chain
    pub fn remove_vertex(&mut self, vertex: VertexId) -> Result<TrackPoint> {
        let (point, splice) = self.polyline.remove_vertex(vertex)?;
        self.apply(splice)?;
        Ok(point)
    }

    /// Push one structural delta through every registered property
    fn apply(&mut self, splice: Splice) -> Result<()> {
        if !self.seeded {
            return Ok(());
        }
        for registered in &mut self.properties {
            for (id, node) in &splice.removed {
                registered.remove(&node.view(*id))?;
            }
            for &id in &splice.added {
                let segment = self.polyline.segment_ref(id).ok_or_else(|| {
                    TrackError::InvalidOperation(format!("added segment {id} is not in the chain"))
                })?;
                registered.add(&segment)?;
            }
        }
        Ok(())
    }

    /// Gather the built-in statistics that are registered
    pub fn statistics(&self) -> TrackStatistics {
        TrackStatistics {
            points: self.vertex_count(),
            segments: self.segment_count(),
            distance: self.property::<DistanceProperty>().map(DistanceProperty::snapshot),
            speed: self.property::<SpeedProperty>().map(SpeedProperty::snapshot),
            height_rate: self
                .property::<HeightRateProperty>()
                .map(HeightRateProperty::snapshot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed(latitude: f64, longitude: f64, elevation: f64, seconds: i64) -> TrackPoint {
        let time = chrono::DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap();
        TrackPoint::new(latitude, longitude)
            .with_elevation(elevation)
            .with_time(time)
    }

    fn create_test_track() -> Track {
        Track::from_points([
            timed(51.5074, -0.1278, 10.0, 0),
            timed(51.5076, -0.1276, 12.0, 10),
            timed(51.5078, -0.1274, 11.0, 20),
            timed(51.5081, -0.1271, 15.0, 30),
            timed(51.5083, -0.1270, 9.0, 45),
        ])
        .unwrap()
        .with_default_properties()
        .unwrap()
    }

    /// Rebuild from the current points and compare every statistic
    fn assert_matches_recomputation(track: &Track) {
        let mut fresh = Track::from_points(track.track_points().copied())
            .unwrap()
            .with_default_properties()
            .unwrap();
        fresh.add_properties().unwrap();

        let (actual, expected) = (track.statistics(), fresh.statistics());
        assert_eq!(actual.points, expected.points);
        assert_eq!(actual.segments, expected.segments);

        let (a, e) = (actual.distance.unwrap(), expected.distance.unwrap());
        assert!((a.length - e.length).abs() < 1e-6);
        assert!((a.gain - e.gain).abs() < 1e-9);
        assert!((a.loss - e.loss).abs() < 1e-9);

        let (a, e) = (actual.speed.unwrap(), expected.speed.unwrap());
        assert_eq!(a.avg.is_some(), e.avg.is_some());
        if let (Some(a), Some(e)) = (a.avg, e.avg) {
            assert!((a - e).abs() < 1e-9);
        }
        assert_eq!(a.max.map(|n| n.value), e.max.map(|n| n.value));
        assert_eq!(a.min.map(|n| n.value), e.min.map(|n| n.value));

        let (a, e) = (actual.height_rate.unwrap(), expected.height_rate.unwrap());
        assert_eq!(a.ascent.avg, e.ascent.avg);
        assert_eq!(a.descent.avg, e.descent.avg);
        assert_eq!(a.ascent.max.map(|n| n.value), e.ascent.max.map(|n| n.value));
        assert_eq!(a.descent.min.map(|n| n.value), e.descent.min.map(|n| n.value));
    }

    #[test]
    fn test_from_points() {
        let track = create_test_track();
        assert_eq!(track.vertex_count(), 5);
        assert_eq!(track.segment_count(), 4);
        assert!(!track.is_seeded());
        assert_eq!(track.track_points().count(), 5);
    }

    #[test]
    fn test_empty_track_fails() {
        let result = Track::from_points(Vec::new());
        assert!(matches!(result, Err(TrackError::EmptyTrack)));
    }

    #[test]
    fn test_invalid_points_are_skipped() {
        let track = Track::from_points([
            TrackPoint::new(10.0, 10.0),
            TrackPoint::new(f64::NAN, 10.0),
            TrackPoint::new(10.001, 10.0),
        ])
        .unwrap();
        assert_eq!(track.vertex_count(), 2);

        let result = Track::from_points([TrackPoint::new(200.0, 0.0)]);
        assert!(matches!(result, Err(TrackError::EmptyTrack)));
    }

    #[test]
    fn test_properties_not_computed_before_seeding() {
        let track = create_test_track();
        let distance = track.property::<DistanceProperty>().unwrap();
        assert_eq!(distance.length(), 0.0);
    }

    #[test]
    fn test_add_properties_seeds_and_is_idempotent() {
        let mut track = create_test_track();
        track.add_properties().unwrap();
        let first = track.statistics();
        track.add_properties().unwrap();
        assert_eq!(track.statistics(), first);

        let rescanned: f64 = track
            .polyline()
            .segments()
            .map(|s| s.segment.length())
            .sum();
        let length = track.property::<DistanceProperty>().unwrap().length();
        assert!((length - rescanned).abs() < 1e-9);
    }

    #[test]
    fn test_remove_vertex_keeps_statistics_consistent() {
        let mut track = create_test_track();
        track.add_properties().unwrap();

        let vertices: Vec<_> = track.polyline().vertices().collect();
        track.remove_vertex(vertices[3]).unwrap();
        assert_matches_recomputation(&track);
        track.remove_vertex(vertices[1]).unwrap();
        assert_matches_recomputation(&track);

        assert_eq!(track.vertex_count(), 3);
        assert_eq!(track.segment_count(), 2);
    }

    #[test]
    fn test_insert_after_keeps_statistics_consistent() {
        let mut track = create_test_track();
        track.add_properties().unwrap();

        let first = track.polyline().first().unwrap();
        track
            .insert_after(first, timed(51.5075, -0.1277, 30.0, 5))
            .unwrap();
        assert_eq!(track.vertex_count(), 6);
        assert_matches_recomputation(&track);

        let ascent_max = track.statistics().height_rate.unwrap().ascent.max.unwrap();
        assert_eq!(ascent_max.value, 30.0);
    }

    #[test]
    fn test_remove_endpoint_is_rejected() {
        let mut track = create_test_track();
        track.add_properties().unwrap();
        let before = track.statistics();

        let last = track.polyline().last().unwrap();
        assert!(matches!(
            track.remove_vertex(last),
            Err(TrackError::InvalidOperation(_))
        ));
        assert_eq!(track.statistics(), before);
    }

    #[test]
    fn test_register_after_seeding_seeds_immediately() {
        let mut track = Track::from_points([
            timed(0.0, 0.0, 0.0, 0),
            timed(0.001, 0.0, 0.0, 10),
        ])
        .unwrap();
        track.add_properties().unwrap();
        track.register_property(SpeedProperty::new()).unwrap();

        let speed = track.property::<SpeedProperty>().unwrap();
        assert!(speed.average().is_some());
    }

    #[test]
    fn test_mutation_before_seeding_is_picked_up() {
        let mut track = create_test_track();
        let second = track.polyline().vertices().nth(1).unwrap();
        track.remove_vertex(second).unwrap();
        track.add_properties().unwrap();
        assert_matches_recomputation(&track);
    }

    #[test]
    fn test_vertex_context() {
        let track = create_test_track();
        let vertices: Vec<_> = track.polyline().vertices().collect();
        assert!(track.vertex_context(vertices[0]).is_none());
        assert!(track.vertex_context(vertices[4]).is_none());

        let context = track.vertex_context(vertices[2]).unwrap();
        assert_eq!(context.point, track.polyline().point(vertices[2]).unwrap());
        assert_eq!(context.incoming.end(), context.point);
        assert_eq!(context.outgoing.start(), context.point);
    }

    #[test]
    fn test_statistics_without_properties() {
        let track = Track::from_points([TrackPoint::new(0.0, 0.0)]).unwrap();
        let statistics = track.statistics();
        assert_eq!(statistics.points, 1);
        assert_eq!(statistics.segments, 0);
        assert!(statistics.speed.is_none());
    }
}
