//! Incremental aggregation over segments
//!
//! Accumulators are fed one segment at a time through [`Accumulator::add`] and
//! [`Accumulator::remove`]. Callers must only remove a segment that was
//! previously added; [`TrackProperty`] implementations are wrapped by the
//! owning track, which enforces that rule and fans every change out to all of a
//! property's accumulators.

use crate::polyline::{SegmentId, SegmentRef, VertexId};
use crate::{TrackPoint, TrackSegment};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Below this magnitude a running sum is snapped back to zero
pub const SUM_EPSILON: f64 = 1e-9;

/// Decides whether a segment feeds an accumulator
pub type SegmentFilter = fn(&TrackSegment) -> bool;

/// Extracts the scalar an accumulator works on
pub type SegmentValue = fn(&TrackSegment) -> Option<f64>;

/// Filter that considers every segment
pub fn every_segment(_: &TrackSegment) -> bool {
    true
}

/// Something that can absorb and release segments
pub trait Accumulator: fmt::Debug {
    fn add(&mut self, segment: &SegmentRef<'_>);
    fn remove(&mut self, segment: &SegmentRef<'_>);
    /// Forget everything, as if freshly constructed
    fn reset(&mut self);
}

/// Running total of a segment value
#[derive(Clone, Debug)]
pub struct Sum {
    value: SegmentValue,
    considered: SegmentFilter,
    total: f64,
    count: usize,
}

impl Sum {
    pub fn new(value: SegmentValue, considered: SegmentFilter) -> Self {
        Self {
            value,
            considered,
            total: 0.0,
            count: 0,
        }
    }

    /// Sum over every segment
    pub fn all(value: SegmentValue) -> Self {
        Self::new(value, every_segment)
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Number of segments currently contributing
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    fn contribution(&self, segment: &TrackSegment) -> Option<f64> {
        if !(self.considered)(segment) {
            return None;
        }
        (self.value)(segment).filter(|value| value.is_finite())
    }
}

impl Accumulator for Sum {
    fn add(&mut self, segment: &SegmentRef<'_>) {
        if let Some(value) = self.contribution(segment.segment) {
            self.total += value;
            self.count += 1;
        }
    }

    fn remove(&mut self, segment: &SegmentRef<'_>) {
        if let Some(value) = self.contribution(segment.segment) {
            self.total -= value;
            self.count = self.count.saturating_sub(1);
            if self.count == 0 || self.total.abs() < SUM_EPSILON {
                self.total = 0.0;
            }
        }
    }

    fn reset(&mut self) {
        self.total = 0.0;
        self.count = 0;
    }
}

/// A vertex seen through the segments currently attached to it
#[derive(Clone, Copy, Debug)]
pub struct PointSegments<'a> {
    pub point: &'a TrackPoint,
    /// Segment arriving at the point, `None` at the head
    pub incoming: Option<&'a TrackSegment>,
    /// Segment leaving the point, `None` at the tail
    pub outgoing: Option<&'a TrackSegment>,
}

/// Extracts the per-point key a [`MaxMinProperty`] ranks
pub type PointValue = fn(&PointSegments<'_>) -> Option<f64>;

/// The vertex currently holding an extremum, with its key
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeOfInterest {
    pub vertex: VertexId,
    /// Point of that vertex
    pub point: TrackPoint,
    pub value: f64,
    #[cfg_attr(feature = "serde", serde(skip))]
    order: u64,
}

/// What one vertex looks like from the segments added so far
#[derive(Clone, Debug)]
struct PointEntry {
    point: TrackPoint,
    incoming: Option<(SegmentId, TrackSegment)>,
    outgoing: Option<(SegmentId, TrackSegment)>,
    value: Option<f64>,
    order: u64,
}

impl PointEntry {
    fn new(point: TrackPoint) -> Self {
        Self {
            point,
            incoming: None,
            outgoing: None,
            value: None,
            order: 0,
        }
    }

    #[inline]
    fn is_detached(&self) -> bool {
        self.incoming.is_none() && self.outgoing.is_none()
    }

    fn view(&self) -> PointSegments<'_> {
        PointSegments {
            point: &self.point,
            incoming: self.incoming.as_ref().map(|(_, segment)| segment),
            outgoing: self.outgoing.as_ref().map(|(_, segment)| segment),
        }
    }

    fn node(&self, vertex: VertexId) -> Option<NodeOfInterest> {
        Some(NodeOfInterest {
            vertex,
            point: self.point,
            value: self.value?,
            order: self.order,
        })
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Max,
    Min,
}

impl Direction {
    #[inline]
    fn beats(self, candidate: f64, current: f64) -> bool {
        match self {
            Direction::Max => candidate > current,
            Direction::Min => candidate < current,
        }
    }

    /// Best entry of `scope`, ties going to the earliest recorded
    fn best(self, scope: impl Iterator<Item = NodeOfInterest>) -> Option<NodeOfInterest> {
        scope.fold(None, |best: Option<NodeOfInterest>, candidate| match best {
            Some(current)
                if !self.beats(candidate.value, current.value)
                    && !(candidate.value == current.value && candidate.order < current.order) =>
            {
                Some(current)
            }
            _ => Some(candidate),
        })
    }
}

/// Tracks the maximum and minimum of a per-point key over the segments in scope
///
/// Each vertex touched by a segment in scope keeps its incoming and outgoing
/// segment, and its key is computed from both. Adding or removing a segment
/// re-keys its two end vertices in O(1). A full rescan only happens when the
/// vertex holding an extremum gets worse or leaves the scope.
#[derive(Clone, Debug)]
pub struct MaxMinProperty {
    key: PointValue,
    points: HashMap<VertexId, PointEntry>,
    max: Option<NodeOfInterest>,
    min: Option<NodeOfInterest>,
    next_order: u64,
    rescans: usize,
}

impl MaxMinProperty {
    pub fn new(key: PointValue) -> Self {
        Self {
            key,
            points: HashMap::new(),
            max: None,
            min: None,
            next_order: 0,
            rescans: 0,
        }
    }

    #[inline]
    pub fn max(&self) -> Option<&NodeOfInterest> {
        self.max.as_ref()
    }

    #[inline]
    pub fn min(&self) -> Option<&NodeOfInterest> {
        self.min.as_ref()
    }

    /// Number of points that currently have a key
    pub fn len(&self) -> usize {
        self.points
            .values()
            .filter(|entry| entry.value.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        !self.points.values().any(|entry| entry.value.is_some())
    }

    /// How many updates needed a full rescan so far
    #[inline]
    pub fn rescan_count(&self) -> usize {
        self.rescans
    }

    fn nodes(&self) -> impl Iterator<Item = NodeOfInterest> + '_ {
        self.points
            .iter()
            .filter_map(|(&vertex, entry)| entry.node(vertex))
    }

    /// Recompute the key of `vertex` after one of its segments changed
    fn rekey(&mut self, vertex: VertexId) {
        let Some(entry) = self.points.get_mut(&vertex) else {
            return;
        };
        if entry.is_detached() {
            self.points.remove(&vertex);
            self.settle(vertex, None);
            return;
        }

        let value = (self.key)(&entry.view()).filter(|value| !value.is_nan());
        if value != entry.value {
            entry.value = value;
            entry.order = self.next_order;
            self.next_order += 1;
        }
        let node = entry.node(vertex);
        self.settle(vertex, node);
    }

    /// Fold the new state of `vertex` into the extremes
    fn settle(&mut self, vertex: VertexId, node: Option<NodeOfInterest>) {
        let mut rescanned = false;
        for direction in [Direction::Max, Direction::Min] {
            let current = match direction {
                Direction::Max => self.max,
                Direction::Min => self.min,
            };
            let next = match (current, node) {
                (Some(held), node) if held.vertex == vertex => match node {
                    Some(node) if !direction.beats(held.value, node.value) => Some(node),
                    _ => {
                        rescanned = true;
                        direction.best(self.nodes())
                    }
                },
                (Some(held), Some(node)) if direction.beats(node.value, held.value) => Some(node),
                (None, Some(node)) => Some(node),
                (current, _) => current,
            };
            match direction {
                Direction::Max => self.max = next,
                Direction::Min => self.min = next,
            }
        }

        if rescanned {
            self.rescans += 1;
            tracing::trace!(
                "Extremum held by {} changed, rescanned {} points",
                vertex,
                self.points.len()
            );
        }
    }
}

impl Accumulator for MaxMinProperty {
    fn add(&mut self, segment: &SegmentRef<'_>) {
        let attached = Some((segment.id, *segment.segment));
        self.points
            .entry(segment.from)
            .or_insert_with(|| PointEntry::new(*segment.segment.start()))
            .outgoing = attached;
        self.points
            .entry(segment.to)
            .or_insert_with(|| PointEntry::new(*segment.segment.end()))
            .incoming = attached;
        self.rekey(segment.from);
        self.rekey(segment.to);
    }

    fn remove(&mut self, segment: &SegmentRef<'_>) {
        for (vertex, leaving) in [(segment.from, true), (segment.to, false)] {
            let Some(entry) = self.points.get_mut(&vertex) else {
                continue;
            };
            let side = if leaving {
                &mut entry.outgoing
            } else {
                &mut entry.incoming
            };
            if side.as_ref().is_some_and(|(id, _)| *id == segment.id) {
                *side = None;
                self.rekey(vertex);
            }
        }
    }

    fn reset(&mut self) {
        self.points.clear();
        self.max = None;
        self.min = None;
        self.next_order = 0;
        self.rescans = 0;
    }
}

/// A composite statistic maintained by a track
///
/// Implementors only expose their accumulators; the owning track pushes every
/// segment change to all of them, so no accumulator can be skipped.
pub trait TrackProperty: fmt::Debug + Send + 'static {
    /// Human readable name, used in error messages and logs
    fn name(&self) -> &'static str;

    /// Hand every nested accumulator to `visit`, once each
    fn for_each_accumulator(&mut self, visit: &mut dyn FnMut(&mut dyn Accumulator));

    fn as_any(&self) -> &dyn Any;

    /// Reset every nested accumulator
    fn initialize(&mut self) {
        self.for_each_accumulator(&mut |accumulator: &mut dyn Accumulator| accumulator.reset());
    }

    fn add_segment(&mut self, segment: &SegmentRef<'_>) {
        self.for_each_accumulator(&mut |accumulator: &mut dyn Accumulator| {
            accumulator.add(segment)
        });
    }

    fn remove_segment(&mut self, segment: &SegmentRef<'_>) {
        self.for_each_accumulator(&mut |accumulator: &mut dyn Accumulator| {
            accumulator.remove(segment)
        });
    }
}
