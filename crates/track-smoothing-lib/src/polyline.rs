//! Doubly-linked chain of vertex and segment nodes
//!
//! Vertices and segments live in two generational arenas and reference each
//! other by index: a vertex knows its incoming and outgoing segment, a segment
//! knows the vertices it connects. Every structural operation returns a
//! [`Splice`] describing which segments disappeared and which were created, so
//! that the owner can keep aggregated statistics in sync.

use crate::arena::{Arena, Index};
use crate::{Result, TrackError, TrackPoint, TrackSegment};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identifier of a vertex node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VertexId(Index);

/// Stable identifier of a segment node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentId(Index);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.0.slot(), self.0.generation())
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}.{}", self.0.slot(), self.0.generation())
    }
}

/// A vertex node: one track point plus its adjoining segments ("path")
#[derive(Clone, Debug)]
pub struct VertexNode {
    point: TrackPoint,
    incoming: Option<SegmentId>,
    outgoing: Option<SegmentId>,
}

impl VertexNode {
    #[inline]
    pub fn point(&self) -> &TrackPoint {
        &self.point
    }

    #[inline]
    pub fn incoming(&self) -> Option<SegmentId> {
        self.incoming
    }

    #[inline]
    pub fn outgoing(&self) -> Option<SegmentId> {
        self.outgoing
    }

    /// First or last vertex of the chain
    #[inline]
    pub fn is_endpoint(&self) -> bool {
        self.incoming.is_none() || self.outgoing.is_none()
    }
}

/// A segment node: the metrics between two adjacent vertices
#[derive(Clone, Debug)]
pub struct SegmentNode {
    from: VertexId,
    to: VertexId,
    segment: TrackSegment,
}

impl SegmentNode {
    #[inline]
    pub fn from_vertex(&self) -> VertexId {
        self.from
    }

    #[inline]
    pub fn to_vertex(&self) -> VertexId {
        self.to
    }

    #[inline]
    pub fn segment(&self) -> &TrackSegment {
        &self.segment
    }

    /// Borrow this node as a [`SegmentRef`]
    #[inline]
    pub fn view(&self, id: SegmentId) -> SegmentRef<'_> {
        SegmentRef {
            id,
            from: self.from,
            to: self.to,
            segment: &self.segment,
        }
    }
}

/// Borrowed view of one segment node, handed to aggregations
#[derive(Clone, Copy, Debug)]
pub struct SegmentRef<'a> {
    pub id: SegmentId,
    pub from: VertexId,
    pub to: VertexId,
    pub segment: &'a TrackSegment,
}

/// Segment-level delta produced by one graph mutation
///
/// `removed` holds the detached nodes (already gone from the chain),
/// `added` the ids of the newly linked segments.
#[derive(Debug, Default)]
pub struct Splice {
    pub removed: Vec<(SegmentId, SegmentNode)>,
    pub added: Vec<SegmentId>,
}

/// The track geometry as a non-branching chain
#[derive(Clone, Debug, Default)]
pub struct Polyline {
    vertices: Arena<VertexNode>,
    segments: Arena<SegmentNode>,
    head: Option<VertexId>,
    tail: Option<VertexId>,
}

fn corrupted(what: &str) -> TrackError {
    TrackError::InvalidOperation(format!("corrupted chain: {what}"))
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Polyline {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain from points in order
    pub fn from_points<I: IntoIterator<Item = TrackPoint>>(points: I) -> Self {
        let points = points.into_iter();
        let capacity = points.size_hint().0;
        let mut polyline = Self {
            vertices: Arena::with_capacity(capacity),
            segments: Arena::with_capacity(capacity.saturating_sub(1)),
            head: None,
            tail: None,
        };
        for point in points {
            polyline.push_back(point);
        }
        polyline
    }

    /// Number of live vertex nodes
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of live segment nodes
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[inline]
    pub fn first(&self) -> Option<VertexId> {
        self.head
    }

    #[inline]
    pub fn last(&self) -> Option<VertexId> {
        self.tail
    }

    #[inline]
    pub fn contains(&self, vertex: VertexId) -> bool {
        self.vertices.contains(vertex.0)
    }

    #[inline]
    pub fn vertex(&self, vertex: VertexId) -> Option<&VertexNode> {
        self.vertices.get(vertex.0)
    }

    #[inline]
    pub fn point(&self, vertex: VertexId) -> Option<&TrackPoint> {
        self.vertex(vertex).map(VertexNode::point)
    }

    #[inline]
    pub fn segment(&self, segment: SegmentId) -> Option<&SegmentNode> {
        self.segments.get(segment.0)
    }

    #[inline]
    pub fn segment_ref(&self, segment: SegmentId) -> Option<SegmentRef<'_>> {
        self.segment(segment).map(|node| node.view(segment))
    }

    #[inline]
    pub fn incoming(&self, vertex: VertexId) -> Option<SegmentId> {
        self.vertex(vertex)?.incoming
    }

    #[inline]
    pub fn outgoing(&self, vertex: VertexId) -> Option<SegmentId> {
        self.vertex(vertex)?.outgoing
    }

    #[inline]
    pub fn prev_vertex(&self, vertex: VertexId) -> Option<VertexId> {
        Some(self.segment(self.incoming(vertex)?)?.from)
    }

    #[inline]
    pub fn next_vertex(&self, vertex: VertexId) -> Option<VertexId> {
        Some(self.segment(self.outgoing(vertex)?)?.to)
    }

    /// Walk vertex ids from head to tail
    pub fn vertices(&self) -> Vertices<'_> {
        Vertices {
            polyline: self,
            cursor: self.head,
        }
    }

    /// Walk points from head to tail
    pub fn points(&self) -> impl Iterator<Item = &TrackPoint> + '_ {
        self.vertices().filter_map(|vertex| self.point(vertex))
    }

    /// Walk segments from head to tail
    pub fn segments(&self) -> impl Iterator<Item = SegmentRef<'_>> + '_ {
        self.vertices()
            .filter_map(|vertex| self.outgoing(vertex))
            .filter_map(|segment| self.segment_ref(segment))
    }

    /// Append a point after the current tail
    pub fn push_back(&mut self, point: TrackPoint) -> (VertexId, Splice) {
        let vertex = VertexId(self.vertices.insert(VertexNode {
            point,
            incoming: None,
            outgoing: None,
        }));

        let mut splice = Splice::default();
        match self.tail {
            Some(tail) => {
                // The tail and the new vertex are both live, linking cannot fail
                if let Ok(segment) = self.link(tail, vertex) {
                    splice.added.push(segment);
                }
            }
            None => self.head = Some(vertex),
        }
        self.tail = Some(vertex);
        (vertex, splice)
    }

    /// Insert a point directly after `vertex`
    ///
    /// If `vertex` is interior, its outgoing segment is replaced by two new
    /// segments through the inserted point.
    pub fn insert_after(&mut self, vertex: VertexId, point: TrackPoint) -> Result<(VertexId, Splice)> {
        if !self.contains(vertex) {
            return Err(TrackError::InvalidOperation(format!(
                "vertex {vertex} is not in the chain"
            )));
        }
        if self.tail == Some(vertex) {
            return Ok(self.push_back(point));
        }

        let outgoing = self
            .outgoing(vertex)
            .ok_or_else(|| corrupted("interior vertex without outgoing segment"))?;
        let detached = self
            .segments
            .remove(outgoing.0)
            .ok_or_else(|| corrupted("dangling outgoing segment"))?;
        let next = detached.to;
        self.set_outgoing(vertex, None)?;
        self.set_incoming(next, None)?;

        let inserted = VertexId(self.vertices.insert(VertexNode {
            point,
            incoming: None,
            outgoing: None,
        }));
        let first = self.link(vertex, inserted)?;
        let second = self.link(inserted, next)?;

        Ok((
            inserted,
            Splice {
                removed: vec![(outgoing, detached)],
                added: vec![first, second],
            },
        ))
    }

    /// Remove an interior vertex, merging its two segments into one
    ///
    /// The merged segment is recomputed from the neighbouring points. Fails
    /// with [`TrackError::InvalidOperation`] for endpoints and for vertices
    /// that are not in the chain.
    pub fn remove_vertex(&mut self, vertex: VertexId) -> Result<(TrackPoint, Splice)> {
        let node = self.vertex(vertex).ok_or_else(|| {
            TrackError::InvalidOperation(format!("vertex {vertex} is not in the chain"))
        })?;
        let (Some(incoming), Some(outgoing)) = (node.incoming, node.outgoing) else {
            return Err(TrackError::InvalidOperation(format!(
                "vertex {vertex} is an endpoint and cannot be removed"
            )));
        };

        let before = self
            .segments
            .remove(incoming.0)
            .ok_or_else(|| corrupted("dangling incoming segment"))?;
        let after = self
            .segments
            .remove(outgoing.0)
            .ok_or_else(|| corrupted("dangling outgoing segment"))?;
        let removed = self
            .vertices
            .remove(vertex.0)
            .ok_or_else(|| corrupted("vertex vanished during removal"))?;

        let (prev, next) = (before.from, after.to);
        self.set_outgoing(prev, None)?;
        self.set_incoming(next, None)?;
        let merged = self.link(prev, next)?;

        Ok((
            removed.point,
            Splice {
                removed: vec![(incoming, before), (outgoing, after)],
                added: vec![merged],
            },
        ))
    }

    /// Create the segment `from -> to` and wire both vertices to it
    fn link(&mut self, from: VertexId, to: VertexId) -> Result<SegmentId> {
        let start = *self
            .point(from)
            .ok_or_else(|| corrupted("link from missing vertex"))?;
        let end = *self
            .point(to)
            .ok_or_else(|| corrupted("link to missing vertex"))?;

        let segment = SegmentId(self.segments.insert(SegmentNode {
            from,
            to,
            segment: TrackSegment::between(start, end),
        }));
        self.set_outgoing(from, Some(segment))?;
        self.set_incoming(to, Some(segment))?;
        Ok(segment)
    }

    fn set_incoming(&mut self, vertex: VertexId, segment: Option<SegmentId>) -> Result<()> {
        let node = self
            .vertices
            .get_mut(vertex.0)
            .ok_or_else(|| corrupted("missing vertex"))?;
        node.incoming = segment;
        Ok(())
    }

    fn set_outgoing(&mut self, vertex: VertexId, segment: Option<SegmentId>) -> Result<()> {
        let node = self
            .vertices
            .get_mut(vertex.0)
            .ok_or_else(|| corrupted("missing vertex"))?;
        node.outgoing = segment;
        Ok(())
    }
}

/// Restartable head-to-tail walk over vertex ids
#[derive(Clone, Debug)]
pub struct Vertices<'a> {
    polyline: &'a Polyline,
    cursor: Option<VertexId>,
}

impl Iterator for Vertices<'_> {
    type Item = VertexId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        self.cursor = self.polyline.next_vertex(current);
        Some(current)
    }
}
