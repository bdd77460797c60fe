//! Pass-and-converge vertex removal
//!
//! A [`Smoother`] walks the interior vertices of a [`Track`] head to tail and
//! removes every vertex its predicate flags. Removing a vertex merges its two
//! segments, so later vertices of the same pass are judged against the merged
//! geometry. With `iterate`, passes repeat until one removes nothing, the chain
//! is down to a single segment, or the pass bound is hit.

use crate::polyline::VertexId;
use crate::utils::{ANGULAR_SPEED_LIMIT_RAD_S, STATIONARY_SPEED_LIMIT_MPS};
use crate::{Result, Track, TrackError, TrackPoint, TrackSegment};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An interior vertex with both adjoining segments
#[derive(Clone, Copy, Debug)]
pub struct VertexContext<'a> {
    pub vertex: VertexId,
    pub point: &'a TrackPoint,
    pub incoming: &'a TrackSegment,
    pub outgoing: &'a TrackSegment,
}

/// Decides whether a vertex violates `limit`
///
/// Undefined metrics must be reported as not violating.
pub type VertexPredicate = fn(&VertexContext<'_>, f64) -> bool;

/// Direction changes faster than `limit` rad/s
pub fn rotates_too_fast(context: &VertexContext<'_>, limit: f64) -> bool {
    context
        .outgoing
        .rotation_rate(context.incoming)
        .is_some_and(|rate| rate.abs() > limit)
}

/// Either adjoining segment is slower than `limit` m/s
///
/// The tail is never tested, so a slow final segment is caught through the
/// vertex before it.
pub fn is_stationary(context: &VertexContext<'_>, limit: f64) -> bool {
    [context.incoming, context.outgoing]
        .into_iter()
        .filter_map(TrackSegment::speed)
        .any(|speed| speed.abs() < limit)
}

/// How a smoothing run proceeds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SmoothOptions {
    /// Repeat passes until nothing changes
    pub iterate: bool,
    /// Upper bound on passes, defaults to the initial vertex count
    pub max_passes: Option<usize>,
}

impl Default for SmoothOptions {
    fn default() -> Self {
        Self {
            iterate: true,
            max_passes: None,
        }
    }
}

impl SmoothOptions {
    pub fn single_pass() -> Self {
        Self {
            iterate: false,
            max_passes: None,
        }
    }
}

/// A vertex taken out of the chain
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RemovedVertex {
    pub vertex: VertexId,
    pub point: TrackPoint,
    /// 1-based pass that removed it
    pub pass: usize,
}

/// Outcome of one smoothing run
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SmoothReport {
    pub smoother: &'static str,
    pub removed: Vec<RemovedVertex>,
    pub passes: usize,
    /// False when the pass bound stopped a run that was still removing
    pub converged: bool,
}

impl SmoothReport {
    #[inline]
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// A named vertex predicate with its limit
#[derive(Clone, Copy, Debug)]
pub struct Smoother {
    name: &'static str,
    limit: f64,
    predicate: VertexPredicate,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Smoother {
    pub fn new(name: &'static str, limit: f64, predicate: VertexPredicate) -> Self {
        Self {
            name,
            limit,
            predicate,
        }
    }

    /// Removes vertices where the track turns faster than `limit` rad/s
    pub fn angular_speed(limit: f64) -> Self {
        Self::new("angular-speed", limit, rotates_too_fast)
    }

    /// Removes vertices next to a segment slower than `limit` m/s
    pub fn stationary(limit: f64) -> Self {
        Self::new("stationary", limit, is_stationary)
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn limit(&self) -> f64 {
        self.limit
    }

    /// Run on `track` until done
    ///
    /// Every removal goes through [`Track::remove_vertex`], so all registered
    /// properties stay in sync. Endpoints are never removed.
    ///
    /// # Returns
    /// The removed vertices in removal order, or [`TrackError::InvalidParameter`]
    /// for a negative or non-finite limit or a zero pass bound
    pub fn smooth(&self, track: &mut Track, options: SmoothOptions) -> Result<SmoothReport> {
        #[cfg(feature = "profiling")]
        profiling::scope!("smoother::smooth");

        if !self.limit.is_finite() || self.limit < 0.0 {
            return Err(TrackError::InvalidParameter(format!(
                "{} limit must be finite and non-negative, got {}",
                self.name, self.limit
            )));
        }
        if options.max_passes == Some(0) {
            return Err(TrackError::InvalidParameter(
                "max_passes must be at least 1".to_string(),
            ));
        }

        let max_passes = options.max_passes.unwrap_or(track.vertex_count());
        let mut report = SmoothReport {
            smoother: self.name,
            removed: Vec::new(),
            passes: 0,
            converged: false,
        };

        loop {
            if track.vertex_count() <= 2 {
                report.converged = true;
                break;
            }
            if report.passes >= max_passes {
                break;
            }
            report.passes += 1;

            let removed = self.pass(track, report.passes, &mut report.removed)?;
            tracing::debug!(
                "{} pass {}: removed {} vertices, {} remain",
                self.name,
                report.passes,
                removed,
                track.vertex_count()
            );

            if removed == 0 {
                report.converged = true;
                break;
            }
            if !options.iterate {
                report.converged = track.vertex_count() <= 2;
                break;
            }
        }

        if options.iterate && !report.converged {
            tracing::warn!(
                "{} smoothing stopped after {} passes without converging",
                self.name,
                report.passes
            );
        }
        Ok(report)
    }

    fn pass(&self, track: &mut Track, pass: usize, removed: &mut Vec<RemovedVertex>) -> Result<usize> {
        let before = removed.len();
        let mut cursor = track
            .polyline()
            .first()
            .and_then(|first| track.polyline().next_vertex(first));

        while let Some(vertex) = cursor {
            let next = track.polyline().next_vertex(vertex);
            // The tail has no context, so the walk ends there
            let violating = match track.vertex_context(vertex) {
                Some(context) => (self.predicate)(&context, self.limit),
                None => false,
            };
            if violating {
                let point = track.remove_vertex(vertex)?;
                tracing::trace!("{} removed {} at ({}, {})", self.name, vertex, point.latitude, point.longitude);
                removed.push(RemovedVertex {
                    vertex,
                    point,
                    pass,
                });
            }
            cursor = next;
        }

        Ok(removed.len() - before)
    }
}

impl Default for Smoother {
    fn default() -> Self {
        Self::angular_speed(ANGULAR_SPEED_LIMIT_RAD_S)
    }
}

/// Stationary smoother at the default walking-pace cutoff
pub fn default_stationary() -> Smoother {
    Smoother::stationary(STATIONARY_SPEED_LIMIT_MPS)
}
