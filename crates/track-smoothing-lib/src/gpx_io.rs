//! GPX input and output

use crate::{Result, Track, TrackError, TrackPoint};
use chrono::{DateTime, Utc};
use gpx::{Gpx, GpxVersion, Waypoint};
use std::io::{BufReader, Write};
use std::path::Path;
use time::OffsetDateTime;

fn to_utc(time: gpx::Time) -> Result<DateTime<Utc>> {
    let time = OffsetDateTime::from(time);
    DateTime::from_timestamp(time.unix_timestamp(), time.nanosecond())
        .ok_or_else(|| TrackError::MalformedTimestamp(time.to_string()))
}

fn to_gpx_time(time: DateTime<Utc>) -> Result<gpx::Time> {
    let nanos = time
        .timestamp_nanos_opt()
        .ok_or_else(|| TrackError::MalformedTimestamp(time.to_rfc3339()))?;
    OffsetDateTime::from_unix_timestamp_nanos(nanos as i128)
        .map(gpx::Time::from)
        .map_err(|e| TrackError::MalformedTimestamp(format!("{time}: {e}")))
}

fn to_point(waypoint: &Waypoint) -> Result<TrackPoint> {
    let position = waypoint.point();
    let mut point = TrackPoint::new(position.y(), position.x());
    if let Some(elevation) = waypoint.elevation {
        point = point.with_elevation(elevation);
    }
    if let Some(time) = waypoint.time {
        point = point.with_time(to_utc(time)?);
    }
    Ok(point)
}

fn to_waypoint(point: &TrackPoint) -> Result<Waypoint> {
    let mut waypoint = Waypoint::new(point.geo_point());
    waypoint.elevation = point.elevation;
    waypoint.time = point.time.map(to_gpx_time).transpose()?;
    Ok(waypoint)
}

/// Load and parse a GPX file
pub fn read_gpx_file(path: impl AsRef<Path>) -> Result<Gpx> {
    let file = std::fs::File::open(path)?;
    Ok(gpx::read(BufReader::new(file))?)
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Track {
    /// Build a track from every point of every track segment, in document order
    pub fn from_gpx(gpx: &Gpx) -> Result<Self> {
        #[cfg(feature = "profiling")]
        profiling::scope!("track::from_gpx");

        let points = gpx
            .tracks
            .iter()
            .flat_map(|track| &track.segments)
            .flat_map(|segment| &segment.points)
            .map(to_point)
            .collect::<Result<Vec<_>>>()?;
        Self::from_points(points)
    }

    /// GPX 1.1 document with one track holding the current points
    pub fn to_gpx(&self) -> Result<Gpx> {
        let mut segment = gpx::TrackSegment::new();
        segment.points = self
            .track_points()
            .map(to_waypoint)
            .collect::<Result<Vec<_>>>()?;

        let mut track = gpx::Track::new();
        track.segments.push(segment);

        Ok(Gpx {
            version: GpxVersion::Gpx11,
            creator: Some(env!("CARGO_PKG_NAME").to_string()),
            tracks: vec![track],
            ..Default::default()
        })
    }

    /// Serialize the current points as GPX 1.1
    pub fn write_gpx<W: Write>(&self, writer: W) -> Result<()> {
        gpx::write(&self.to_gpx()?, writer)?;
        Ok(())
    }
}
