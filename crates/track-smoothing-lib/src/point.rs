//! Track point value type

use crate::{Result, TrackError, utils};
use chrono::{DateTime, Utc};
use geo::Point;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single recorded GPS fix
///
/// Immutable once built; equality is by value.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackPoint {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Elevation in meters
    #[cfg_attr(feature = "serde", serde(default))]
    pub elevation: Option<f64>,
    /// UTC instant of the fix
    #[cfg_attr(feature = "serde", serde(default))]
    pub time: Option<DateTime<Utc>>,
}

impl TrackPoint {
    /// Create a point without elevation or timestamp
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
            time: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Attach a timestamp given as ISO-8601 text
    ///
    /// Empty text leaves the point timeless; any other text must parse.
    pub fn with_time_str(mut self, text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            self.time = None;
            return Ok(self);
        }
        let time = utils::parse_timestamp(text)
            .ok_or_else(|| TrackError::MalformedTimestamp(text.to_string()))?;
        self.time = Some(time);
        Ok(self)
    }

    /// Check if the point has usable coordinates
    #[inline]
    pub fn is_valid(&self) -> bool {
        utils::is_valid_coordinate(self.latitude, self.longitude)
            && self.elevation.is_none_or(f64::is_finite)
    }

    /// The point as a `geo` point (x = longitude, y = latitude)
    #[inline]
    pub fn geo_point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    /// Timestamp rendered as RFC 3339, or an empty string when absent
    pub fn time_string(&self) -> String {
        self.time
            .map(|time| time.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
            .unwrap_or_default()
    }
}

impl From<TrackPoint> for Point<f64> {
    fn from(point: TrackPoint) -> Self {
        point.geo_point()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let point = TrackPoint::new(51.5074, -0.1278).with_elevation(35.0);
        assert_eq!(point.latitude, 51.5074);
        assert_eq!(point.longitude, -0.1278);
        assert_eq!(point.elevation, Some(35.0));
        assert!(point.time.is_none());
    }

    #[test]
    fn test_with_time_str() {
        let point = TrackPoint::new(0.0, 0.0)
            .with_time_str("2023-07-04T17:22:15Z")
            .unwrap();
        assert_eq!(point.time_string(), "2023-07-04T17:22:15Z");

        let timeless = TrackPoint::new(0.0, 0.0).with_time_str("").unwrap();
        assert!(timeless.time.is_none());
        assert_eq!(timeless.time_string(), "");
    }

    #[test]
    fn test_malformed_time_rejected() {
        let result = TrackPoint::new(0.0, 0.0).with_time_str("not a time");
        assert!(matches!(result, Err(TrackError::MalformedTimestamp(_))));
    }

    #[test]
    fn test_value_equality() {
        let a = TrackPoint::new(1.0, 2.0).with_elevation(3.0);
        let b = TrackPoint::new(1.0, 2.0).with_elevation(3.0);
        assert_eq!(a, b);
        assert_ne!(a, b.with_elevation(4.0));
    }

    #[test]
    fn test_is_valid() {
        assert!(TrackPoint::new(45.0, 90.0).is_valid());
        assert!(!TrackPoint::new(95.0, 0.0).is_valid());
        assert!(!TrackPoint::new(0.0, 0.0).with_elevation(f64::NAN).is_valid());
    }

    #[test]
    fn test_geo_point_axis_order() {
        let point = TrackPoint::new(10.0, 20.0).geo_point();
        assert_eq!(point.x(), 20.0);
        assert_eq!(point.y(), 10.0);
    }
}
