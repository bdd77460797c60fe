//! GeoJSON input and output
//!
//! Accepts a `Feature` with a `LineString` or `MultiLineString` geometry, a
//! `FeatureCollection` (the first feature with a line geometry is used) or a
//! bare line geometry. Coordinates are `[longitude, latitude, elevation?]` and
//! timestamps come from the parallel `properties.coordTimes` array. Every other
//! property is carried through untouched.

use crate::{Result, Track, TrackError, TrackPoint};
use serde_json::{Map, Value, json};
use std::str::FromStr;

const COORD_TIMES: &str = "coordTimes";

/// A track read from GeoJSON, with the feature properties it came with
#[derive(Debug)]
pub struct GeoJsonTrack {
    track: Track,
    properties: Map<String, Value>,
}

fn invalid(reason: impl Into<String>) -> TrackError {
    TrackError::InvalidGeometry(reason.into())
}

fn is_line(geometry: &Value) -> bool {
    matches!(
        geometry.get("type").and_then(Value::as_str),
        Some("LineString" | "MultiLineString")
    )
}

/// Find the line geometry and its property bag in any accepted document shape
fn locate(document: &Value) -> Result<(&Value, Option<&Map<String, Value>>)> {
    let kind = document
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing GeoJSON type"))?;

    match kind {
        "LineString" | "MultiLineString" => Ok((document, None)),
        "Feature" => {
            let geometry = document
                .get("geometry")
                .filter(|geometry| is_line(geometry))
                .ok_or_else(|| invalid("feature has no line geometry"))?;
            Ok((geometry, document.get("properties").and_then(Value::as_object)))
        }
        "FeatureCollection" => {
            let feature = document
                .get("features")
                .and_then(Value::as_array)
                .and_then(|features| {
                    features
                        .iter()
                        .find(|feature| feature.get("geometry").is_some_and(is_line))
                })
                .ok_or_else(|| invalid("collection has no line feature"))?;
            locate(feature)
        }
        other => Err(invalid(format!("unsupported GeoJSON type {other}"))),
    }
}

/// Flatten `LineString` coordinates or `MultiLineString` parts in order
fn positions(geometry: &Value) -> Result<Vec<&Value>> {
    let coordinates = geometry
        .get("coordinates")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("missing coordinates"))?;

    if geometry.get("type").and_then(Value::as_str) == Some("MultiLineString") {
        coordinates
            .iter()
            .map(|line| {
                line.as_array()
                    .ok_or_else(|| invalid("MultiLineString part is not an array"))
            })
            .try_fold(Vec::new(), |mut all, line| {
                all.extend(line?);
                Ok(all)
            })
    } else {
        Ok(coordinates.iter().collect())
    }
}

/// `coordTimes` may be flat or nested per line part
fn coord_times(properties: Option<&Map<String, Value>>) -> Vec<&Value> {
    let Some(times) = properties
        .and_then(|properties| properties.get(COORD_TIMES))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    times
        .iter()
        .flat_map(|time| match time.as_array() {
            Some(part) => part.iter().collect::<Vec<_>>(),
            None => vec![time],
        })
        .collect()
}

fn to_point(position: &Value, time: Option<&Value>) -> Result<TrackPoint> {
    let values = position
        .as_array()
        .filter(|values| values.len() >= 2)
        .ok_or_else(|| invalid(format!("position {position} needs at least two numbers")))?;
    let number = |index: usize| {
        values[index]
            .as_f64()
            .ok_or_else(|| invalid(format!("position {position} is not numeric")))
    };

    let mut point = TrackPoint::new(number(1)?, number(0)?);
    if values.len() > 2 {
        point = point.with_elevation(number(2)?);
    }
    match time {
        Some(Value::String(text)) => point.with_time_str(text),
        Some(Value::Null) | None => Ok(point),
        Some(other) => Err(TrackError::MalformedTimestamp(other.to_string())),
    }
}

fn to_position(point: &TrackPoint) -> Value {
    match point.elevation {
        Some(elevation) => json!([point.longitude, point.latitude, elevation]),
        None => json!([point.longitude, point.latitude]),
    }
}

fn feature(track: &Track, mut properties: Map<String, Value>) -> Value {
    let coordinates: Vec<Value> = track.track_points().map(to_position).collect();

    let timed = track.track_points().any(|point| point.time.is_some());
    if timed || properties.contains_key(COORD_TIMES) {
        let times: Vec<Value> = track
            .track_points()
            .map(|point| Value::String(point.time_string()))
            .collect();
        properties.insert(COORD_TIMES.to_string(), Value::Array(times));
    }

    json!({
        "type": "Feature",
        "geometry": {
            "type": "LineString",
            "coordinates": coordinates,
        },
        "properties": properties,
    })
}

impl Track {
    /// The current points as a GeoJSON `Feature` with only `coordTimes` set
    pub fn to_geojson(&self) -> Value {
        feature(self, Map::new())
    }
}

impl GeoJsonTrack {
    /// Read a track from a parsed GeoJSON document
    pub fn from_value(document: &Value) -> Result<Self> {
        let (geometry, properties) = locate(document)?;
        let positions = positions(geometry)?;
        let times = coord_times(properties);
        if !times.is_empty() && times.len() != positions.len() {
            return Err(invalid(format!(
                "{} coordinates but {} coordTimes",
                positions.len(),
                times.len()
            )));
        }

        let points = positions
            .iter()
            .enumerate()
            .map(|(index, position)| to_point(position, times.get(index).copied()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            track: Track::from_points(points)?,
            properties: properties.cloned().unwrap_or_default(),
        })
    }

    /// A `Feature` holding the current points as a `LineString`
    ///
    /// `coordTimes` is rewritten to match the surviving points when any point
    /// carries a time or the input had the property.
    pub fn to_value(&self) -> Value {
        feature(&self.track, self.properties.clone())
    }

    pub fn to_string_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_value())?)
    }

    #[inline]
    pub fn track(&self) -> &Track {
        &self.track
    }

    #[inline]
    pub fn track_mut(&mut self) -> &mut Track {
        &mut self.track
    }

    /// Feature properties as read, `coordTimes` included
    #[inline]
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn into_track(self) -> Track {
        self.track
    }
}

impl FromStr for GeoJsonTrack {
    type Err = TrackError;

    fn from_str(text: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(text)?;
        Self::from_value(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature() -> Value {
        json!({
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": [[7.5, 46.5, 1000.0], [7.5, 46.501, 1010.0], [7.501, 46.502]]
            },
            "properties": {
                "name": "Morning walk",
                "coordTimes": ["2023-07-04T17:22:15Z", "2023-07-04T17:22:35Z", ""]
            }
        })
    }

    #[test]
    fn test_feature() {
        let parsed = GeoJsonTrack::from_value(&feature()).unwrap();
        let points: Vec<_> = parsed.track().track_points().copied().collect();

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].latitude, 46.5);
        assert_eq!(points[0].longitude, 7.5);
        assert_eq!(points[1].elevation, Some(1010.0));
        assert!(points[2].time.is_none());
        assert_eq!(parsed.properties()["name"], "Morning walk");

        let first = parsed.track().polyline().segments().next().unwrap();
        assert_eq!(first.segment.duration(), Some(20));
    }

    #[test]
    fn test_feature_collection_and_bare_geometry() {
        let collection = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}},
                feature(),
            ]
        });
        let parsed = GeoJsonTrack::from_value(&collection).unwrap();
        assert_eq!(parsed.track().vertex_count(), 3);

        let bare = json!({"type": "LineString", "coordinates": [[1.0, 2.0], [1.0, 3.0]]});
        let parsed = GeoJsonTrack::from_value(&bare).unwrap();
        assert_eq!(parsed.track().vertex_count(), 2);
        assert!(parsed.properties().is_empty());
    }

    #[test]
    fn test_multi_line_string_is_concatenated() {
        let document = json!({
            "type": "Feature",
            "geometry": {
                "type": "MultiLineString",
                "coordinates": [[[1.0, 2.0], [1.0, 3.0]], [[1.0, 4.0]]]
            },
            "properties": {"coordTimes": [["2023-07-04T17:22:15Z", "2023-07-04T17:22:25Z"], ["2023-07-04T17:22:35Z"]]}
        });
        let parsed = GeoJsonTrack::from_value(&document).unwrap();
        assert_eq!(parsed.track().vertex_count(), 3);
        assert!(parsed.track().track_points().all(|point| point.time.is_some()));
    }

    #[test]
    fn test_output_rewrites_coord_times() {
        let mut parsed = GeoJsonTrack::from_value(&feature()).unwrap();
        let middle = parsed.track().polyline().vertices().nth(1).unwrap();
        parsed.track_mut().remove_vertex(middle).unwrap();

        let output = parsed.to_value();
        assert_eq!(output["type"], "Feature");
        assert_eq!(output["properties"]["name"], "Morning walk");
        assert_eq!(
            output["properties"]["coordTimes"],
            json!(["2023-07-04T17:22:15Z", ""])
        );
        assert_eq!(
            output["geometry"]["coordinates"],
            json!([[7.5, 46.5, 1000.0], [7.501, 46.502]])
        );

        let reread: GeoJsonTrack = parsed.to_string_pretty().unwrap().parse().unwrap();
        assert_eq!(reread.track().vertex_count(), 2);
    }

    #[test]
    fn test_track_to_geojson() {
        let untimed = Track::from_points([TrackPoint::new(2.0, 1.0), TrackPoint::new(3.0, 1.0)]).unwrap();
        let output = untimed.to_geojson();
        assert_eq!(output["geometry"]["coordinates"], json!([[1.0, 2.0], [1.0, 3.0]]));
        assert_eq!(output["properties"], json!({}));
    }

    #[test]
    fn test_invalid_documents() {
        for document in [
            json!({"type": "Point", "coordinates": [0.0, 0.0]}),
            json!({"type": "LineString"}),
            json!({"type": "LineString", "coordinates": [[1.0]]}),
            json!({"type": "FeatureCollection", "features": []}),
            json!({"coordinates": []}),
        ] {
            let result = GeoJsonTrack::from_value(&document);
            assert!(matches!(result, Err(TrackError::InvalidGeometry(_))), "{document}");
        }

        let mismatched = json!({
            "type": "Feature",
            "geometry": {"type": "LineString", "coordinates": [[1.0, 2.0], [1.0, 3.0]]},
            "properties": {"coordTimes": ["2023-07-04T17:22:15Z"]}
        });
        assert!(GeoJsonTrack::from_value(&mismatched).is_err());

        let result = "not json".parse::<GeoJsonTrack>();
        assert!(matches!(result, Err(TrackError::Json(_))));
    }

    #[test]
    fn test_malformed_time_and_empty_track() {
        let document = json!({
            "type": "Feature",
            "geometry": {"type": "LineString", "coordinates": [[1.0, 2.0]]},
            "properties": {"coordTimes": ["yesterday"]}
        });
        assert!(matches!(
            GeoJsonTrack::from_value(&document),
            Err(TrackError::MalformedTimestamp(_))
        ));

        let document = json!({"type": "LineString", "coordinates": [[500.0, 2.0]]});
        assert!(matches!(
            GeoJsonTrack::from_value(&document),
            Err(TrackError::EmptyTrack)
        ));
    }
}
