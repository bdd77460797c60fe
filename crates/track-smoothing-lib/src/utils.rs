//! Utility functions for timestamps, angles and coordinate validation

use chrono::{DateTime, Utc};
use std::f64::consts::{PI, TAU};

/// 0.25 mph expressed in meters per second
pub const STATIONARY_SPEED_LIMIT_MPS: f64 = 0.11176;

/// Default angular speed limit in radians per second
pub const ANGULAR_SPEED_LIMIT_RAD_S: f64 = 0.1;

/// Parse an ISO-8601 / RFC 3339 timestamp into a UTC instant
///
/// Returns `None` for text that cannot be parsed.
#[inline]
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

/// Seconds elapsed between two optional instants
///
/// - both absent: `Some(0)` (timeless points are treated as simultaneous)
/// - exactly one absent: `None`
/// - both present: millisecond difference rounded half-up to whole seconds,
///   negative when time runs backwards
pub fn interval_seconds(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<i64> {
    match (start, end) {
        (None, None) => Some(0),
        (Some(start), Some(end)) => {
            let millis = (end - start).num_milliseconds();
            Some((millis as f64 / 1000.0 + 0.5).floor() as i64)
        }
        _ => None,
    }
}

/// Seconds elapsed between two timestamp strings
///
/// Empty text means "no timestamp". Text that is present but unparsable makes
/// the interval undefined.
///
/// # Example
/// ```
/// use track_smoothing_lib::utils::calc_interval;
///
/// assert_eq!(calc_interval("", ""), Some(0));
/// assert_eq!(
///     calc_interval("2023-07-04T17:22:15Z", "2023-07-04T17:22:35Z"),
///     Some(20)
/// );
/// ```
pub fn calc_interval(start: &str, end: &str) -> Option<i64> {
    let start = read_optional_timestamp(start)?;
    let end = read_optional_timestamp(end)?;
    interval_seconds(start, end)
}

/// `Some(None)` for empty text, `None` for malformed text
fn read_optional_timestamp(text: &str) -> Option<Option<DateTime<Utc>>> {
    if text.trim().is_empty() {
        return Some(None);
    }
    match parse_timestamp(text) {
        Some(time) => Some(Some(time)),
        None => {
            tracing::debug!("Unparsable timestamp {:?}, interval is undefined", text);
            None
        }
    }
}

/// Wrap an angle in radians into `(-PI, PI]`
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Check that a latitude/longitude pair is finite and within WGS84 bounds
#[inline(always)]
pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}
