use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDateTime, Utc};

/// A single surveillance sample for one aircraft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSample {
    /// Callsign, used as the aircraft identifier
    pub callsign: String,

    /// Recorded timestamp in UTC
    pub timestamp: DateTime<Utc>,

    /// Latitude in degrees
    pub lat: f64,

    /// Longitude in degrees
    pub lon: f64,

    /// Barometric altitude in feet
    pub altitude: i32,

    /// Ground speed in knots
    pub ground_speed: i32,

    /// Vertical speed in feet per minute
    pub vertical_speed: i32,

    /// Track over ground in degrees (0-359)
    pub track: i32,

    /// Transponder squawk code
    pub squawk: String,

    /// Receiver/source that produced this sample
    pub source: Option<String>,

    /// Flight number, if distinct from the callsign
    pub flight: Option<String>,

    /// ICAO 24-bit address as hex
    pub hex_id: Option<String>,
}

impl TrackSample {
    /// Absolute distance in milliseconds between this sample and `instant`
    pub fn millis_from(&self, instant: DateTime<Utc>) -> i64 {
        (self.timestamp - instant).num_milliseconds().abs()
    }
}

/// Parse a recorded timestamp string into UTC
///
/// The recorded logs carry timestamps like "2025-05-02T04:08:15Z" or
/// "2025-05-02T04:08:15.200Z"; a trailing Z is tolerated but not required.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let trimmed = raw.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_with_zulu() {
        let ts = parse_timestamp("2025-05-02T04:08:15Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-05-02T04:08:15+00:00");
    }

    #[test]
    fn test_parse_timestamp_with_millis() {
        let ts = parse_timestamp("2025-05-02T04:08:15.200Z").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 200);
    }

    #[test]
    fn test_parse_timestamp_without_zone() {
        assert!(parse_timestamp("2025-05-02T04:08:15").is_some());
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert!(parse_timestamp("not a time").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
