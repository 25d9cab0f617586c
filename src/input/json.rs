use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;
use crate::core::{parse_timestamp, PlaybackError, TrackSample};

/// One record of the recorded track log, as it appears on disk
///
/// Field names match the recorded JSON exactly; everything is optional so a
/// single bad record never fails the whole load.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrackRecord {
    pub timestamp: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<i32>,
    pub gspeed: Option<i32>,
    pub vspeed: Option<i32>,
    pub track: Option<i32>,
    pub squawk: Option<String>,
    pub callsign: Option<String>,
    pub source: Option<String>,
    pub flight: Option<String>,
    pub hexid: Option<String>,
}

impl RawTrackRecord {
    /// Convert to a sample, rejecting records unusable for matching
    ///
    /// Callsign, timestamp and position are required; the remaining fields
    /// default the way the original feed did (squawk 1200, zeroed rates).
    pub fn into_sample(self) -> std::result::Result<TrackSample, PlaybackError> {
        let callsign = match self.callsign {
            Some(cs) if !cs.trim().is_empty() => cs.trim().to_string(),
            _ => {
                return Err(PlaybackError::BadSample {
                    callsign: None,
                    reason: "missing callsign".to_string(),
                })
            }
        };

        let raw_ts = self.timestamp.ok_or_else(|| PlaybackError::BadSample {
            callsign: Some(callsign.clone()),
            reason: "missing timestamp".to_string(),
        })?;
        let timestamp = parse_timestamp(&raw_ts).ok_or_else(|| PlaybackError::BadSample {
            callsign: Some(callsign.clone()),
            reason: format!("unparseable timestamp {:?}", raw_ts),
        })?;

        let (lat, lon) = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                return Err(PlaybackError::BadSample {
                    callsign: Some(callsign),
                    reason: "missing position".to_string(),
                })
            }
        };

        Ok(TrackSample {
            callsign,
            timestamp,
            lat,
            lon,
            altitude: self.alt.unwrap_or(0),
            ground_speed: self.gspeed.unwrap_or(0),
            vertical_speed: self.vspeed.unwrap_or(0),
            track: self.track.unwrap_or(0),
            squawk: self.squawk.unwrap_or_else(|| "1200".to_string()),
            source: self.source,
            flight: self.flight,
            hex_id: self.hexid,
        })
    }
}

/// Load track samples from a JSON array file
///
/// Malformed individual records are skipped with a warning; only a file that
/// cannot be read or parsed as a JSON array is an error.
pub fn load_json(data: &[u8]) -> Result<Vec<TrackSample>> {
    let records: Vec<RawTrackRecord> =
        serde_json::from_slice(data).context("Failed to parse JSON track log")?;

    let total = records.len();
    let mut samples = Vec::with_capacity(total);
    for record in records {
        match record.into_sample() {
            Ok(sample) => samples.push(sample),
            Err(e) => warn!("Skipping record: {}", e),
        }
    }

    if samples.len() < total {
        warn!("Skipped {} of {} track records", total - samples.len(), total);
    }

    Ok(samples)
}
