use serde::Serialize;
use chrono::{DateTime, Utc};
use crate::core::{AircraftProfile, TrackSample};

/// One aircraft entry in an emitted frame
#[derive(Debug, Clone, Serialize)]
pub struct FrameEntry {
    #[serde(flatten)]
    pub sample: TrackSample,

    #[serde(flatten)]
    pub profile: AircraftProfile,
}

/// One tick's view of the currently active aircraft
///
/// Transient output handed to the frame sink; the engine keeps no reference
/// to it after dispatch. Entries are ordered by callsign so consecutive
/// frames diff cleanly.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    /// Simulated timestamp this frame corresponds to
    pub timestamp: DateTime<Utc>,

    /// Active aircraft, ordered by callsign
    pub entries: Vec<FrameEntry>,
}

impl Frame {
    /// A frame with no active aircraft (valid output, e.g. right after a wrap)
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, entries: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Callsigns present in this frame, in entry order
    pub fn callsigns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.sample.callsign.as_str())
    }
}
