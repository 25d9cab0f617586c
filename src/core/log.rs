use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use crate::core::TrackSample;

/// Immutable store of track samples for one playback session
///
/// Samples are grouped per callsign and sorted by timestamp so the matcher
/// can binary-search each aircraft's history. The origin timestamp is taken
/// from the first sample in load order, not the earliest timestamp: recorded
/// logs are ordered by capture, and playback starts where the recording did.
#[derive(Debug, Clone, Default)]
pub struct TrackLog {
    tracks: BTreeMap<String, Vec<TrackSample>>,
    origin: Option<DateTime<Utc>>,
    len: usize,
}

impl TrackLog {
    /// Build a log from samples in load order
    pub fn new(samples: Vec<TrackSample>) -> Self {
        let origin = samples.first().map(|s| s.timestamp);
        let len = samples.len();

        let mut tracks: BTreeMap<String, Vec<TrackSample>> = BTreeMap::new();
        for sample in samples {
            tracks.entry(sample.callsign.clone()).or_default().push(sample);
        }
        for track in tracks.values_mut() {
            track.sort_by_key(|s| s.timestamp);
        }

        Self { tracks, origin, len }
    }

    /// An empty log; playback over it produces only degenerate empty frames
    pub fn empty() -> Self {
        Self::default()
    }

    /// Timestamp of the first sample in load order
    pub fn origin(&self) -> Option<DateTime<Utc>> {
        self.origin
    }

    /// Total number of samples
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct aircraft in the log
    pub fn aircraft_count(&self) -> usize {
        self.tracks.len()
    }

    /// Per-aircraft sample runs, sorted by timestamp, keyed by callsign
    pub fn tracks(&self) -> impl Iterator<Item = (&str, &[TrackSample])> {
        self.tracks.iter().map(|(cs, run)| (cs.as_str(), run.as_slice()))
    }

    /// Samples for one callsign, sorted by timestamp
    pub fn samples_for(&self, callsign: &str) -> Option<&[TrackSample]> {
        self.tracks.get(callsign).map(|run| run.as_slice())
    }
}
