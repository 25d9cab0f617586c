use std::collections::{BTreeSet, HashMap};
use crate::core::TrackSample;

/// Blends each aircraft's emitted position toward its latest sample
///
/// With factor `f`, an emitted value is `previous + (current - previous) * f`:
/// small factors favor the previously emitted position, 1.0 passes samples
/// through unchanged. The previous-position map holds at most one entry per
/// spawned aircraft and is cleared on every start/restart, so it cannot grow
/// across sessions.
#[derive(Debug)]
pub struct PositionSmoother {
    factor: f64,
    previous: HashMap<String, SmoothedPoint>,
}

#[derive(Debug, Clone, Copy)]
struct SmoothedPoint {
    lat: f64,
    lon: f64,
    altitude: f64,
    ground_speed: f64,
    vertical_speed: f64,
    track: f64,
}

impl PositionSmoother {
    pub fn new(factor: f64) -> Self {
        Self {
            factor: factor.clamp(0.0, 1.0),
            previous: HashMap::new(),
        }
    }

    /// Smooth one sample, remembering the emitted point for the next tick
    ///
    /// The first sample ever seen for a callsign passes through unchanged.
    pub fn apply(&mut self, sample: &TrackSample) -> TrackSample {
        let current = SmoothedPoint::from(sample);

        let emitted = match self.previous.get(&sample.callsign) {
            Some(prev) => prev.blend_toward(&current, self.factor),
            None => current,
        };
        self.previous.insert(sample.callsign.clone(), emitted);

        let mut out = sample.clone();
        out.lat = emitted.lat;
        out.lon = emitted.lon;
        out.altitude = emitted.altitude.round() as i32;
        out.ground_speed = emitted.ground_speed.round() as i32;
        out.vertical_speed = emitted.vertical_speed.round() as i32;
        out.track = normalize_track(emitted.track.round() as i32);
        out
    }

    /// Drop cached positions for aircraft no longer spawned
    pub fn retain(&mut self, spawned: &BTreeSet<String>) {
        self.previous.retain(|callsign, _| spawned.contains(callsign));
    }

    pub fn clear(&mut self) {
        self.previous.clear();
    }
}

impl From<&TrackSample> for SmoothedPoint {
    fn from(sample: &TrackSample) -> Self {
        Self {
            lat: sample.lat,
            lon: sample.lon,
            altitude: sample.altitude as f64,
            ground_speed: sample.ground_speed as f64,
            vertical_speed: sample.vertical_speed as f64,
            track: sample.track as f64,
        }
    }
}

impl SmoothedPoint {
    fn blend_toward(&self, current: &SmoothedPoint, factor: f64) -> SmoothedPoint {
        SmoothedPoint {
            lat: self.lat + (current.lat - self.lat) * factor,
            lon: self.lon + (current.lon - self.lon) * factor,
            altitude: self.altitude + (current.altitude - self.altitude) * factor,
            ground_speed: self.ground_speed + (current.ground_speed - self.ground_speed) * factor,
            vertical_speed: self.vertical_speed
                + (current.vertical_speed - self.vertical_speed) * factor,
            track: blend_track(self.track, current.track, factor),
        }
    }
}

/// Interpolate a track angle across the 360-degree wraparound
fn blend_track(previous: f64, current: f64, factor: f64) -> f64 {
    let mut diff = current - previous;
    if diff > 180.0 {
        diff -= 360.0;
    } else if diff < -180.0 {
        diff += 360.0;
    }

    let blended = previous + diff * factor;
    blended.rem_euclid(360.0)
}

fn normalize_track(track: i32) -> i32 {
    track.rem_euclid(360)
}
