pub mod clock;
pub mod engine;
pub mod lifecycle;
pub mod matcher;
pub mod smoothing;

pub use engine::{PlaybackEngine, TickOutcome};

use std::time::Duration;
use chrono::{DateTime, TimeZone, Utc};
use crate::core::PlaybackError;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Playback configuration
///
/// Every tolerance and threshold the engine uses is named here so
/// deployments can tune them; the defaults are the values the original
/// Gimpo replay ran with.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Scheduler period between ticks
    pub tick_interval: Duration,

    /// Highest accepted speed multiplier; `set_speed` rejects anything above
    pub speed_ceiling: f64,

    /// Lower bound of the match tolerance window
    pub tolerance_floor: Duration,

    /// Base match tolerance at 1x speed
    pub tolerance_base: Duration,

    /// Speed beyond which the tolerance stops tightening
    pub tolerance_speed_knee: f64,

    /// Simulated duration after which an empty matched set means log exhaustion
    pub max_log_duration: Duration,

    /// Consecutive tick failures that trigger an automatic stop
    pub max_consecutive_failures: u32,

    /// Frames the delivery queue buffers before overflow frames are dropped
    pub frame_queue_depth: usize,

    /// Previous-position blend factor, 0..1; `None` disables smoothing
    pub smoothing_factor: Option<f64>,

    /// Playback origin used when the log is empty or its first timestamp unusable
    pub fallback_origin: DateTime<Utc>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            speed_ceiling: 16.0,
            tolerance_floor: Duration::from_millis(50),
            tolerance_base: Duration::from_millis(100),
            tolerance_speed_knee: 2.0,
            max_log_duration: Duration::from_secs(2 * 60 * 60),
            max_consecutive_failures: 5,
            frame_queue_depth: 64,
            smoothing_factor: None,
            // Start of the recorded session this engine originally replayed
            fallback_origin: Utc.with_ymd_and_hms(2025, 5, 2, 4, 8, 15).unwrap(),
        }
    }
}

impl PlaybackConfig {
    /// Match tolerance for a given speed multiplier
    ///
    /// max(floor, base / min(speed, knee)): wide at low speed so sparse ticks
    /// still find matches, floored at high speed so it never collapses below
    /// the sampling interval.
    pub fn tolerance_for(&self, speed: f64) -> chrono::Duration {
        let base_ms = self.tolerance_base.as_millis() as f64;
        let scaled = (base_ms / speed.min(self.tolerance_speed_knee)) as i64;
        let floor_ms = self.tolerance_floor.as_millis() as i64;
        chrono::Duration::milliseconds(scaled.max(floor_ms))
    }

    /// Validate a requested speed multiplier against the configured ceiling
    pub fn validate_speed(&self, factor: f64) -> Result<(), PlaybackError> {
        // `!(factor > 0.0)` also rejects NaN
        if !(factor > 0.0) || factor > self.speed_ceiling {
            return Err(PlaybackError::InvalidSpeed {
                requested: factor,
                ceiling: self.speed_ceiling,
            });
        }
        Ok(())
    }
}
