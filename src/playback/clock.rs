use std::time::Instant;
use chrono::{DateTime, Duration, Utc};

/// Virtual-clock state for one playback session
///
/// Maps real elapsed wall time plus the history of speed changes onto a
/// point in the recorded timeline. Simulated time accrued at previous speeds
/// is folded into `accumulated_sim_ms` whenever the effective speed changes,
/// then the fold point moves to "now". The derived simulated timestamp is
/// therefore continuous across speed changes, pause and resume.
///
/// All derivations take the wall instant as a parameter; nothing here reads
/// the system clock, which keeps every transition testable.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockState {
    speed: f64,
    accumulated_sim_ms: i64,
    last_speed_change: Instant,
    origin: DateTime<Utc>,
    paused: bool,
}

impl ClockState {
    /// Start a session at `origin` with the given speed multiplier
    pub fn start(origin: DateTime<Utc>, speed: f64, now: Instant) -> Self {
        Self {
            speed,
            accumulated_sim_ms: 0,
            last_speed_change: now,
            origin,
            paused: false,
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn origin(&self) -> DateTime<Utc> {
        self.origin
    }

    /// Speed at which simulated time is currently accruing
    fn effective_speed(&self) -> f64 {
        if self.paused {
            0.0
        } else {
            self.speed
        }
    }

    /// Fold simulated time accrued since the last change into the accumulator
    ///
    /// The effective speed is never negative, so the accumulator is
    /// monotonically non-decreasing for the life of the session.
    fn fold(&mut self, now: Instant) {
        self.accumulated_sim_ms = self.elapsed_sim_ms(now);
        self.last_speed_change = now;
    }

    /// Switch to a new speed multiplier; fold first so simulated time is
    /// continuous across the change
    ///
    /// The factor must already be validated (positive, under the ceiling).
    pub fn set_speed(&mut self, factor: f64, now: Instant) {
        self.fold(now);
        self.speed = factor;
    }

    /// Freeze simulated-time accrual without discarding the speed multiplier
    pub fn pause(&mut self, now: Instant) {
        if !self.paused {
            self.fold(now);
            self.paused = true;
        }
    }

    /// Resume accrual at the multiplier in force before the pause
    pub fn resume(&mut self, now: Instant) {
        if self.paused {
            self.fold(now);
            self.paused = false;
        }
    }

    /// Total simulated milliseconds elapsed since the session started
    pub fn elapsed_sim_ms(&self, now: Instant) -> i64 {
        let real_ms = now.saturating_duration_since(self.last_speed_change).as_millis() as i64;
        self.accumulated_sim_ms + (real_ms as f64 * self.effective_speed()) as i64
    }

    /// The point in the recorded timeline corresponding to `now`
    ///
    /// Pure derivation: calling it any number of times mutates nothing.
    /// Returns `None` only if the simulated timestamp leaves the
    /// representable time range.
    pub fn simulated_at(&self, now: Instant) -> Option<DateTime<Utc>> {
        self.origin
            .checked_add_signed(Duration::milliseconds(self.elapsed_sim_ms(now)))
    }
}
