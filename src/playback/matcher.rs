use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use crate::core::{TrackLog, TrackSample};
use crate::playback::PlaybackConfig;

/// Result of matching one simulated instant against the log
#[derive(Debug)]
pub struct MatchOutcome<'a> {
    /// Accepted sample per callsign; absence means no sample within tolerance
    pub matched: BTreeMap<&'a str, &'a TrackSample>,

    /// End-of-log signal: nothing matched and simulated time has run past
    /// the configured log duration, so the pipeline should wrap
    pub wrap: bool,
}

/// Match every aircraft's nearest sample against `sim_time`
///
/// For each callsign the sample minimizing |sample time - sim_time| is
/// selected and accepted only if that minimum is within the speed-dependent
/// tolerance. Ties between an earlier and a later sample resolve to the
/// later one. Aircraft with no sample inside the window are simply absent
/// from the result; absence is the signal, not a stale carry-forward.
pub fn match_frame<'a>(
    log: &'a TrackLog,
    sim_time: DateTime<Utc>,
    speed: f64,
    elapsed_sim_ms: i64,
    config: &PlaybackConfig,
) -> MatchOutcome<'a> {
    let tolerance = config.tolerance_for(speed);

    let mut matched = BTreeMap::new();
    for (callsign, run) in log.tracks() {
        if let Some(sample) = nearest_sample(run, sim_time) {
            if sample.millis_from(sim_time) <= tolerance.num_milliseconds() {
                matched.insert(callsign, sample);
            }
        }
    }

    let wrap = matched.is_empty() && elapsed_sim_ms > config.max_log_duration.as_millis() as i64;

    MatchOutcome { matched, wrap }
}

/// Nearest sample to `instant` in a time-sorted run; ties go to the later sample
fn nearest_sample(run: &[TrackSample], instant: DateTime<Utc>) -> Option<&TrackSample> {
    if run.is_empty() {
        return None;
    }

    // First sample at or after the instant
    let idx = run.partition_point(|s| s.timestamp < instant);

    match (idx.checked_sub(1).map(|i| &run[i]), run.get(idx)) {
        (Some(before), Some(after)) => {
            // The later sample wins an exact tie
            if before.millis_from(instant) < after.millis_from(instant) {
                Some(before)
            } else {
                Some(after)
            }
        }
        (Some(before), None) => Some(before),
        (None, Some(after)) => Some(after),
        (None, None) => None,
    }
}
