use thiserror::Error;

/// Errors produced by the playback engine
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Invalid control input; rejected synchronously, no state changed
    #[error("invalid playback speed {requested}: must be > 0 and <= {ceiling}")]
    InvalidSpeed { requested: f64, ceiling: f64 },

    /// A single malformed sample; skipped, never tick-fatal
    #[error("malformed sample for {}: {reason}", .callsign.as_deref().unwrap_or("<no callsign>"))]
    BadSample {
        callsign: Option<String>,
        reason: String,
    },

    /// The simulated clock left the representable time range
    #[error("simulated timestamp overflowed at {elapsed_ms}ms past origin")]
    SimTimeOverflow { elapsed_ms: i64 },

    /// The downstream frame consumer failed; logged and absorbed
    #[error("frame sink failed: {0}")]
    Sink(String),

    /// Too many consecutive tick failures; playback was stopped
    #[error("{failures} consecutive tick failures, playback stopped")]
    TooManyFailures { failures: u32 },
}
