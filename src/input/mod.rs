pub mod csv;
pub mod json;

pub use csv::load_csv;
pub use json::load_json;

use anyhow::Result;
use tracing::{error, info};
use crate::core::{TrackLog, TrackSample};

/// Input format detection result
#[derive(Debug, Clone)]
pub enum InputFormat {
    Json,
    Csv,
    Unknown,
}

/// Detect the format of a track log by inspecting its leading bytes
pub fn detect_format(data: &[u8]) -> InputFormat {
    if is_json(data) {
        return InputFormat::Json;
    }

    if is_csv(data) {
        return InputFormat::Csv;
    }

    InputFormat::Unknown
}

fn is_json(data: &[u8]) -> bool {
    // A recorded track log is a JSON array; tolerate leading whitespace
    data.iter()
        .find(|b| !b.is_ascii_whitespace())
        .map(|&b| b == b'[' || b == b'{')
        .unwrap_or(false)
}

fn is_csv(data: &[u8]) -> bool {
    if data.len() < 10 {
        return false;
    }

    let sample = std::str::from_utf8(&data[..data.len().min(500)]);
    match sample {
        Ok(text) => {
            // Check for CSV-like patterns (multiple commas on a line)
            text.lines().take(5).any(|line| line.chars().filter(|&c| c == ',').count() >= 2)
        }
        Err(_) => false,
    }
}

/// Load track samples from a file, auto-detecting format
pub fn load_file(path: &str) -> Result<Vec<TrackSample>> {
    let data = std::fs::read(path)?;

    match detect_format(&data) {
        InputFormat::Json => load_json(&data),
        InputFormat::Csv => load_csv(&data),
        InputFormat::Unknown => anyhow::bail!("Unknown track log format"),
    }
}

/// Load a track log, degrading to an empty log on any failure
///
/// A missing or unreadable log is not fatal: playback over an empty log
/// produces empty frames until a usable log is supplied.
pub fn load_or_empty(path: &str) -> TrackLog {
    match load_file(path) {
        Ok(samples) => {
            let log = TrackLog::new(samples);
            info!(
                "Loaded {} samples for {} aircraft from {}",
                log.len(),
                log.aircraft_count(),
                path
            );
            log
        }
        Err(e) => {
            error!("Failed to load track log from {}: {}", path, e);
            TrackLog::empty()
        }
    }
}
