use anyhow::{Context, Result};
use tracing::warn;
use crate::core::{parse_timestamp, TrackSample};

/// Load track samples from a CSV export
///
/// Supports flexible column names, e.g.:
/// - timestamp,callsign,lat,lon,alt,gspeed,vspeed,track,squawk
/// - time,ident,latitude,longitude,altitude
///
/// Timestamp, callsign and position columns are required; the rest are
/// optional and default to the same values as the JSON loader.
pub fn load_csv(data: &[u8]) -> Result<Vec<TrackSample>> {
    let mut rdr = csv::Reader::from_reader(data);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();
    let cols = detect_columns(&headers)?;

    let mut samples = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.records() {
        // A ragged or unreadable row is that row's problem, not the file's
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping unreadable CSV row: {}", e);
                skipped += 1;
                continue;
            }
        };

        let callsign = record
            .get(cols.callsign)
            .map(str::trim)
            .filter(|cs| !cs.is_empty());
        let timestamp = record.get(cols.time).and_then(parse_timestamp);
        let lat = record.get(cols.lat).and_then(|s| s.trim().parse::<f64>().ok());
        let lon = record.get(cols.lon).and_then(|s| s.trim().parse::<f64>().ok());

        let (callsign, timestamp, lat, lon) = match (callsign, timestamp, lat, lon) {
            (Some(cs), Some(ts), Some(lat), Some(lon)) => (cs, ts, lat, lon),
            _ => {
                skipped += 1;
                continue;
            }
        };

        samples.push(TrackSample {
            callsign: callsign.to_string(),
            timestamp,
            lat,
            lon,
            altitude: parse_opt_int(&record, cols.alt),
            ground_speed: parse_opt_int(&record, cols.gspeed),
            vertical_speed: parse_opt_int(&record, cols.vspeed),
            track: parse_opt_int(&record, cols.track),
            squawk: cols
                .squawk
                .and_then(|idx| record.get(idx))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("1200")
                .to_string(),
            source: None,
            flight: None,
            hex_id: None,
        });
    }

    if skipped > 0 {
        warn!("Skipped {} malformed CSV rows", skipped);
    }

    Ok(samples)
}

struct CsvColumns {
    time: usize,
    callsign: usize,
    lat: usize,
    lon: usize,
    alt: Option<usize>,
    gspeed: Option<usize>,
    vspeed: Option<usize>,
    track: Option<usize>,
    squawk: Option<usize>,
}

/// Detect column indices from CSV headers
fn detect_columns(headers: &csv::StringRecord) -> Result<CsvColumns> {
    Ok(CsvColumns {
        time: find_column(headers, &["time", "timestamp", "t", "ts"])?,
        callsign: find_column(headers, &["callsign", "ident", "flight", "cs"])?,
        lat: find_column(headers, &["lat", "latitude"])?,
        lon: find_column(headers, &["lon", "lng", "longitude"])?,
        alt: find_optional_column(headers, &["alt", "altitude", "baro_alt"]),
        gspeed: find_optional_column(headers, &["gspeed", "gs", "ground_speed", "speed"]),
        vspeed: find_optional_column(headers, &["vspeed", "vs", "vertical_speed"]),
        track: find_optional_column(headers, &["track", "heading", "trk"]),
        squawk: find_optional_column(headers, &["squawk", "code"]),
    })
}

/// Find a column by checking possible names
fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Result<usize> {
    find_optional_column(headers, names)
        .ok_or_else(|| anyhow::anyhow!("Could not find column with names: {:?}", names))
}

fn find_optional_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let header_lower = header.to_lowercase();
        names.iter().any(|&name| header_lower == name)
    })
}

fn parse_opt_int(record: &csv::StringRecord, idx: Option<usize>) -> i32 {
    idx.and_then(|i| record.get(i))
        .and_then(|s| s.trim().parse::<i32>().ok())
        .unwrap_or(0)
}
