//! CSV bar feed.
//!
//! Expects a header row naming `timestamp,open,high,low,close,volume` (any
//! order, case-insensitive); without recognisable headers the columns are
//! taken positionally.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime};
use tracing::{debug, warn};

use crate::domain::error::RsitraderError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;

const COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

/// RFC 3339, `%Y-%m-%d %H:%M:%S`, `%Y-%m-%dT%H:%M:%S`, or unix time as an
/// integer (milliseconds when it has more than 11 digits, else seconds).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    let epoch: i64 = raw.parse().ok()?;
    if epoch.abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(epoch).map(|dt| dt.naive_utc())
    } else {
        DateTime::from_timestamp(epoch, 0).map(|dt| dt.naive_utc())
    }
}

fn column_indices(headers: &csv::StringRecord) -> [usize; 6] {
    let mut indices = [0, 1, 2, 3, 4, 5];
    let lookup: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    for (slot, name) in COLUMNS.iter().enumerate() {
        let found = lookup.iter().position(|h| {
            h == name || (slot == 0 && matches!(h.as_str(), "time" | "date" | "datetime"))
        });
        if let Some(i) = found {
            indices[slot] = i;
        }
    }
    indices
}

fn parse_row(record: &csv::StringRecord, columns: &[usize; 6]) -> Result<Bar, String> {
    let field = |slot: usize| {
        record
            .get(columns[slot])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("missing {} column", COLUMNS[slot]))
    };
    let number = |slot: usize| -> Result<f64, String> {
        let raw = field(slot)?;
        raw.parse::<f64>()
            .map_err(|e| format!("invalid {} value '{raw}': {e}", COLUMNS[slot]))
    };

    let raw_ts = field(0)?;
    let timestamp =
        parse_timestamp(raw_ts).ok_or_else(|| format!("invalid timestamp '{raw_ts}'"))?;

    let bar = Bar {
        timestamp,
        open: number(1)?,
        high: number(2)?,
        low: number(3)?,
        close: number(4)?,
        volume: number(5)?,
    };
    bar.validate()?;
    Ok(bar)
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self) -> Result<Vec<Bar>, RsitraderError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| {
                RsitraderError::data(format!("failed to read {}: {e}", self.path.display()))
            })?;

        let headers = rdr
            .headers()
            .map_err(|e| RsitraderError::data(format!("CSV header error: {e}")))?
            .clone();
        let columns = column_indices(&headers);

        let mut bars: Vec<Bar> = Vec::new();
        let mut skipped = 0usize;
        for (row, result) in rdr.records().enumerate() {
            // Header is line 1.
            let line = row + 2;
            let parsed = result
                .map_err(|e| format!("CSV parse error: {e}"))
                .and_then(|record| parse_row(&record, &columns));

            match parsed {
                Ok(bar) => {
                    if let Some(prev) = bars.last() {
                        if bar.timestamp <= prev.timestamp {
                            warn!(line, timestamp = %bar.timestamp, "out-of-order or duplicate bar skipped");
                            skipped += 1;
                            continue;
                        }
                    }
                    bars.push(bar);
                }
                Err(reason) => {
                    warn!(line, %reason, "malformed row skipped");
                    skipped += 1;
                }
            }
        }

        debug!(
            path = %self.path.display(),
            bars = bars.len(),
            skipped,
            "loaded bars"
        );
        Ok(bars)
    }

    fn source_name(&self) -> String {
        self.path.display().to_string()
    }
}
