//! CSV file data adapter.
//!
//! Columns are located by header name (case-insensitive), so extra columns such
//! as `Adj Close` are ignored. The time column may be called `timestamp`, `date`
//! or `datetime`. Rows are returned in file order; ordering anomalies are left
//! for the execution loop to skip.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, source: &str) -> PathBuf {
        self.base_path.join(source)
    }
}

struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, EngineError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
                .ok_or_else(|| EngineError::Data {
                    reason: format!("missing {} column", names[0]),
                })
        };
        Ok(Columns {
            timestamp: find(&["timestamp", "date", "datetime"])?,
            open: find(&["open"])?,
            high: find(&["high"])?,
            low: find(&["low"])?,
            close: find(&["close"])?,
            volume: find(&["volume"])?,
        })
    }
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn field(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: u64,
) -> Result<f64, EngineError> {
    let raw = record.get(index).ok_or_else(|| EngineError::Data {
        reason: format!("line {line}: missing {name} value"),
    })?;
    raw.trim().parse().map_err(|e| EngineError::Data {
        reason: format!("line {line}: invalid {name} value '{raw}': {e}"),
    })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, source: &str) -> Result<Vec<OhlcvBar>, EngineError> {
        let path = self.csv_path(source);
        let content = fs::read_to_string(&path).map_err(|e| EngineError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| EngineError::Data {
            reason: format!("CSV header error: {}", e),
        })?;
        let cols = Columns::locate(headers)?;
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| EngineError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            let line = record.position().map_or(0, |p| p.line());

            let raw_ts = record.get(cols.timestamp).unwrap_or_default();
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| EngineError::Data {
                reason: format!("line {line}: invalid timestamp '{raw_ts}'"),
            })?;

            bars.push(OhlcvBar {
                timestamp,
                open: field(&record, cols.open, "open", line)?,
                high: field(&record, cols.high, "high", line)?,
                low: field(&record, cols.low, "low", line)?,
                close: field(&record, cols.close, "close", line)?,
                volume: field(&record, cols.volume, "volume", line)?,
            });
        }

        if bars.is_empty() {
            return Err(EngineError::Data {
                reason: format!("{} contains no bars", path.display()),
            });
        }
        Ok(bars)
    }
}
