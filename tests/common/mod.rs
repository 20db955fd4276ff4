#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use rulebench::domain::error::EngineError;
pub use rulebench::domain::ohlcv::OhlcvBar;
use rulebench::domain::portfolio::TradeRecord;
use rulebench::ports::data_port::DataPort;
use rulebench::ports::report_port::ReportPort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, source: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(source.to_string(), bars);
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self, source: &str) -> Result<Vec<OhlcvBar>, EngineError> {
        self.data.get(source).cloned().ok_or_else(|| EngineError::Data {
            reason: format!("no data for {source}"),
        })
    }
}

/// Captures what would have been written.
#[derive(Default)]
pub struct RecordingReport {
    pub written: RefCell<Vec<(String, Vec<TradeRecord>)>>,
}

impl ReportPort for RecordingReport {
    fn write_trades(&self, trades: &[TradeRecord], output_path: &str) -> Result<(), EngineError> {
        self.written
            .borrow_mut()
            .push((output_path.to_string(), trades.to_vec()));
        Ok(())
    }
}

pub fn ts(date: &str) -> NaiveDateTime {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn make_bar(date: &str, close: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp: ts(date),
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume: 1000.0,
    }
}

/// Daily bars from 2024-01-01 with the given closes.
pub fn bars_from_closes(closes: &[f64]) -> Vec<OhlcvBar> {
    let start = ts("2024-01-01");
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            timestamp: start + chrono::Duration::days(i as i64),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Deterministic oscillating series with a slow drift, long enough for every indicator to warm up.
pub fn wave_closes(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            100.0 + 0.05 * t + 12.0 * (t / 9.0).sin() + 4.0 * (t / 2.5).cos()
        })
        .collect()
}

pub fn bars_csv(bars: &[OhlcvBar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}

pub fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
