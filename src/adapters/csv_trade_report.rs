//! Trade history CSV writer.

use crate::domain::error::EngineError;
use crate::domain::portfolio::TradeRecord;
use crate::ports::report_port::ReportPort;

const HEADER: [&str; 10] = [
    "side",
    "tag",
    "size",
    "units",
    "entry_time",
    "entry_price",
    "exit_time",
    "exit_price",
    "pnl",
    "return_pct",
];

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CsvTradeReport;

impl ReportPort for CsvTradeReport {
    fn write_trades(&self, trades: &[TradeRecord], output_path: &str) -> Result<(), EngineError> {
        let io_err = |e: csv::Error| EngineError::Io(std::io::Error::other(e));

        let mut wtr = csv::Writer::from_path(output_path).map_err(io_err)?;
        wtr.write_record(HEADER).map_err(io_err)?;

        for t in trades {
            wtr.write_record([
                t.side.to_string(),
                t.tag.clone(),
                format!("{:.4}", t.size),
                format!("{:.6}", t.units),
                t.entry_time.format(TIME_FORMAT).to_string(),
                format!("{:.4}", t.entry_price),
                t.exit_time.format(TIME_FORMAT).to_string(),
                format!("{:.4}", t.exit_price),
                format!("{:.2}", t.pnl),
                format!("{:.2}", t.return_pct()),
            ])
            .map_err(io_err)?;
        }

        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::Side;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn trade(pnl: f64) -> TradeRecord {
        let day = |d| {
            NaiveDate::from_ymd_opt(2024, 1, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        TradeRecord {
            side: Side::Short,
            tag: "Short Entry".into(),
            units: 10.0,
            size: 0.5,
            entry_price: 100.0,
            exit_price: 90.0,
            entry_time: day(2),
            exit_time: day(5),
            commission: 0.0,
            pnl,
        }
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.csv");
        CsvTradeReport
            .write_trades(&[trade(100.0), trade(-20.0)], path.to_str().unwrap())
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.join(","));
        assert_eq!(
            lines[1],
            "short,Short Entry,0.5000,10.000000,\
             2024-01-02 00:00:00,100.0000,\
             2024-01-05 00:00:00,90.0000,\
             100.00,10.00"
        );
        assert!(lines[2].ends_with("-20.00,-2.00"));
    }

    #[test]
    fn empty_history_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("none.csv");
        CsvTradeReport.write_trades(&[], path.to_str().unwrap()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn unwritable_path_is_io_error() {
        let err = CsvTradeReport
            .write_trades(&[], "/nonexistent/dir/trades.csv")
            .unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }
}
