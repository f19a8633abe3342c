//! Market data loading
//!
//! Turns raw stock data (TDX `.day` binaries or CSV exports) into a
//! [`MarketFrame`] that environments consume.

mod frame;
pub mod tdx;

pub use frame::{Bar, ColumnStats, MarketFrame, BAR_COLUMNS};
pub use tdx::parse_tdx_day;

use std::path::Path;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::{DrlError, Result};

/// Load a market data file into a frame
///
/// `.day` files are decoded as TDX binaries, `.csv` files must carry a
/// header row.
pub fn unpack_data<P: AsRef<Path>>(path: P) -> Result<MarketFrame> {
    let path = path.as_ref();

    if path.as_os_str().is_empty() {
        return Err(DrlError::Validation(
            "--path is required (a TDX .day file or a CSV file)".to_string(),
        ));
    }
    if path.is_dir() {
        return Err(DrlError::Validation(format!(
            "{} is a directory; expected a TDX .day file or a CSV file",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let frame = match extension.as_deref() {
        Some("day") => {
            let bytes = std::fs::read(path)?;
            let bars = parse_tdx_day(&bytes)?;
            MarketFrame::from_bars(bars)
        }
        Some("csv") => {
            let text = std::fs::read_to_string(path)?;
            parse_csv(&text)?
        }
        _ => {
            return Err(DrlError::Validation(format!(
                "unsupported data file {}; expected .day or .csv",
                path.display()
            )))
        }
    };

    info!(
        "Loaded {} rows x {} columns from {}",
        frame.len(),
        frame.num_columns(),
        path.display()
    );
    debug!("Columns: {:?}", frame.columns());

    Ok(frame)
}

/// Parse CSV text with a header row
///
/// A `date` column becomes the frame index; every other cell must be numeric.
pub fn parse_csv(text: &str) -> Result<MarketFrame> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let header: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if header.is_empty() {
        return Err(DrlError::InvalidMarketData("CSV file is empty".to_string()));
    }

    let date_col = header.iter().position(|h| h.eq_ignore_ascii_case("date"));
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != date_col)
        .map(|(_, h)| h.clone())
        .collect();

    let mut data = Vec::new();
    let mut index = Vec::new();

    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let line = record.position().map_or(0, |p| p.line());

        let mut row = Vec::with_capacity(columns.len());
        for (i, cell) in record.iter().enumerate() {
            if Some(i) == date_col {
                index.push(parse_date(cell)?);
                continue;
            }
            let value = cell.parse::<f64>().map_err(|_| {
                DrlError::InvalidMarketData(format!(
                    "CSV line {}: '{}' in column '{}' is not numeric",
                    line, cell, header[i]
                ))
            })?;
            row.push(value);
        }
        data.push(row);
    }

    MarketFrame::new(columns, data, index)
}

fn csv_error(err: csv::Error) -> DrlError {
    DrlError::InvalidMarketData(format!("CSV: {}", err))
}

fn parse_date(cell: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(cell, "%Y%m%d"))
        .map_err(|_| DrlError::InvalidMarketData(format!("invalid date '{}'", cell)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_with_date_index() {
        let text = "date,open,close\n2023-01-03,10.0,10.5\n20230104,10.5,11.0\n";
        let frame = parse_csv(text).unwrap();

        assert_eq!(frame.columns(), &["open".to_string(), "close".to_string()]);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.index()[1], NaiveDate::from_ymd_opt(2023, 1, 4).unwrap());
        assert_eq!(frame.row(1).unwrap(), &[10.5, 11.0]);
    }

    #[test]
    fn test_parse_csv_rejects_text_cells() {
        let err = parse_csv("close\nabc\n").unwrap_err();
        assert!(err.to_string().contains("not numeric"));
    }

    #[test]
    fn test_parse_csv_quoted_fields() {
        let text = "\"date\",\"open\",\"close\"\n\"2023-01-03\",\"10.0\",\" 10.5 \"\n";
        let frame = parse_csv(text).unwrap();

        assert_eq!(frame.columns(), &["open".to_string(), "close".to_string()]);
        assert_eq!(frame.index()[0], NaiveDate::from_ymd_opt(2023, 1, 3).unwrap());
        assert_eq!(frame.row(0).unwrap(), &[10.0, 10.5]);
    }

    #[test]
    fn test_parse_csv_comma_inside_quotes_is_one_cell() {
        let err = parse_csv("date,name,close\n2023-01-03,\"ACME, Inc\",10.5\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'ACME, Inc'"), "got: {msg}");
        assert!(msg.contains("column 'name'"), "got: {msg}");
    }

    #[test]
    fn test_parse_csv_ragged_row() {
        let err = parse_csv("open,close\n1.0,2.0\n3.0\n").unwrap_err();
        assert!(matches!(err, DrlError::InvalidMarketData(_)));
    }

    #[test]
    fn test_directory_path_rejected() {
        let dir = std::env::temp_dir().join(format!("drl_dir_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let err = unpack_data(&dir).unwrap_err();
        assert!(matches!(err, DrlError::Validation(ref msg) if msg.contains("directory")));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_empty_path_is_validation_error() {
        let err = unpack_data("").unwrap_err();
        assert!(matches!(err, DrlError::Validation(_)));
    }

    #[test]
    fn test_unpack_tdx_file() {
        let dir = std::env::temp_dir().join(format!("drl_unpack_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sh600000.day");

        let bar = Bar {
            date: NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
            open: 7.0,
            high: 7.5,
            low: 6.9,
            close: 7.2,
            amount: 5000.0,
            volume: 700.0,
        };
        std::fs::write(&path, tdx::encode_record(&bar)).unwrap();

        let frame = unpack_data(&path).unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.column("close").unwrap(), vec![7.2]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unsupported_extension() {
        let err = unpack_data("prices.parquet").unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }
}
