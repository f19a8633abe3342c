//! Tabular numeric market data

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{DrlError, Result};

/// One daily bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Traded amount (currency)
    pub amount: f64,
    /// Traded volume (shares)
    pub volume: f64,
}

/// Column names produced for bar data
pub const BAR_COLUMNS: [&str; 6] = ["open", "high", "low", "close", "amount", "volume"];

/// Row-major numeric frame with column labels
///
/// Every row holds exactly one value per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketFrame {
    columns: Vec<String>,
    data: Vec<Vec<f64>>,
    index: Vec<NaiveDate>,
}

impl MarketFrame {
    /// Build a frame, checking row widths
    pub fn new(columns: Vec<String>, data: Vec<Vec<f64>>, index: Vec<NaiveDate>) -> Result<Self> {
        if columns.is_empty() {
            return Err(DrlError::InvalidMarketData("frame has no columns".to_string()));
        }
        if let Some((row, values)) = data
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != columns.len())
        {
            return Err(DrlError::InvalidMarketData(format!(
                "row {} has {} values, expected {}",
                row,
                values.len(),
                columns.len()
            )));
        }
        if !index.is_empty() && index.len() != data.len() {
            return Err(DrlError::InvalidMarketData(format!(
                "index has {} entries for {} rows",
                index.len(),
                data.len()
            )));
        }

        Ok(Self {
            columns,
            data,
            index,
        })
    }

    /// Build a frame from bars, sorted by date ascending
    pub fn from_bars(mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|bar| bar.date);

        let index = bars.iter().map(|bar| bar.date).collect();
        let data = bars
            .iter()
            .map(|bar| {
                vec![
                    bar.open, bar.high, bar.low, bar.close, bar.amount, bar.volume,
                ]
            })
            .collect();

        Self {
            columns: BAR_COLUMNS.iter().map(|c| c.to_string()).collect(),
            data,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Column labels in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row dates (empty when the source had no date column)
    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    /// Position of a column, case-insensitive
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Copy of one column
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.data.iter().map(|row| row[idx]).collect())
    }

    pub fn row(&self, i: usize) -> Option<&[f64]> {
        self.data.get(i).map(|row| row.as_slice())
    }

    /// The numeric matrix
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.data
    }

    /// Per-column (mean, std, min, max)
    pub fn column_stats(&self) -> Vec<ColumnStats> {
        let n = self.data.len().max(1) as f64;
        (0..self.columns.len())
            .map(|c| {
                let values = self.data.iter().map(|row| row[c]);
                let mean = values.clone().sum::<f64>() / n;
                let var = values.clone().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let min = values.clone().fold(f64::INFINITY, f64::min);
                let max = values.fold(f64::NEG_INFINITY, f64::max);
                ColumnStats {
                    mean,
                    std: var.sqrt(),
                    min,
                    max,
                }
            })
            .collect()
    }
}

/// Summary statistics of one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2023, 1, day).unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            amount: close * 100.0,
            volume: 100.0,
        }
    }

    #[test]
    fn test_from_bars_sorts_by_date() {
        let frame = MarketFrame::from_bars(vec![bar(3, 12.0), bar(1, 10.0), bar(2, 11.0)]);

        assert_eq!(frame.len(), 3);
        assert_eq!(frame.column("close").unwrap(), vec![10.0, 11.0, 12.0]);
        assert_eq!(frame.index()[0], NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
    }

    #[test]
    fn test_column_index_ignores_case() {
        let frame = MarketFrame::from_bars(vec![bar(1, 10.0)]);
        assert_eq!(frame.column_index("CLOSE"), Some(3));
        assert_eq!(frame.column_index("vwap"), None);
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let err = MarketFrame::new(
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 2.0], vec![3.0]],
            vec![],
        )
        .unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_column_stats() {
        let frame = MarketFrame::new(
            vec!["x".into()],
            vec![vec![1.0], vec![3.0]],
            vec![],
        )
        .unwrap();
        let stats = frame.column_stats();

        assert_eq!(stats[0].mean, 2.0);
        assert_eq!(stats[0].std, 1.0);
        assert_eq!(stats[0].min, 1.0);
        assert_eq!(stats[0].max, 3.0);
    }
}
