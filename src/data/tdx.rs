//! Tongdaxin (TDX) `.day` file decoding
//!
//! Each daily record is 32 bytes, little-endian:
//!
//! | offset | type | field                      |
//! |--------|------|----------------------------|
//! | 0      | u32  | date as `YYYYMMDD`         |
//! | 4      | u32  | open × 100                 |
//! | 8      | u32  | high × 100                 |
//! | 12     | u32  | low × 100                  |
//! | 16     | u32  | close × 100                |
//! | 20     | f32  | amount                     |
//! | 24     | u32  | volume                     |
//! | 28     | u32  | reserved                   |

use chrono::NaiveDate;

use super::frame::Bar;
use crate::error::{DrlError, Result};

/// Size of one daily record
pub const RECORD_SIZE: usize = 32;

/// Prices are stored in cents
const PRICE_SCALE: f64 = 100.0;

/// Decode all records of a `.day` file
pub fn parse_tdx_day(bytes: &[u8]) -> Result<Vec<Bar>> {
    if bytes.len() % RECORD_SIZE != 0 {
        return Err(DrlError::InvalidMarketData(format!(
            "TDX day data length {} is not a multiple of {}",
            bytes.len(),
            RECORD_SIZE
        )));
    }

    bytes
        .chunks_exact(RECORD_SIZE)
        .enumerate()
        .map(|(i, record)| parse_record(record).map_err(|e| with_record(e, i)))
        .collect()
}

fn with_record(err: DrlError, index: usize) -> DrlError {
    match err {
        DrlError::InvalidMarketData(msg) => {
            DrlError::InvalidMarketData(format!("record {}: {}", index, msg))
        }
        other => other,
    }
}

fn parse_record(record: &[u8]) -> Result<Bar> {
    let date = decode_date(read_u32(record, 0))?;
    let open = read_u32(record, 4) as f64 / PRICE_SCALE;
    let high = read_u32(record, 8) as f64 / PRICE_SCALE;
    let low = read_u32(record, 12) as f64 / PRICE_SCALE;
    let close = read_u32(record, 16) as f64 / PRICE_SCALE;
    let amount = f32::from_le_bytes(field(record, 20)) as f64;
    let volume = read_u32(record, 24) as f64;

    Ok(Bar {
        date,
        open,
        high,
        low,
        close,
        amount,
        volume,
    })
}

/// Decode a `YYYYMMDD` integer date
pub fn decode_date(raw: u32) -> Result<NaiveDate> {
    let year = (raw / 10_000) as i32;
    let month = (raw / 100) % 100;
    let day = raw % 100;

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| DrlError::InvalidMarketData(format!("invalid date {}", raw)))
}

fn field(record: &[u8], offset: usize) -> [u8; 4] {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&record[offset..offset + 4]);
    buf
}

fn read_u32(record: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(field(record, offset))
}

/// Encode a bar as a TDX record (used to produce fixtures)
pub fn encode_record(bar: &Bar) -> [u8; RECORD_SIZE] {
    use chrono::Datelike;

    let mut out = [0u8; RECORD_SIZE];
    let date = bar.date.year() as u32 * 10_000 + bar.date.month() * 100 + bar.date.day();
    let prices = [bar.open, bar.high, bar.low, bar.close];

    out[0..4].copy_from_slice(&date.to_le_bytes());
    for (i, price) in prices.iter().enumerate() {
        let cents = (price * PRICE_SCALE).round() as u32;
        out[4 + i * 4..8 + i * 4].copy_from_slice(&cents.to_le_bytes());
    }
    out[20..24].copy_from_slice(&(bar.amount as f32).to_le_bytes());
    out[24..28].copy_from_slice(&(bar.volume as u32).to_le_bytes());
    out
}
