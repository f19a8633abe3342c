#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{Duration, NaiveDate};
use drl_investment::config::AppConfig;
use drl_investment::data::tdx::encode_record;
use drl_investment::data::Bar;

/// Fresh directory under the system temp dir
pub fn temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{}_{}", prefix, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// Oscillating daily bars
pub fn bars(n: usize) -> Vec<Bar> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).expect("valid date");
    (0..n)
        .map(|i| {
            let close = 10.0 + (i as f64 * 0.3).sin() + i as f64 * 0.01;
            Bar {
                date: start + Duration::days(i as i64),
                open: close - 0.05,
                high: close + 0.1,
                low: close - 0.1,
                close,
                amount: 1_000_000.0 + i as f64,
                volume: 50_000.0,
            }
        })
        .collect()
}

/// Write a TDX `.day` fixture
pub fn write_day_file(n: usize) -> PathBuf {
    let path = temp_dir("tdx_fixture").join("sh600000.day");
    let bytes: Vec<u8> = bars(n).iter().flat_map(|bar| encode_record(bar)).collect();
    std::fs::write(&path, bytes).expect("write .day fixture");
    path
}

/// Write a CSV fixture with a date index
pub fn write_csv_file(n: usize) -> PathBuf {
    let path = temp_dir("csv_fixture").join("prices.csv");
    let mut text = String::from("date,open,high,low,close,volume\n");
    for bar in bars(n) {
        text.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.date.format("%Y-%m-%d"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        ));
    }
    std::fs::write(&path, text).expect("write csv fixture");
    path
}

/// Settings small enough for a few fast iterations
pub fn small_settings(seed: u64) -> AppConfig {
    let mut settings = AppConfig::default();
    settings.ppo.train_batch_size = 64;
    settings.ppo.sgd_minibatch_size = 32;
    settings.ppo.num_sgd_iter = 2;
    settings.model.fcnet_hiddens = vec![16, 16];
    settings.rollouts.seed = Some(seed);
    settings.tune.verbose = 0;
    settings
}
