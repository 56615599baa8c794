//! Scripted provider sessions shared by the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tws_history_downloader::downloader::DownloadConfig;
use tws_history_downloader::provider::{BarData, ContractDetails, ProviderEvent};
use tws_history_downloader::session::endpoint::EndMode;
use tws_history_downloader::Contract;

/// Liquid hours of the fixture contract: Friday 21st and Monday 24th February 2014
pub const LIQUID_HOURS: &str = "20140221:0930-1600;20140224:0930-1600";
/// Trading hours of the fixture contract
pub const TRADING_HOURS: &str = "20140221:0400-2000;20140224:0400-2000";

pub fn ready() -> Vec<ProviderEvent> {
    vec![
        ProviderEvent::Error {
            request_id: -1,
            code: 2104,
            message: "Market data farm connection is OK:usfarm".to_string(),
        },
        ProviderEvent::Error {
            request_id: -1,
            code: 2106,
            message: "HMDS data farm connection is OK:ushmds".to_string(),
        },
    ]
}

pub fn contract_details(zone: &str) -> Vec<ProviderEvent> {
    vec![ProviderEvent::ContractDetails {
        request_id: 0,
        details: ContractDetails {
            time_zone_id: zone.to_string(),
            liquid_hours: LIQUID_HOURS.to_string(),
            trading_hours: TRADING_HOURS.to_string(),
        },
    }]
}

/// One-minute bar at `date`; prices derive from `seed` so equal seeds give equal rows
pub fn bar(date: &str, seed: u32) -> ProviderEvent {
    let base = 100.0 + f64::from(seed) / 4.0;
    ProviderEvent::HistoricalData {
        request_id: 0,
        bar: BarData {
            date: date.to_string(),
            open: base,
            high: base + 0.5,
            low: base - 0.25,
            close: base + 0.25,
            volume: i64::from(seed) * 10,
            bar_count: seed as i32,
            wap: base + 0.125,
            has_gaps: false,
        },
    }
}

pub fn sentinel() -> ProviderEvent {
    ProviderEvent::HistoricalData {
        request_id: 0,
        bar: BarData::sentinel("finished-20140219  16:00:00-20140221  16:00:00"),
    }
}

/// Batch of 21 February bars at the given minutes past 15:00, oldest first, closed by the sentinel
pub fn batch(minutes: &[u32]) -> Vec<ProviderEvent> {
    let mut events: Vec<ProviderEvent> = minutes
        .iter()
        .map(|m| bar(&format!("20140221 15:{m:02}:00"), *m))
        .collect();
    events.push(sentinel());
    events
}

pub fn historical_error(code: i32, message: &str) -> Vec<ProviderEvent> {
    vec![ProviderEvent::Error {
        request_id: 0,
        code,
        message: message.to_string(),
    }]
}

pub fn pacing_violation() -> Vec<ProviderEvent> {
    historical_error(
        162,
        "Historical Market Data Service error message:Historical data request pacing violation",
    )
}

/// RTH download of AAPL ending at Friday's close, written to `dir`
pub fn config(dir: &Path, batches: u32) -> DownloadConfig {
    DownloadConfig::new(Contract::stock("AAPL", "SMART", "USD"))
        .with_end_mode(EndMode::End)
        .with_total_batches(batches)
        .with_rth_only(true)
        .with_local_tz(chrono_tz::US::Eastern)
        .with_output(output_file(dir))
}

pub fn output_file(dir: &Path) -> PathBuf {
    dir.join("AAPL-SMART_1min_TRADES.csv")
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Date column of each output line
pub fn dates(path: &Path) -> Vec<String> {
    read_lines(path)
        .iter()
        .map(|line| line.split(',').next().unwrap().to_string())
        .collect()
}
