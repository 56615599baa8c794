//! Download configuration and provider timing constants

use crate::downloader::DownloadError;
use crate::output::path::output_path;
use crate::session::endpoint::EndMode;
use crate::{BarSize, Contract, DataType};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;

/// First cooldown after a pacing violation.
/// The provider lifts its soft ban after roughly 10-15 seconds.
pub const BASE_COOLDOWN: Duration = Duration::from_secs(15);

/// Added to the cooldown after every further violation
pub const COOLDOWN_INCREMENT: Duration = Duration::from_secs(15);

/// Gap between consecutive batch requests once pacing is active.
/// The provider allows at most 60 historical requests per 10 minutes.
pub const PACING_INTERVAL: Duration = Duration::from_secs(10);

/// How long to wait for the contract-details answer
pub const CONTRACT_DETAILS_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for any single provider response before aborting
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(600);

/// Default provider host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default provider port
pub const DEFAULT_PORT: u16 = 7496;

/// Default client id; incremented when the provider reports it in use
pub const DEFAULT_CLIENT_ID: i32 = 5;

/// Request id of the contract-details request
pub const CONTRACT_DETAILS_REQUEST_ID: i64 = 0;

/// Request id of every historical batch (one in flight at a time)
pub const HISTORICAL_REQUEST_ID: i64 = 0;

/// Ask the provider for formatted date strings
pub const DATE_FORMAT_STRING: i32 = 1;

/// Rough wall-clock estimate of the remaining batches under pacing
pub fn remaining_hint(total_batches: u32, batches_done: u32) -> Duration {
    let remaining = total_batches.saturating_sub(batches_done);
    PACING_INTERVAL * remaining
}

/// Local timezone from `TZ`, falling back to UTC
pub fn default_local_tz() -> Tz {
    std::env::var("TZ")
        .ok()
        .and_then(|name| name.trim_start_matches(':').parse::<Tz>().ok())
        .unwrap_or(Tz::UTC)
}

/// Everything one download run needs
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Instrument
    pub contract: Contract,
    /// How the end of the range is given
    pub end_mode: EndMode,
    /// Number of batch requests to chain
    pub total_batches: u32,
    /// Bar size
    pub bar_size: BarSize,
    /// Series
    pub data_type: DataType,
    /// Regular trading hours only
    pub rth_only: bool,
    /// Space requests from the first batch on
    pub pacing: bool,
    /// Provider host
    pub host: String,
    /// Provider port
    pub port: u16,
    /// Initial client id
    pub client_id: i32,
    /// Zone the provider reads and writes wall-clock times in
    pub local_tz: Tz,
    /// Explicit output path
    pub output: Option<PathBuf>,
    /// Give up after this many pacing violations; unbounded when `None`
    pub max_pacing_retries: Option<u32>,
    /// Deadline for each awaited response; unbounded when `None`
    pub response_timeout: Option<Duration>,
    /// Deadline for the contract-details answer
    pub contract_details_timeout: Duration,
}

impl DownloadConfig {
    /// Defaults: end `now`, one batch of 1-minute TRADES, no pacing
    pub fn new(contract: Contract) -> Self {
        Self {
            contract,
            end_mode: EndMode::Now,
            total_batches: 1,
            bar_size: BarSize::OneMin,
            data_type: DataType::Trades,
            rth_only: false,
            pacing: false,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            client_id: DEFAULT_CLIENT_ID,
            local_tz: default_local_tz(),
            output: None,
            max_pacing_retries: None,
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT),
            contract_details_timeout: CONTRACT_DETAILS_TIMEOUT,
        }
    }

    /// Set the end-of-range mode
    pub fn with_end_mode(mut self, end_mode: EndMode) -> Self {
        self.end_mode = end_mode;
        self
    }

    /// Set the number of batches
    pub fn with_total_batches(mut self, total_batches: u32) -> Self {
        self.total_batches = total_batches;
        self
    }

    /// Set the bar size
    pub fn with_bar_size(mut self, bar_size: BarSize) -> Self {
        self.bar_size = bar_size;
        self
    }

    /// Set the series
    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Restrict to regular trading hours
    pub fn with_rth_only(mut self, rth_only: bool) -> Self {
        self.rth_only = rth_only;
        self
    }

    /// Pace requests from the start
    pub fn with_pacing(mut self, pacing: bool) -> Self {
        self.pacing = pacing;
        self
    }

    /// Provider endpoint and client id
    pub fn with_connection(mut self, host: impl Into<String>, port: u16, client_id: i32) -> Self {
        self.host = host.into();
        self.port = port;
        self.client_id = client_id;
        self
    }

    /// Set the local timezone
    pub fn with_local_tz(mut self, local_tz: Tz) -> Self {
        self.local_tz = local_tz;
        self
    }

    /// Write to `path` instead of the default file name
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Cap the number of pacing violations tolerated
    pub fn with_max_pacing_retries(mut self, max: Option<u32>) -> Self {
        self.max_pacing_retries = max;
        self
    }

    /// Set the per-response deadline
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the contract-details deadline
    pub fn with_contract_details_timeout(mut self, timeout: Duration) -> Self {
        self.contract_details_timeout = timeout;
        self
    }

    /// Resolved output file path
    pub fn output_path(&self) -> PathBuf {
        output_path(
            self.output.clone(),
            &self.contract,
            self.bar_size,
            self.data_type,
        )
    }

    /// Check the configuration before any provider activity
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.contract.symbol.trim().is_empty() {
            return Err(DownloadError::Configuration(
                "contract symbol must not be empty".to_string(),
            ));
        }
        if self.contract.exchange.trim().is_empty() {
            return Err(DownloadError::Configuration(
                "contract exchange must not be empty".to_string(),
            ));
        }
        if self.total_batches == 0 {
            return Err(DownloadError::Configuration(
                "number of batches must be at least 1".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(DownloadError::Configuration(
                "provider port must be non-zero".to_string(),
            ));
        }
        if self.client_id < 0 {
            return Err(DownloadError::Configuration(format!(
                "client id must be non-negative, got {}",
                self.client_id
            )));
        }
        if self.response_timeout == Some(Duration::ZERO) {
            return Err(DownloadError::Configuration(
                "response timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
