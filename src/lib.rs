//! # TWS History Downloader Library
//!
//! Downloads historical market-data bars for a single instrument from a
//! session-oriented, paced data provider and writes them to a chronologically
//! ordered CSV file.
//!
//! The provider only returns a bounded span of bars per request and rejects
//! requests that arrive too quickly. A full download is therefore a chain of
//! batch requests walking backwards in time from a resolved end-of-range
//! cursor, one request in flight at a time.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tws_history_downloader::downloader::{DownloadConfig, HistoryDownloader};
//! use tws_history_downloader::provider::replay::{ReplayClient, ReplayScript};
//! use tws_history_downloader::{BarSize, Contract, DataType};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let contract = Contract::stock("AAPL", "SMART", "USD");
//! let config = DownloadConfig::new(contract)
//!     .with_bar_size(BarSize::OneMin)
//!     .with_data_type(DataType::Trades)
//!     .with_total_batches(5)
//!     .with_pacing(true);
//!
//! let script = ReplayScript::load("aapl_session.json")?;
//! let (client, events) = ReplayClient::new(script);
//! let summary = HistoryDownloader::new(client, events, config).run().await?;
//! println!("{} rows in {} batches", summary.rows, summary.batches);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`session`] - Trading-session calendar and end-of-range resolution
//! - [`provider`] - Provider client contract, callback payloads and a replay client
//! - [`downloader`] - Error classification, pacing and the batch orchestrator
//! - [`output`] - CSV assembly with final chronological reversal
//! - [`cli`] - Command-line surface
//! - [`shutdown`] - Cancellation shared by every blocking wait

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::DateTime;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Batch download orchestration
pub mod downloader;

/// Metrics emitted while downloading
pub mod metrics;

/// Output writers
pub mod output;

/// Provider client contract and implementations
pub mod provider;

/// Trading-session calendar
pub mod session;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

pub use downloader::{BatchOrchestrator, DownloadConfig, HistoryDownloader};
pub use session::{SessionCalendar, SessionWindow};

/// Option right of an option contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionRight {
    /// Call option
    #[serde(rename = "C")]
    Call,
    /// Put option
    #[serde(rename = "P")]
    Put,
}

impl FromStr for OptionRight {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "C" | "CALL" => Ok(OptionRight::Call),
            "P" | "PUT" => Ok(OptionRight::Put),
            _ => Err(format!("Invalid option right: {s}. Valid options: C, P")),
        }
    }
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionRight::Call => write!(f, "C"),
            OptionRight::Put => write!(f, "P"),
        }
    }
}

/// Instrument identity, sent verbatim with every request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Ticker symbol
    pub symbol: String,
    /// Routing exchange (e.g. "SMART", "GLOBEX")
    pub exchange: String,
    /// Primary listing exchange
    pub primary_exchange: Option<String>,
    /// Security type (e.g. "STK", "FUT", "OPT")
    pub sec_type: String,
    /// Currency
    pub currency: String,
    /// Provider's numeric contract id
    pub con_id: Option<i64>,
    /// Expiry, YYYYMM or YYYYMMDD
    pub expiry: Option<String>,
    /// Strike price of an option
    pub strike: Option<Decimal>,
    /// Right of an option
    pub right: Option<OptionRight>,
    /// Contract multiplier
    pub multiplier: Option<String>,
}

impl Contract {
    /// Shorthand for a stock contract
    pub fn stock(symbol: &str, exchange: &str, currency: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            sec_type: "STK".to_string(),
            currency: currency.to_string(),
            ..Self::default()
        }
    }

    /// Short human label: `SYMBOL-EXCHANGE[_EXPIRY]`
    ///
    /// The primary exchange wins over the routing exchange when both are set.
    pub fn label(&self) -> String {
        let exchange = self
            .primary_exchange
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.exchange);

        let mut label = format!("{}-{}", self.symbol, exchange);
        if let Some(expiry) = self.expiry.as_deref().filter(|e| !e.is_empty()) {
            label.push('_');
            label.push_str(expiry);
        }
        label
    }
}

/// What kind of historical series to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    /// Trade bars with volume, bar count and WAP
    Trades,
    /// Midpoint bars
    Midpoint,
    /// Bid bars
    Bid,
    /// Ask bars
    Ask,
    /// Average bid and average ask
    BidAsk,
    /// Historical volatility
    HistoricalVolatility,
    /// Option implied volatility bars
    OptionImpliedVolatility,
}

impl DataType {
    /// Provider name of the series
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Trades => "TRADES",
            DataType::Midpoint => "MIDPOINT",
            DataType::Bid => "BID",
            DataType::Ask => "ASK",
            DataType::BidAsk => "BID_ASK",
            DataType::HistoricalVolatility => "HISTORICAL_VOLATILITY",
            DataType::OptionImpliedVolatility => "OPTION_IMPLIED_VOLATILITY",
        }
    }

    /// Output column names for this series, in file order
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            DataType::Trades => &[
                "date", "open", "high", "low", "close", "volume", "barCount", "WAP", "hasGaps",
            ],
            DataType::BidAsk => &["date", "bid", "ask", "hasGaps"],
            DataType::Midpoint
            | DataType::Bid
            | DataType::Ask
            | DataType::OptionImpliedVolatility => {
                &["date", "open", "high", "low", "close", "hasGaps"]
            }
            DataType::HistoricalVolatility => &["date", "volatility", "hasGaps"],
        }
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TRADES" => Ok(DataType::Trades),
            "MIDPOINT" => Ok(DataType::Midpoint),
            "BID" => Ok(DataType::Bid),
            "ASK" => Ok(DataType::Ask),
            "BID_ASK" => Ok(DataType::BidAsk),
            "HISTORICAL_VOLATILITY" => Ok(DataType::HistoricalVolatility),
            "OPTION_IMPLIED_VOLATILITY" => Ok(DataType::OptionImpliedVolatility),
            _ => Err(format!(
                "Invalid data type: {s}. Valid options: TRADES, MIDPOINT, BID, ASK, BID_ASK, \
                 HISTORICAL_VOLATILITY, OPTION_IMPLIED_VOLATILITY"
            )),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row date format for intraday bar sizes
pub const INTRADAY_DATE_FORMAT: &str = "%Y%m%d %H:%M:%S";

/// Row date format for daily bars
pub const DAILY_DATE_FORMAT: &str = "%Y%m%d";

/// Bar size of a historical request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarSize {
    /// 1 second
    #[serde(rename = "1 secs")]
    OneSec,
    /// 5 seconds
    #[serde(rename = "5 secs")]
    FiveSecs,
    /// 15 seconds
    #[serde(rename = "15 secs")]
    FifteenSecs,
    /// 30 seconds
    #[serde(rename = "30 secs")]
    ThirtySecs,
    /// 1 minute
    #[serde(rename = "1 min")]
    OneMin,
    /// 2 minutes
    #[serde(rename = "2 mins")]
    TwoMins,
    /// 3 minutes
    #[serde(rename = "3 mins")]
    ThreeMins,
    /// 15 minutes
    #[serde(rename = "15 mins")]
    FifteenMins,
    /// 30 minutes
    #[serde(rename = "30 mins")]
    ThirtyMins,
    /// 1 hour
    #[serde(rename = "1 hour")]
    OneHour,
    /// 1 day
    #[serde(rename = "1 day")]
    OneDay,
}

impl BarSize {
    /// Provider name of the bar size
    pub fn as_str(&self) -> &'static str {
        match self {
            BarSize::OneSec => "1 secs",
            BarSize::FiveSecs => "5 secs",
            BarSize::FifteenSecs => "15 secs",
            BarSize::ThirtySecs => "30 secs",
            BarSize::OneMin => "1 min",
            BarSize::TwoMins => "2 mins",
            BarSize::ThreeMins => "3 mins",
            BarSize::FifteenMins => "15 mins",
            BarSize::ThirtyMins => "30 mins",
            BarSize::OneHour => "1 hour",
            BarSize::OneDay => "1 day",
        }
    }

    /// Longest span the provider serves in one request for this bar size
    pub fn max_duration(&self) -> &'static str {
        match self {
            BarSize::OneSec => "60 S",
            BarSize::FiveSecs => "7200 S",
            BarSize::FifteenSecs => "14400 S",
            BarSize::ThirtySecs => "1 D",
            BarSize::OneMin | BarSize::TwoMins | BarSize::ThreeMins => "2 D",
            BarSize::FifteenMins | BarSize::ThirtyMins => "1 W",
            BarSize::OneHour => "1 M",
            BarSize::OneDay => "1 Y",
        }
    }

    /// strftime format of row dates for this bar size
    pub fn row_date_format(&self) -> &'static str {
        match self {
            BarSize::OneDay => DAILY_DATE_FORMAT,
            _ => INTRADAY_DATE_FORMAT,
        }
    }

    /// Bar size without spaces, used in file names ("1min")
    pub fn file_token(&self) -> String {
        self.as_str().replace(' ', "")
    }
}

impl FromStr for BarSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1 secs" => Ok(BarSize::OneSec),
            "5 secs" => Ok(BarSize::FiveSecs),
            "15 secs" => Ok(BarSize::FifteenSecs),
            "30 secs" => Ok(BarSize::ThirtySecs),
            "1 min" => Ok(BarSize::OneMin),
            "2 mins" => Ok(BarSize::TwoMins),
            "3 mins" => Ok(BarSize::ThreeMins),
            "15 mins" => Ok(BarSize::FifteenMins),
            "30 mins" => Ok(BarSize::ThirtyMins),
            "1 hour" => Ok(BarSize::OneHour),
            "1 day" => Ok(BarSize::OneDay),
            _ => Err(format!(
                "Unsupported bar size: '{s}'. Valid options: 1 secs, 5 secs, 15 secs, 30 secs, \
                 1 min, 2 mins, 3 mins, 15 mins, 30 mins, 1 hour, 1 day"
            )),
        }
    }
}

impl std::fmt::Display for BarSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed historical data point
///
/// The timestamp is expressed in the instrument's timezone. Which of the
/// value fields end up in the output depends on the [`DataType`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Bar time in the instrument's timezone
    pub timestamp: DateTime<Tz>,
    /// Open (average bid for BID_ASK, volatility for HISTORICAL_VOLATILITY)
    pub open: Decimal,
    /// High (average ask for BID_ASK)
    pub high: Decimal,
    /// Low
    pub low: Decimal,
    /// Close
    pub close: Decimal,
    /// Traded volume
    pub volume: i64,
    /// Number of trades in the bar
    pub bar_count: i32,
    /// Weighted average price
    pub wap: Decimal,
    /// Whether the bar spans a data gap
    pub has_gaps: bool,
}

impl Row {
    /// Render the row as output fields for `data_type`, formatting the date with `date_format`
    pub fn record(&self, data_type: DataType, date_format: &str) -> Vec<String> {
        let date = self.timestamp.format(date_format).to_string();
        match data_type {
            DataType::Trades => vec![
                date,
                self.open.to_string(),
                self.high.to_string(),
                self.low.to_string(),
                self.close.to_string(),
                self.volume.to_string(),
                self.bar_count.to_string(),
                self.wap.to_string(),
                self.has_gaps.to_string(),
            ],
            DataType::BidAsk => vec![
                date,
                self.open.to_string(),
                self.high.to_string(),
                self.has_gaps.to_string(),
            ],
            DataType::Midpoint
            | DataType::Bid
            | DataType::Ask
            | DataType::OptionImpliedVolatility => vec![
                date,
                self.open.to_string(),
                self.high.to_string(),
                self.low.to_string(),
                self.close.to_string(),
                self.has_gaps.to_string(),
            ],
            DataType::HistoricalVolatility => {
                vec![date, self.open.to_string(), self.has_gaps.to_string()]
            }
        }
    }
}
